use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{CloseCallback, ListenerId, ListenerSet, TextListener, TextTransport};

/// One end of an in-process text pipe.
///
/// `send` on one end synchronously runs the listeners of the other end on
/// the calling thread. Closing either end closes both.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    local: Arc<ListenerSet>,
    remote: Arc<ListenerSet>,
}

/// Create a connected pair of in-process transports.
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let left = Arc::new(ListenerSet::new());
    let right = Arc::new(ListenerSet::new());
    (
        MemoryTransport {
            local: Arc::clone(&left),
            remote: Arc::clone(&right),
        },
        MemoryTransport {
            local: right,
            remote: left,
        },
    )
}

impl TextTransport for MemoryTransport {
    fn register_listener(&self, listener: TextListener) -> ListenerId {
        self.local.register(listener)
    }

    fn unregister_listener(&self, id: ListenerId) -> bool {
        self.local.unregister(id)
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.remote.dispatch(text);
        Ok(())
    }

    fn on_close(&self, callback: CloseCallback) {
        self.local.on_close(callback);
    }

    fn close(&self) {
        if self.local.close() {
            debug!("memory transport closed");
        }
        self.remote.close();
    }

    fn is_closed(&self) -> bool {
        self.local.is_closed()
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    fn collector(transport: &MemoryTransport) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        transport.register_listener(Arc::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        }));
        seen
    }

    #[test]
    fn send_reaches_other_end_only() {
        let (left, right) = memory_pair();
        let left_seen = collector(&left);
        let right_seen = collector(&right);

        left.send("to-right").unwrap();
        right.send("to-left").unwrap();

        assert_eq!(*right_seen.lock().unwrap(), vec!["to-right".to_string()]);
        assert_eq!(*left_seen.lock().unwrap(), vec!["to-left".to_string()]);
    }

    #[test]
    fn preserves_send_order() {
        let (left, right) = memory_pair();
        let seen = collector(&right);

        for i in 0..16 {
            left.send(&format!("msg-{i}")).unwrap();
        }

        let expected: Vec<String> = (0..16).map(|i| format!("msg-{i}")).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn close_propagates_to_both_ends() {
        let (left, right) = memory_pair();
        let notified = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&notified);
        right.on_close(Box::new(move || flag.store(true, Ordering::SeqCst)));

        left.close();

        assert!(left.is_closed());
        assert!(right.is_closed());
        assert!(notified.load(Ordering::SeqCst));
        assert!(matches!(right.send("late"), Err(TransportError::Closed)));
    }
}
