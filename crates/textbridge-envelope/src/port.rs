//! In-process duplex ports.
//!
//! A [`Port`] is one end of a pair created by [`Port::pair`]. A value sent on
//! one end arrives at the other. Each end either queues inbound values for
//! [`Port::recv`] or, once a handler is installed, hands them to the handler
//! on the sender's thread.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{EnvelopeError, Result};
use crate::value::Value;

/// Callback receiving values delivered to a port.
pub type PortHandler = Arc<dyn Fn(Value) + Send + Sync>;

static NEXT_PORT_ID: AtomicU64 = AtomicU64::new(1);

struct Inbox {
    id: u64,
    state: Mutex<InboxState>,
    ready: Condvar,
}

#[derive(Default)]
struct InboxState {
    queue: VecDeque<Value>,
    handler: Option<PortHandler>,
    closed: bool,
}

impl Inbox {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(InboxState::default()),
            ready: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deliver(&self, value: Value) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(EnvelopeError::PortClosed);
        }
        match state.handler.clone() {
            Some(handler) => {
                drop(state);
                handler(value);
            }
            None => {
                state.queue.push_back(value);
                drop(state);
                self.ready.notify_one();
            }
        }
        Ok(())
    }

    fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.handler = None;
        drop(state);
        self.ready.notify_all();
        true
    }
}

/// One end of an in-process duplex channel.
///
/// Clones refer to the same end: they share one inbox and compare equal
/// with [`Port::same_port`].
#[derive(Clone)]
pub struct Port {
    local: Arc<Inbox>,
    remote: Arc<Inbox>,
}

impl Port {
    /// Create a connected pair of ports.
    pub fn pair() -> (Port, Port) {
        let left = Inbox::new();
        let right = Inbox::new();
        (
            Port {
                local: Arc::clone(&left),
                remote: Arc::clone(&right),
            },
            Port {
                local: right,
                remote: left,
            },
        )
    }

    /// Process-unique identifier of this end.
    pub fn id(&self) -> u64 {
        self.local.id
    }

    /// Whether `other` is a handle to the same end.
    pub fn same_port(&self, other: &Port) -> bool {
        Arc::ptr_eq(&self.local, &other.local)
    }

    /// Send a value to the other end.
    pub fn send(&self, value: impl Into<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(EnvelopeError::PortClosed);
        }
        self.remote.deliver(value.into())
    }

    /// Block until a value arrives. Fails once the port is closed and the
    /// queue is drained.
    pub fn recv(&self) -> Result<Value> {
        let mut state = self.local.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                return Ok(value);
            }
            if state.closed {
                return Err(EnvelopeError::PortClosed);
            }
            state = self
                .local
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Like [`Port::recv`] but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Value> {
        let deadline = Instant::now() + timeout;
        let mut state = self.local.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                return Ok(value);
            }
            if state.closed {
                return Err(EnvelopeError::PortClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(EnvelopeError::RecvTimeout(timeout));
            }
            state = self
                .local
                .ready
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Take a queued value without blocking.
    pub fn try_recv(&self) -> Option<Value> {
        self.local.lock().queue.pop_front()
    }

    /// Route every inbound value to `handler` instead of the queue. Values
    /// already queued are handed over first.
    ///
    /// The handler is published only once the queue is empty, so values
    /// arriving from other threads while the backlog drains still reach the
    /// handler after it.
    pub fn set_handler(&self, handler: impl Fn(Value) + Send + Sync + 'static) {
        let handler: PortHandler = Arc::new(handler);
        loop {
            let pending: Vec<Value> = {
                let mut state = self.local.lock();
                if state.closed {
                    return;
                }
                if state.queue.is_empty() {
                    state.handler = Some(handler);
                    return;
                }
                state.queue.drain(..).collect()
            };
            for value in pending {
                handler(value);
            }
        }
    }

    /// Remove the handler; later values queue up again.
    pub fn clear_handler(&self) {
        self.local.lock().handler = None;
    }

    /// Close both ends. Pending `recv` calls wake up with `PortClosed`;
    /// queued values remain readable.
    pub fn close(&self) {
        let local = self.local.close();
        let remote = self.remote.close();
        if local || remote {
            tracing::trace!(port = self.local.id, "port closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.local.lock().closed
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.local.id)
            .field("peer", &self.remote.id)
            .finish()
    }
}
