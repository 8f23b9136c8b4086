use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

/// Callback invoked for every inbound text message.
pub type TextListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked once when a transport closes.
pub type CloseCallback = Box<dyn FnOnce() + Send>;

/// Handle returned by [`TextTransport::register_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An ordered, reliable, duplex channel that can only move text.
///
/// Anything that can deliver whole text messages in order qualifies: a
/// socket carrying newline-delimited lines, an in-process pipe, a websocket.
/// Listeners run on whatever thread the transport delivers from and must not
/// block for long.
pub trait TextTransport: Send + Sync {
    /// Register a listener for inbound text. Every listener sees every message.
    fn register_listener(&self, listener: TextListener) -> ListenerId;

    /// Remove a previously registered listener. Returns false if unknown.
    fn unregister_listener(&self, id: ListenerId) -> bool;

    /// Send one text message to the remote side.
    fn send(&self, text: &str) -> Result<()>;

    /// Run `callback` once when the transport closes. Runs immediately if it
    /// is already closed.
    fn on_close(&self, callback: CloseCallback);

    /// Close the transport. Idempotent.
    fn close(&self);

    /// Whether the transport has been closed (locally or by the peer).
    fn is_closed(&self) -> bool;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// Listener bookkeeping shared by the transport implementations.
///
/// Dispatch snapshots the listener list so callbacks may register or
/// unregister listeners (or send) without deadlocking.
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    state: Mutex<ListenerState>,
}

#[derive(Default)]
struct ListenerState {
    listeners: Vec<(ListenerId, TextListener)>,
    close_callbacks: Vec<CloseCallback>,
    closed: bool,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: TextListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().listeners.push((id, listener));
        id
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);
        state.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `text` to every listener registered at the time of the call.
    pub fn dispatch(&self, text: &str) {
        let snapshot: Vec<TextListener> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(text);
        }
    }

    pub fn on_close(&self, callback: CloseCallback) {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            callback();
            return;
        }
        state.close_callbacks.push(callback);
    }

    /// Mark closed and run pending close callbacks. Returns false if the set
    /// was already closed.
    pub fn close(&self) -> bool {
        let callbacks = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            std::mem::take(&mut state.close_callbacks)
        };
        for callback in callbacks {
            callback();
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, ListenerState> {
        // Listeners never run under this lock.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ListenerSet")
            .field("listeners", &state.listeners.len())
            .field("closed", &state.closed)
            .finish()
    }
}
