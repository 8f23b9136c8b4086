use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use textbridge_envelope::{Port, Value};
use tracing::{debug, trace};

use crate::context::ContextInner;
use crate::error::{BridgeError, Result};

/// Local end of one bridged channel.
///
/// A bridge owns a port pair. [`Bridge::port`] is handed to the application;
/// values sent on it are encoded into envelopes tagged with the bridge's
/// channel id. Envelopes arriving for that id are decoded and delivered to
/// the same port.
///
/// Clones share the same channel.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    channel_id: String,
    /// Handed to the application.
    port: Port,
    /// Owned by the bridge; its handler feeds the transport.
    internal: Port,
    /// Application port that was transferred away and now forwards through
    /// this bridge.
    linked: Mutex<Option<Port>>,
    context: Weak<ContextInner>,
    closed: AtomicBool,
}

impl Bridge {
    pub(crate) fn new(channel_id: String, context: &Arc<ContextInner>) -> Self {
        let (port, internal) = Port::pair();

        let weak = Arc::downgrade(context);
        let outbound_id = channel_id.clone();
        internal.set_handler(move |value| {
            let Some(context) = weak.upgrade() else {
                trace!(channel_id = %outbound_id, "context gone; dropping outbound value");
                return;
            };
            if let Err(err) = context.send_value(&outbound_id, value) {
                context.report_fault(err);
            }
        });

        Self {
            inner: Arc::new(BridgeInner {
                channel_id,
                port,
                internal,
                linked: Mutex::new(None),
                context: Arc::downgrade(context),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Channel id this bridge is registered under.
    pub fn channel_id(&self) -> &str {
        &self.inner.channel_id
    }

    /// The application-facing port.
    pub fn port(&self) -> Port {
        self.inner.port.clone()
    }

    /// Encode and send `value` to the remote side, reporting failures to
    /// the caller instead of the context's fault handler.
    pub fn post(&self, value: impl Into<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::ChannelClosed(self.inner.channel_id.clone()));
        }
        let context = self.inner.context.upgrade().ok_or(BridgeError::ContextClosed)?;
        context.send_value(&self.inner.channel_id, value.into())
    }

    /// Close the bridge: both ports of the pair and any linked port are
    /// closed and the channel is removed from its context.
    pub fn close(&self) {
        if !self.close_ports() {
            return;
        }
        if let Some(context) = self.inner.context.upgrade() {
            context.forget(self);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Whether `other` is a handle to the same bridge.
    pub fn same_bridge(&self, other: &Bridge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Close the ports without touching the registry. Returns `false` if the
    /// bridge was already closed.
    pub(crate) fn close_ports(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.port.close();
        self.inner.internal.close();
        self.close_linked();
        debug!(channel_id = %self.inner.channel_id, "bridge closed");
        true
    }

    /// Hand an inbound value to the application port.
    pub(crate) fn deliver(&self, value: Value) -> Result<()> {
        self.inner
            .internal
            .send(value)
            .map_err(|_| BridgeError::ChannelClosed(self.inner.channel_id.clone()))
    }

    /// Splice a transferred application port onto this bridge.
    ///
    /// Values the application sends on the peer of `transferred` travel out
    /// through this bridge, and values arriving on this bridge come out at
    /// that peer.
    pub(crate) fn link(&self, transferred: Port) {
        let local = self.inner.port.clone();

        let outbound = local.clone();
        transferred.set_handler(move |value| {
            if let Err(err) = outbound.send(value) {
                trace!(error = %err, "bridge closed; dropping forwarded value");
            }
        });

        let inbound = transferred.clone();
        local.set_handler(move |value| {
            if let Err(err) = inbound.send(value) {
                trace!(error = %err, "transferred port closed; dropping inbound value");
            }
        });

        let previous = self
            .inner
            .linked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(transferred);
        if let Some(previous) = previous {
            previous.close();
        }
        if self.is_closed() {
            self.close_linked();
        }
    }

    fn close_linked(&self) {
        let linked = self
            .inner
            .linked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(linked) = linked {
            linked.close();
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("channel_id", &self.inner.channel_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
