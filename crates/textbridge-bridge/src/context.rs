use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use textbridge_envelope::{
    decode_binary, encode_leaf, find_transferables, Envelope, EnvelopeError, Path,
    TransferDescriptor, TransferKind, Value,
};
use textbridge_transport::{ListenerId, TextTransport};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Callback receiving inbound faults that have no caller to return to.
pub type FaultHandler = Arc<dyn Fn(&BridgeError) + Send + Sync>;

/// Outcome of routing one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Decoded and handed to the channel's port.
    Delivered,
    /// No bridge is registered for the envelope's channel id.
    Ignored,
}

/// Counters for one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub sent: u64,
    pub delivered: u64,
    pub ignored: u64,
    pub faults: u64,
    /// Live bridges, explicit and transferred.
    pub channels: usize,
}

/// Per-transport channel registry and codec.
///
/// A context listens on one [`TextTransport`]. Every bridge it hands out,
/// whether established explicitly or created by transferring a port, shares
/// that transport and is demultiplexed by channel id.
///
/// Explicitly established bridges live until closed. Bridges created for
/// transferred ports are kept in a bounded least-recently-used set; the
/// oldest is closed when the bound is exceeded. Closing the transport, or
/// dropping the last handle to the context, closes every bridge.
#[derive(Clone)]
pub struct BridgeContext {
    inner: Arc<ContextInner>,
}

pub(crate) struct ContextInner {
    transport: Arc<dyn TextTransport>,
    config: BridgeConfig,
    listener: Mutex<Option<ListenerId>>,
    registry: Mutex<Registry>,
    fault_handler: Mutex<Option<FaultHandler>>,
    counters: Counters,
    closed: AtomicBool,
}

struct Registry {
    pinned: HashMap<String, Bridge>,
    transferred: LruCache<String, Bridge>,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    delivered: AtomicU64,
    ignored: AtomicU64,
    faults: AtomicU64,
}

impl BridgeContext {
    /// Start listening on `transport` with default configuration.
    pub fn new(transport: impl TextTransport + 'static) -> Self {
        Self::with_config(transport, BridgeConfig::default())
    }

    pub fn with_config(transport: impl TextTransport + 'static, config: BridgeConfig) -> Self {
        Self::from_shared(Arc::new(transport), config)
    }

    /// Start listening on a transport that is shared with other code.
    pub fn from_shared(transport: Arc<dyn TextTransport>, config: BridgeConfig) -> Self {
        Self::with_channels(transport, config, std::iter::empty::<String>())
    }

    /// Start listening with `channels` already established.
    ///
    /// Envelopes for these channels can never be ignored for arriving before
    /// the matching [`establish`](Self::establish) call. Servers that accept
    /// a connection and then bridge a fixed set of ids should use this.
    pub fn with_channels<I, S>(
        transport: Arc<dyn TextTransport>,
        config: BridgeConfig,
        channels: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capacity = NonZeroUsize::new(config.max_channels).unwrap_or(NonZeroUsize::MIN);
        let inner = Arc::new(ContextInner {
            transport: Arc::clone(&transport),
            config,
            listener: Mutex::new(None),
            registry: Mutex::new(Registry {
                pinned: HashMap::new(),
                transferred: LruCache::new(capacity),
            }),
            fault_handler: Mutex::new(None),
            counters: Counters::default(),
            closed: AtomicBool::new(false),
        });

        {
            let mut registry = inner.lock_registry();
            for channel_id in channels {
                let channel_id = channel_id.into();
                let bridge = Bridge::new(channel_id.clone(), &inner);
                registry.pinned.insert(channel_id, bridge);
            }
        }

        let weak = Arc::downgrade(&inner);
        let listener = transport.register_listener(Arc::new(move |text: &str| {
            if let Some(context) = weak.upgrade() {
                context.on_text(text);
            }
        }));
        *inner
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(listener);

        let weak = Arc::downgrade(&inner);
        transport.on_close(Box::new(move || {
            if let Some(context) = weak.upgrade() {
                debug!("transport closed; shutting down bridge context");
                context.shutdown();
            }
        }));

        debug!(
            transport = inner.transport.transport_name(),
            max_channels = capacity.get(),
            "bridge context started"
        );
        Self { inner }
    }

    /// Create, or return the existing, bridge for `channel_id`.
    ///
    /// Both sides must establish the same id to talk. The empty string is a
    /// valid id. An id already in use by a transferred channel is promoted so
    /// that it is no longer subject to eviction.
    pub fn establish(&self, channel_id: impl Into<String>) -> Result<Bridge> {
        self.inner.ensure_open()?;
        let channel_id = channel_id.into();

        let mut registry = self.inner.lock_registry();
        if let Some(bridge) = registry.pinned.get(&channel_id) {
            return Ok(bridge.clone());
        }
        let bridge = match registry.transferred.pop(&channel_id) {
            Some(bridge) => bridge,
            None => Bridge::new(channel_id.clone(), &self.inner),
        };
        registry.pinned.insert(channel_id.clone(), bridge.clone());
        drop(registry);

        info!(channel_id = %channel_id, "bridge established");
        Ok(bridge)
    }

    /// The live bridge for `channel_id`, if any.
    pub fn bridge(&self, channel_id: &str) -> Option<Bridge> {
        let registry = self.inner.lock_registry();
        registry
            .pinned
            .get(channel_id)
            .or_else(|| registry.transferred.peek(channel_id))
            .cloned()
    }

    /// Send `value` on a registered channel, returning any encode or
    /// transport failure.
    pub fn send(&self, channel_id: &str, value: impl Into<Value>) -> Result<()> {
        if self.inner.lookup(channel_id).is_none() {
            return Err(BridgeError::UnknownChannel(channel_id.to_string()));
        }
        self.inner.send_value(channel_id, value.into())
    }

    /// Route one inbound envelope.
    ///
    /// The transport listener calls this for every message; it is public so
    /// callers with their own receive loop can drive a context directly.
    pub fn handle_text(&self, text: &str) -> Result<Routing> {
        self.inner.handle_text(text)
    }

    /// Close the bridge for `channel_id`. Returns `false` if none was live.
    pub fn close_channel(&self, channel_id: &str) -> bool {
        let removed = {
            let mut registry = self.inner.lock_registry();
            registry
                .pinned
                .remove(channel_id)
                .or_else(|| registry.transferred.pop(channel_id))
        };
        match removed {
            Some(bridge) => {
                bridge.close_ports();
                true
            }
            None => false,
        }
    }

    /// Stop listening and close every bridge. The transport stays open.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Install the handler for faults on the inbound path and in port
    /// handlers. Faults are also logged at `warn`.
    pub fn set_fault_handler(&self, handler: impl Fn(&BridgeError) + Send + Sync + 'static) {
        *self
            .inner
            .fault_handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(handler));
    }

    /// Ids of every live bridge, explicit ones first.
    pub fn channel_ids(&self) -> Vec<String> {
        let registry = self.inner.lock_registry();
        let mut ids: Vec<String> = registry.pinned.keys().cloned().collect();
        ids.sort();
        ids.extend(registry.transferred.iter().map(|(id, _)| id.clone()));
        ids
    }

    pub fn stats(&self) -> BridgeStats {
        let counters = &self.inner.counters;
        let channels = {
            let registry = self.inner.lock_registry();
            registry.pinned.len() + registry.transferred.len()
        };
        BridgeStats {
            sent: counters.sent.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            ignored: counters.ignored.load(Ordering::Relaxed),
            faults: counters.faults.load(Ordering::Relaxed),
            channels,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn transport_name(&self) -> &'static str {
        self.inner.transport.transport_name()
    }
}

impl fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeContext")
            .field("transport", &self.transport_name())
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ContextInner {
    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BridgeError::ContextClosed);
        }
        Ok(())
    }

    fn lookup(&self, channel_id: &str) -> Option<Bridge> {
        let mut registry = self.lock_registry();
        if let Some(bridge) = registry.pinned.get(channel_id) {
            return Some(bridge.clone());
        }
        registry.transferred.get(channel_id).cloned()
    }

    /// Bridge for a transferred channel, created on first use.
    fn transferred_bridge(self: &Arc<Self>, channel_id: &str) -> Bridge {
        let (bridge, evicted) = {
            let mut registry = self.lock_registry();
            if let Some(bridge) = registry.pinned.get(channel_id) {
                return bridge.clone();
            }
            if let Some(bridge) = registry.transferred.get(channel_id) {
                return bridge.clone();
            }
            let bridge = Bridge::new(channel_id.to_string(), self);
            let evicted = registry
                .transferred
                .push(channel_id.to_string(), bridge.clone());
            (bridge, evicted)
        };

        if let Some((evicted_id, evicted)) = evicted {
            debug!(channel_id = %evicted_id, "evicting least recently used channel");
            evicted.close_ports();
        }
        bridge
    }

    pub(crate) fn forget(&self, bridge: &Bridge) {
        let mut registry = self.lock_registry();
        let id = bridge.channel_id();
        if registry
            .pinned
            .get(id)
            .is_some_and(|existing| existing.same_bridge(bridge))
        {
            registry.pinned.remove(id);
        } else if registry
            .transferred
            .peek(id)
            .is_some_and(|existing| existing.same_bridge(bridge))
        {
            registry.transferred.pop(id);
        }
    }

    pub(crate) fn send_value(self: &Arc<Self>, channel_id: &str, value: Value) -> Result<()> {
        self.ensure_open()?;
        let envelope = self.encode(channel_id, value)?;
        let text = envelope.to_text()?;
        if text.len() > self.config.max_envelope_len {
            return Err(EnvelopeError::EnvelopeTooLarge {
                size: text.len(),
                max: self.config.max_envelope_len,
            }
            .into());
        }

        self.transport.send(&text)?;
        self.counters.sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            channel_id = %channel_id,
            size = text.len(),
            transfers = envelope.transfer_list.len(),
            "envelope sent"
        );
        Ok(())
    }

    /// Strip transferable leaves out of `payload` and describe them.
    fn encode(self: &Arc<Self>, channel_id: &str, mut payload: Value) -> Result<Envelope> {
        let paths: Vec<Path> = find_transferables(&payload)
            .into_iter()
            .map(|(path, _)| path)
            .collect();

        let mut transfer_list = Vec::with_capacity(paths.len());
        for path in paths {
            let leaf = payload.replace_at(&path, Value::Null)?;
            transfer_list.push(self.encode_transferable(leaf, path)?);
        }

        Ok(Envelope::new(channel_id, payload.to_json(), transfer_list))
    }

    fn encode_transferable(self: &Arc<Self>, leaf: Value, path: Path) -> Result<TransferDescriptor> {
        match leaf {
            Value::Channel(port) => {
                let channel_id = Uuid::new_v4().to_string();
                let bridge = self.transferred_bridge(&channel_id);
                bridge.link(port);
                debug!(channel_id = %channel_id, "port transferred");
                Ok(TransferDescriptor::channel(channel_id, path))
            }
            other => Ok(encode_leaf(&other, path)?),
        }
    }

    fn decode_transferable(self: &Arc<Self>, descriptor: &TransferDescriptor) -> Result<Value> {
        match descriptor.kind {
            TransferKind::Channel => {
                let bridge = self.transferred_bridge(&descriptor.value);
                Ok(Value::Channel(bridge.port()))
            }
            _ => Ok(Value::Binary(decode_binary(descriptor)?)),
        }
    }

    fn handle_text(self: &Arc<Self>, text: &str) -> Result<Routing> {
        self.ensure_open()?;
        let Envelope {
            channel_id,
            payload,
            transfer_list,
        } = Envelope::from_text_bounded(text, self.config.max_envelope_len)?;

        let Some(bridge) = self.lookup(&channel_id) else {
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            trace!(channel_id = %channel_id, "no bridge for channel; ignoring envelope");
            return Ok(Routing::Ignored);
        };

        let transfers = transfer_list.len();
        let mut payload = Value::from_json(payload);
        for descriptor in &transfer_list {
            let value = self.decode_transferable(descriptor)?;
            payload.replace_at(&descriptor.path, value)?;
        }

        bridge.deliver(payload)?;
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        debug!(channel_id = %channel_id, transfers, "envelope delivered");
        Ok(Routing::Delivered)
    }

    fn on_text(self: &Arc<Self>, text: &str) {
        if let Err(err) = self.handle_text(text) {
            self.report_fault(err);
        }
    }

    pub(crate) fn report_fault(&self, err: BridgeError) {
        self.counters.faults.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "bridge fault");
        let handler = self
            .fault_handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(&err);
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(listener) = listener {
            self.transport.unregister_listener(listener);
        }

        let bridges: Vec<Bridge> = {
            let mut registry = self.lock_registry();
            let mut bridges: Vec<Bridge> = registry.pinned.drain().map(|(_, b)| b).collect();
            bridges.extend(registry.transferred.iter().map(|(_, b)| b.clone()));
            registry.transferred.clear();
            bridges
        };
        let count = bridges.len();
        for bridge in bridges {
            bridge.close_ports();
        }
        info!(
            transport = self.transport.transport_name(),
            channels = count,
            "bridge context shut down"
        );
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
