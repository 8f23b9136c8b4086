use textbridge_envelope::DEFAULT_MAX_ENVELOPE_LEN;

/// Default bound on channels created by transfer, per context.
pub const DEFAULT_MAX_CHANNELS: usize = 1024;

/// Configuration for a [`BridgeContext`](crate::BridgeContext).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum number of live channels created by transferring endpoints.
    /// The least recently used one is closed when the bound is exceeded.
    /// Explicitly established bridges are not counted. Minimum 1.
    pub max_channels: usize,
    /// Maximum envelope text size in bytes, inbound and outbound.
    pub max_envelope_len: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_channels: DEFAULT_MAX_CHANNELS,
            max_envelope_len: DEFAULT_MAX_ENVELOPE_LEN,
        }
    }
}
