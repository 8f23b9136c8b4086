/// Errors that can occur while bridging channels.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] textbridge_transport::TransportError),

    /// Envelope encoding or decoding error.
    #[error("envelope error: {0}")]
    Envelope(#[from] textbridge_envelope::EnvelopeError),

    /// The bridge context has been shut down.
    #[error("bridge context closed")]
    ContextClosed,

    /// The bridge for this channel has been closed.
    #[error("channel {0:?} closed")]
    ChannelClosed(String),

    /// No bridge is registered for this channel id.
    #[error("no bridge registered for channel {0:?}")]
    UnknownChannel(String),
}

impl BridgeError {
    /// Whether inbound text could not be parsed as an envelope.
    pub fn is_parse_fault(&self) -> bool {
        matches!(
            self,
            BridgeError::Envelope(textbridge_envelope::EnvelopeError::Parse(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
