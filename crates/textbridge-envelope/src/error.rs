use std::time::Duration;

use crate::binary::ElementType;

/// Errors raised while encoding, decoding or delivering envelopes.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Inbound text is not a well-formed envelope.
    #[error("malformed envelope: {0}")]
    Parse(#[source] serde_json::Error),

    /// An envelope could not be rendered as text.
    #[error("envelope serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Inbound text exceeds the configured envelope size.
    #[error("envelope too large ({size} bytes, max {max})")]
    EnvelopeTooLarge { size: usize, max: usize },

    /// A leaf classified as transferable has no encoder.
    #[error("unsupported transferable: {0}")]
    UnsupportedTransferable(&'static str),

    /// A transfer descriptor carries a kind this side does not understand.
    #[error("unknown transferable kind {0:?}")]
    UnknownTransferable(String),

    /// A binary descriptor value is not valid hexadecimal.
    #[error("invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A typed view's byte length is not a multiple of its element width.
    #[error("{len} bytes do not form a {subtype} view (element width {width})")]
    MisalignedView {
        subtype: ElementType,
        len: usize,
        width: usize,
    },

    /// A descriptor path does not address a slot in the payload.
    #[error("path {0} does not exist in payload")]
    PathNotFound(String),

    /// The other end of a port has been closed.
    #[error("port closed")]
    PortClosed,

    /// No message arrived on a port within the timeout.
    #[error("no message received within {0:?}")]
    RecvTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
