use std::path::PathBuf;

/// Errors that can occur in text transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// An outbound or inbound text message exceeds the configured limit.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Line-delimited transports cannot carry text with embedded newlines.
    #[error("message contains an embedded newline")]
    EmbeddedNewline,

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
