//! Duplex message channels over any text-only transport.
//!
//! textbridge lets two processes that share nothing but a text pipe (a
//! socket, a WebSocket, a line-oriented stdio link) exchange structured
//! messages on many independent channels. Messages may carry binary
//! payloads and channel endpoints; an endpoint sent across keeps working on
//! the far side.
//!
//! # Crate Structure
//!
//! - [`transport`]: the text transport abstraction and its in-memory,
//!   line-stream and Unix socket implementations
//! - [`envelope`]: message values, local ports and the envelope codec
//! - [`bridge`]: the per-transport channel registry

/// Re-export transport types.
pub mod transport {
    pub use textbridge_transport::*;
}

/// Re-export value, port and codec types.
pub mod envelope {
    pub use textbridge_envelope::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use textbridge_bridge::*;
}

pub use textbridge_bridge::{Bridge, BridgeConfig, BridgeContext, BridgeError};
pub use textbridge_envelope::{Binary, ElementType, Port, Value};
pub use textbridge_transport::TextTransport;
