//! Text-only transport abstraction.
//!
//! The bridge layer only needs two capabilities from a transport: deliver
//! every inbound text message to registered listeners, and send one text
//! message. This crate defines that capability ([`TextTransport`]) and
//! implements it for:
//! - an in-process pipe ([`memory_pair`])
//! - newline-delimited streams ([`LineTransport`]) over TCP or Unix sockets
//! - a Unix domain socket listener ([`UnixDomainSocket`])

pub mod error;
pub mod line;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use line::{LineConfig, LineTransport, DEFAULT_MAX_LINE_LEN};
pub use memory::{memory_pair, MemoryTransport};
pub use traits::{CloseCallback, ListenerId, ListenerSet, TextListener, TextTransport};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
