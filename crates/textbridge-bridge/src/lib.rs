//! Channel bridging over a text transport.
//!
//! A [`BridgeContext`] owns one [`TextTransport`](textbridge_transport::TextTransport)
//! and multiplexes any number of duplex channels over it. Each channel is a
//! [`Bridge`] identified by a string id; both sides establish the same id
//! and then talk through ordinary [`Port`](textbridge_envelope::Port)s.
//!
//! Sending a port inside a message transfers it: the receiver gets a port
//! wired to a fresh channel, and the sender's kept end talks to it as if the
//! pair had been created locally.
//!
//! ```no_run
//! use textbridge_bridge::BridgeContext;
//! use textbridge_transport::memory_pair;
//!
//! let (left, right) = memory_pair();
//! let a = BridgeContext::new(left);
//! let b = BridgeContext::new(right);
//!
//! let port_a = a.establish("demo")?.port();
//! let port_b = b.establish("demo")?.port();
//!
//! port_a.send("ping")?;
//! assert_eq!(port_b.recv()?.as_str(), Some("ping"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod error;

pub use bridge::Bridge;
pub use config::{BridgeConfig, DEFAULT_MAX_CHANNELS};
pub use context::{BridgeContext, BridgeStats, FaultHandler, Routing};
pub use error::{BridgeError, Result};
