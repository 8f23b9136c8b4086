//! Structured values, local ports and the text envelope codec.
//!
//! A message travelling through a bridge is a [`Value`]: JSON-like data that
//! may also hold binary payloads ([`Binary`]) and channel endpoints
//! ([`Port`]). Before it can cross a text transport it becomes an
//! [`Envelope`]:
//! - the object graph is scanned for transferable leaves ([`scan`])
//! - each leaf is replaced by `null` and described by a
//!   [`TransferDescriptor`] carrying its path
//! - the envelope is rendered as one line of JSON
//!
//! Channel endpoints need a live bridge on both sides and are encoded by
//! `textbridge-bridge`; everything else is handled here.

pub mod binary;
pub mod envelope;
pub mod error;
pub mod path;
pub mod port;
pub mod scan;
pub mod transfer;
pub mod value;

pub use binary::{Binary, ElementType};
pub use envelope::{Envelope, DEFAULT_MAX_ENVELOPE_LEN};
pub use error::{EnvelopeError, Result};
pub use path::{display_path, Path, PathSegment};
pub use port::{Port, PortHandler};
pub use scan::{find_transferables, walk, Walk};
pub use transfer::{decode_binary, encode_binary, encode_leaf, TransferDescriptor, TransferKind};
pub use value::Value;
