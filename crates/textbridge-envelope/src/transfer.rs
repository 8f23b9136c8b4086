//! Transfer descriptors and the binary half of the transferable codec.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::binary::{Binary, ElementType};
use crate::error::{EnvelopeError, Result};
use crate::path::Path;
use crate::value::Value;

/// Kind tag of a transfer descriptor.
///
/// Unrecognised tags survive parsing as `Unknown` so the fault surfaces when
/// the descriptor is decoded, not when the envelope is read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Binary,
    Channel,
    Unknown(String),
}

impl TransferKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransferKind::Binary => "binary",
            TransferKind::Channel => "channel",
            TransferKind::Unknown(other) => other,
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransferKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransferKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "binary" => TransferKind::Binary,
            "channel" => TransferKind::Channel,
            _ => TransferKind::Unknown(tag),
        })
    }
}

/// Describes one transferable leaf removed from a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescriptor {
    pub kind: TransferKind,
    /// Element type, binary descriptors only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<ElementType>,
    /// Where the leaf sat in the payload.
    pub path: Path,
    /// Hex bytes for binaries, channel id for channels.
    pub value: String,
}

impl TransferDescriptor {
    /// Descriptor for a channel endpoint registered under `channel_id`.
    pub fn channel(channel_id: impl Into<String>, path: Path) -> Self {
        Self {
            kind: TransferKind::Channel,
            subtype: None,
            path,
            value: channel_id.into(),
        }
    }
}

/// Encode a binary payload or typed view.
pub fn encode_binary(binary: &Binary, path: Path) -> TransferDescriptor {
    TransferDescriptor {
        kind: TransferKind::Binary,
        subtype: Some(binary.element_type()),
        path,
        value: binary.to_hex(),
    }
}

/// Decode a binary descriptor. A missing subtype means a raw buffer.
pub fn decode_binary(descriptor: &TransferDescriptor) -> Result<Binary> {
    match descriptor.kind {
        TransferKind::Binary => {
            Binary::from_hex(descriptor.subtype.unwrap_or_default(), &descriptor.value)
        }
        TransferKind::Channel => Err(EnvelopeError::UnsupportedTransferable(
            "channel descriptors require a bridge",
        )),
        TransferKind::Unknown(ref kind) => Err(EnvelopeError::UnknownTransferable(kind.clone())),
    }
}

/// Encode a leaf that needs no channel plumbing.
///
/// Channel endpoints need a bridge to carry them and are rejected here, as
/// is anything that is not transferable at all.
pub fn encode_leaf(value: &Value, path: Path) -> Result<TransferDescriptor> {
    match value {
        Value::Binary(binary) => Ok(encode_binary(binary, path)),
        Value::Channel(_) => Err(EnvelopeError::UnsupportedTransferable(
            "channel endpoints require a bridge",
        )),
        _ => Err(EnvelopeError::UnsupportedTransferable(
            "value is not a binary payload or channel endpoint",
        )),
    }
}
