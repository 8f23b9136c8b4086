use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, Result};
use crate::transfer::TransferDescriptor;

/// Default maximum envelope text size: 16 MiB.
pub const DEFAULT_MAX_ENVELOPE_LEN: usize = 16 * 1024 * 1024;

/// One transmitted message.
///
/// Wire format (JSON, one document per transport message):
/// ```text
/// {
///   "channelId":    "<id>",
///   "payload":      <value with transferable leaves replaced by null>,
///   "transferList": [ { "kind", "subtype"?, "path", "value" }, ... ]
/// }
/// ```
/// Unknown fields are ignored on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub channel_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub transfer_list: Vec<TransferDescriptor>,
}

impl Envelope {
    pub fn new(
        channel_id: impl Into<String>,
        payload: serde_json::Value,
        transfer_list: Vec<TransferDescriptor>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            payload,
            transfer_list,
        }
    }

    /// Render as compact JSON. The output never contains a raw newline.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(EnvelopeError::Serialize)
    }

    /// Parse envelope text.
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(EnvelopeError::Parse)
    }

    /// Parse envelope text, rejecting input longer than `max_len` bytes
    /// before any parsing work.
    pub fn from_text_bounded(text: &str, max_len: usize) -> Result<Self> {
        if text.len() > max_len {
            return Err(EnvelopeError::EnvelopeTooLarge {
                size: text.len(),
                max: max_len,
            });
        }
        Self::from_text(text)
    }
}
