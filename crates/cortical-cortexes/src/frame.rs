//! The frame envelope sent by the webcam client.
//!
//! ```json
//! {"action": "...", "message": ..., "dataURI": {"contentType": "image/jpeg", "content": "<base64>"}}
//! ```
//!
//! Only the cortexes that handle images know this shape; the dispatcher
//! treats every message as opaque bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cortical_core::{CoreError, Message};
use serde::{Deserialize, Deserializer};

/// A decoded client frame.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    /// Free-form action name.
    #[serde(default)]
    pub action: String,
    /// Free-form message attached by the client.
    #[serde(default)]
    pub message: serde_json::Value,
    /// Embedded binary content, if any.
    #[serde(rename = "dataURI", default)]
    pub data_uri: Option<DataUri>,
}

/// Binary content and its media type.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUri {
    /// MIME type, e.g. `image/jpeg`.
    #[serde(default)]
    pub content_type: String,
    /// Decoded bytes.
    #[serde(default, deserialize_with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl FramePayload {
    /// Parse a message as a frame envelope.
    pub fn decode(msg: &Message) -> Result<Self, CoreError> {
        serde_json::from_slice(msg.as_bytes()).map_err(CoreError::from)
    }

    /// The content bytes when the frame carries `content_type`.
    pub fn content_of(&self, content_type: &str) -> Option<&[u8]> {
        self.data_uri
            .as_ref()
            .filter(|d| d.content_type == content_type && !d.content.is_empty())
            .map(|d| d.content.as_slice())
    }
}

/// Accepts bare base64 or a full `data:<type>;base64,<payload>` URL.
fn base64_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let encoded = match raw.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => raw.as_str(),
    };
    STANDARD.decode(encoded.trim()).map_err(serde::de::Error::custom)
}
