//! Error envelope sent to clients.
//!
//! Wire format: `{"msg": "...", "code": 501}`. The code mirrors an HTTP status.
//! Before the upgrade the envelope is an HTTP response body; afterwards it is
//! marshaled into a text frame.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// HTTP-style code for internal failures.
pub const CODE_INTERNAL: u16 = 500;

/// HTTP-style code for unsupported frame types.
pub const CODE_NOT_IMPLEMENTED: u16 = 501;

/// Structured error reported to the peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable description.
    pub msg: String,
    /// HTTP-style status code.
    pub code: u16,
}

impl ErrorEnvelope {
    /// Build an envelope.
    pub fn new(msg: impl Into<String>, code: u16) -> Self {
        Self {
            msg: msg.into(),
            code,
        }
    }

    /// A 500 envelope.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(msg, CODE_INTERNAL)
    }

    /// The 501 envelope for a non-text frame.
    pub fn unsupported_frame() -> Self {
        Self::new("Only text messages are supported", CODE_NOT_IMPLEMENTED)
    }

    /// Serialize to JSON. Falls back to the bare message text if encoding fails.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.msg.clone())
    }

    /// Encode as an outbound [`Message`].
    pub fn to_message(&self) -> Message {
        Message::from(self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let env = ErrorEnvelope::new("boom", 500);
        let value: serde_json::Value = serde_json::from_str(&env.to_json()).unwrap();
        assert_eq!(value, serde_json::json!({"msg": "boom", "code": 500}));
    }

    #[test]
    fn unsupported_frame_is_501() {
        let env = ErrorEnvelope::unsupported_frame();
        assert_eq!(env.code, CODE_NOT_IMPLEMENTED);
        assert!(env.msg.contains("text"));
    }

    #[test]
    fn internal_is_500() {
        assert_eq!(ErrorEnvelope::internal("x").code, 500);
    }

    #[test]
    fn to_message_is_json_text() {
        let msg = ErrorEnvelope::unsupported_frame().to_message();
        let parsed: ErrorEnvelope = serde_json::from_slice(msg.as_bytes()).unwrap();
        assert_eq!(parsed.code, 501);
    }
}
