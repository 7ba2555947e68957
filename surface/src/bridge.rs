//! Parses inbound bridge messages into typed events.
//!
//! Everything the page posts is a `{type, data}` envelope. Parsing never
//! panics and never returns an error: malformed traffic becomes a
//! [`BridgeEvent::ProtocolViolation`] event, unknown envelope types are
//! logged and dropped.

use serde_json::Value;

/// Typed signal decoded from one bridge message.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The page delivered a consent payload.
    ConsentReceived {
        /// Base64 consent string (`data.cmpString`).
        consent_string: String,
        /// The full `data` object for model parsing and persistence.
        payload: Value,
    },
    /// The page asked for the consent layer to be shown.
    OpenReceived,
    /// The page reported an error (including the `window.onerror` shim).
    ErrorReceived { message: String },
    /// The message itself was malformed.
    ProtocolViolation { message: String },
}

/// Decode one raw message. `None` means the message carried no event
/// (empty text, or an unknown envelope type).
#[must_use]
pub fn parse_message(raw: &str) -> Option<BridgeEvent> {
    if raw.trim().is_empty() {
        tracing::warn!("ignoring empty bridge message");
        return None;
    }

    let envelope: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(error) => {
            return Some(BridgeEvent::ProtocolViolation {
                message: format!("bridge message is not valid JSON: {error}"),
            });
        }
    };

    let Some(kind) = envelope.get("type").and_then(Value::as_str) else {
        return Some(BridgeEvent::ProtocolViolation {
            message: "bridge message has no type field".to_string(),
        });
    };
    let data = envelope.get("data");

    match kind.to_lowercase().as_str() {
        "consent" => parse_consent(data),
        "open" => Some(BridgeEvent::OpenReceived),
        "error" => {
            let message = data
                .and_then(|data| data.get("message"))
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or("unknown error reported by consent layer")
                .to_string();
            Some(BridgeEvent::ErrorReceived { message })
        }
        other => {
            tracing::warn!(kind = other, "dropping bridge message of unknown type");
            None
        }
    }
}

fn parse_consent(data: Option<&Value>) -> Option<BridgeEvent> {
    let Some(data) = data.filter(|data| data.is_object()) else {
        return Some(BridgeEvent::ProtocolViolation {
            message: "consent message has no data object".to_string(),
        });
    };

    let consent_string = data
        .get("cmpString")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty());
    let Some(consent_string) = consent_string else {
        return Some(BridgeEvent::ProtocolViolation {
            message: "consent message is missing cmpString".to_string(),
        });
    };

    Some(BridgeEvent::ConsentReceived {
        consent_string: consent_string.to_string(),
        payload: data.clone(),
    })
}
