use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between a command name and the correlation id in a response event name.
pub const RESPONSE_MARKER: &str = "/RESPONSE_";

/// The serializable unit exchanged between contexts.
///
/// On the wire this is `{ "event": ..., "payload": ..., "uuid": ... }`. The
/// `uuid` field is only present on requests and is omitted otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(
        rename = "uuid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<String>,
}

impl Envelope {
    /// A fire-and-forget envelope with no correlation id.
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            correlation_id: None,
        }
    }

    /// A request envelope carrying the correlation id the reply must echo.
    pub fn request(event: impl Into<String>, payload: Value, correlation_id: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload,
            correlation_id: Some(correlation_id.into()),
        }
    }

    /// Event name a handler must emit to answer this envelope, if it is a request.
    pub fn response_event(&self) -> Option<String> {
        self.correlation_id
            .as_deref()
            .map(|id| response_event_name(&self.event, id))
    }

    /// Whether this envelope is itself a reply to some request.
    pub fn is_response(&self) -> bool {
        split_response_event(&self.event).is_some()
    }

    /// Build the raw wire value for this envelope.
    pub fn to_wire(&self) -> Value {
        let mut wire = serde_json::json!({
            "event": self.event,
            "payload": self.payload,
        });
        if let Some(id) = &self.correlation_id {
            wire["uuid"] = Value::String(id.clone());
        }
        wire
    }

    /// Recognize protocol traffic in a raw inbound message.
    ///
    /// Returns `None` for anything without a string `event` field. Such messages
    /// are not protocol traffic and callers discard them without error.
    pub fn from_wire(message: &Value) -> Option<Self> {
        let event = message.get("event")?.as_str()?;
        let payload = message.get("payload").cloned().unwrap_or(Value::Null);
        let correlation_id = match message.get("uuid") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return None,
        };
        Some(Self {
            event: event.to_string(),
            payload,
            correlation_id,
        })
    }
}

/// `"{command}/RESPONSE_{correlation_id}"`
pub fn response_event_name(command: &str, correlation_id: &str) -> String {
    format!("{command}{RESPONSE_MARKER}{correlation_id}")
}

/// Split a response event name into `(command, correlation_id)`.
pub fn split_response_event(name: &str) -> Option<(&str, &str)> {
    let (command, id) = name.rsplit_once(RESPONSE_MARKER)?;
    if command.is_empty() || id.is_empty() {
        return None;
    }
    Some((command, id))
}
