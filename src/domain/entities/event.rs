use chrono::{DateTime, Utc};

/// A named occurrence flowing through the dispatcher
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub data: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
            at: Utc::now(),
        }
    }

    /// An event with no payload
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, serde_json::Value::Null)
    }

    /// An incoming chat message event
    pub fn message(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            "message",
            serde_json::json!({ "chat": chat_id.into(), "text": text.into() }),
        )
    }

    pub fn text(&self) -> Option<&str> {
        self.data.get("text").and_then(|t| t.as_str())
    }
}
