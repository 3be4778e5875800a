use crate::core::errors::BybitError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Outbound operation record for the realtime stream.
///
/// Every client-to-server message is `{op, args}`; `args` carries topic
/// strings for subscribe/unsubscribe and the credential triple for auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpFrame {
    pub op: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl OpFrame {
    pub fn subscribe(topics: &[String]) -> Self {
        Self {
            op: "subscribe".to_string(),
            args: topics.iter().map(|t| Value::String(t.clone())).collect(),
        }
    }

    pub fn unsubscribe(topics: &[String]) -> Self {
        Self {
            op: "unsubscribe".to_string(),
            args: topics.iter().map(|t| Value::String(t.clone())).collect(),
        }
    }

    pub fn ping() -> Self {
        Self {
            op: "ping".to_string(),
            args: Vec::new(),
        }
    }

    pub fn pong() -> Self {
        Self {
            op: "pong".to_string(),
            args: Vec::new(),
        }
    }

    /// Encode as a text WebSocket message.
    pub fn to_message(&self) -> Result<Message, BybitError> {
        let json = serde_json::to_string(self)?;
        Ok(Message::Text(json))
    }
}
