//! Messages pages post to the controller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recognized client message shapes, tagged by their `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// `{ "type": "SKIP_WAITING" }`
    SkipWaiting,
}

impl ClientMessage {
    /// Parse a posted payload. Unknown shapes yield `None`.
    pub fn parse(payload: &Value) -> Option<Self> {
        Self::deserialize(payload).ok()
    }
}
