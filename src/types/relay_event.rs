use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Data of the terminal event.  Never valid JSON, so it cannot collide with a
/// fragment payload.
pub const DONE_MARKER: &str = "[DONE]";

/// JSON payload of a fragment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentPayload {
    /// The incremental text delta.
    pub content: String,
}

/// An event on the caller-facing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// One incremental text delta, in upstream order.
    Fragment(String),
    /// End of stream; emitted once, after every fragment.
    Done,
}

impl RelayEvent {
    /// The `data:` field for this event.
    pub fn data(&self) -> String {
        match self {
            RelayEvent::Fragment(content) => {
                serde_json::json!({ "content": content }).to_string()
            }
            RelayEvent::Done => DONE_MARKER.to_string(),
        }
    }

    /// This event framed as a server-sent event.
    pub fn to_wire(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    /// Decode the `data:` field of a received event.
    pub fn decode(data: &str) -> Result<Self> {
        if data == DONE_MARKER {
            return Ok(RelayEvent::Done);
        }
        let payload: FragmentPayload = serde_json::from_str(data).map_err(|e| {
            Error::serialization(
                format!("Malformed fragment {data:?}: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(RelayEvent::Fragment(payload.content))
    }
}
