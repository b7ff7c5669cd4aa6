use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ChatMessage, Mode};

/// Validation `param` naming the request body as a whole.
pub const BODY_PARAM: &str = "body";

/// Body of an inbound chat request.
///
/// Both fields are optional on the wire so that a missing field is reported
/// as a structured validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Prior turns, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,

    /// Mode identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl ChatRequest {
    /// Build a well-formed request.
    pub fn new(messages: Vec<ChatMessage>, mode: Mode) -> Self {
        Self {
            messages: Some(messages),
            mode: Some(mode.id().to_string()),
        }
    }

    /// Parse a request body.
    ///
    /// A body that is not a JSON object of the expected shape fails with a
    /// validation error whose `param` is [`BODY_PARAM`] and whose message is
    /// the parser's diagnostic.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| Error::validation(e.to_string(), Some(BODY_PARAM.to_string())))
    }

    /// Split the request into its turns and resolved mode.
    ///
    /// Fails with a validation error when either field is missing and with
    /// [`Error::InvalidMode`] when the mode is outside the fixed set.
    pub fn into_parts(self) -> Result<(Vec<ChatMessage>, Mode)> {
        let (Some(messages), Some(mode)) = (self.messages, self.mode.filter(|m| !m.is_empty()))
        else {
            return Err(Error::validation("Missing messages or mode", None));
        };
        let mode = mode.parse::<Mode>()?;
        Ok((messages, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_body() {
        let body = br#"{"messages":[{"role":"user","content":"Hello"}],"mode":"direct"}"#;
        let (messages, mode) = ChatRequest::from_slice(body).unwrap().into_parts().unwrap();
        assert_eq!(messages, vec![ChatMessage::user("Hello")]);
        assert_eq!(mode, Mode::Direct);
    }

    #[test]
    fn empty_history_is_allowed() {
        let body = br#"{"messages":[],"mode":"support"}"#;
        let (messages, mode) = ChatRequest::from_slice(body).unwrap().into_parts().unwrap();
        assert!(messages.is_empty());
        assert_eq!(mode, Mode::Support);
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        for body in [
            &br#"{"mode":"direct"}"#[..],
            &br#"{"messages":[]}"#[..],
            &br#"{"messages":[],"mode":""}"#[..],
            &b"{}"[..],
        ] {
            let err = ChatRequest::from_slice(body)
                .unwrap()
                .into_parts()
                .unwrap_err();
            assert!(err.is_validation(), "{err}");
        }
    }

    #[test]
    fn unknown_mode_is_invalid_mode() {
        let body = br#"{"messages":[],"mode":"nonexistent"}"#;
        let err = ChatRequest::from_slice(body).unwrap().into_parts().unwrap_err();
        assert!(err.is_invalid_mode());
    }

    #[test]
    fn malformed_body_is_validation_error() {
        assert!(ChatRequest::from_slice(b"not json").unwrap_err().is_validation());
        let err = ChatRequest::from_slice(br#"{"messages":"hello","mode":"direct"}"#).unwrap_err();
        match err {
            Error::Validation { message, param } => {
                assert_eq!(param.as_deref(), Some(BODY_PARAM));
                assert!(message.contains("line 1"), "{message}");
            }
            err => panic!("expected validation error, got {err:?}"),
        }
    }
}
