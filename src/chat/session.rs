//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! and talks to the relay.

use reqwest::Client as ReqwestClient;
use reqwest::header::{self, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::chat::config::ChatConfig;
use crate::consumer::{Conversation, TurnOutcome, read_turn};
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::types::{ChatMessage, ErrorBody, Mode, today};

/// A chat session that manages conversation state and relay interactions.
pub struct ChatSession {
    client: ReqwestClient,
    config: ChatConfig,
    chat_url: url::Url,
    conversation: Conversation,
    request_count: u64,
}

impl ChatSession {
    /// Creates a session from the given configuration.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let chat_url = config.chat_url()?;
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let conversation = Conversation::start(config.mode, today());
        Ok(Self {
            client,
            config,
            chat_url,
            conversation,
            request_count: 0,
        })
    }

    /// Sends a message and renders the streamed reply.
    ///
    /// Errors are returned only when no stream was opened; the pending turn
    /// is dropped in that case.  Cancelling `cancel` abandons the request or
    /// stream and yields [`TurnOutcome::Interrupted`].
    pub async fn send_streaming(
        &mut self,
        user_message: &str,
        renderer: &mut dyn Renderer,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        self.conversation.push_user(user_message);
        self.conversation.begin_turn();
        self.request_count += 1;

        let request = self.conversation.request();
        let send = self
            .client
            .post(self.chat_url.clone())
            .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&request)
            .send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.conversation.fail_turn();
                renderer.print_interrupted();
                return Ok(TurnOutcome::Interrupted);
            }
            response = send => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.conversation.fail_turn();
                return Err(if e.is_connect() {
                    Error::connection(
                        format!("Could not reach relay at {}: {e}", self.config.relay_url),
                        Some(Box::new(e)),
                    )
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                });
            }
        };

        if !response.status().is_success() {
            self.conversation.fail_turn();
            return Err(Self::process_error_response(response).await);
        }

        let mode = self.conversation.mode();
        renderer.start_response(mode);
        let outcome = read_turn(
            response.bytes_stream(),
            &mut self.conversation,
            |fragment, _| renderer.print_text(fragment),
            cancel,
        )
        .await;
        match outcome {
            TurnOutcome::Completed => renderer.finish_response(),
            TurnOutcome::Truncated => renderer.print_truncated(),
            TurnOutcome::Interrupted => renderer.print_interrupted(),
        }
        Ok(outcome)
    }

    async fn process_error_response(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody {
                error,
                details: Some(details),
            }) => Error::api(status, None, format!("{error}: {details}")),
            Ok(ErrorBody { error, .. }) => Error::api(status, None, error),
            Err(_) => Error::api(status, None, format!("relay returned {body:?}")),
        }
    }

    /// Clears the conversation, keeping the mode.
    pub fn clear(&mut self) {
        self.conversation.reset(self.conversation.mode(), today());
    }

    /// Switches mode and starts a new conversation.
    pub fn set_mode(&mut self, mode: Mode) {
        self.config.mode = mode;
        self.conversation.reset(mode, today());
    }

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.conversation.mode()
    }

    /// The conversation, starting with the start-of-chat message.
    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    /// The start-of-chat message of the current conversation.
    pub fn welcome(&self) -> ChatMessage {
        ChatMessage::assistant(self.conversation.welcome())
    }

    /// Number of messages in the conversation, excluding the start-of-chat message.
    pub fn message_count(&self) -> usize {
        self.conversation.messages().len().saturating_sub(1)
    }

    /// Number of requests sent to the relay.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// The relay this session talks to.
    pub fn relay_url(&self) -> &str {
        &self.config.relay_url
    }
}
