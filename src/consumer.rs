//! The client side of the relay: reading an event stream into a conversation.
//!
//! An [`AssistantTurn`] accumulates fragments into one growing buffer and
//! freezes it when the stream ends.  It is a plain state machine driven by
//! [`TurnEvent`]s, so it can be exercised without any I/O or rendering.
//! [`read_turn`] drives it from the bytes of a relay response.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use time::Date;
use tokio_util::sync::CancellationToken;

use crate::observability::CONSUMER_MALFORMED_EVENTS;
use crate::sse::process_sse;
use crate::types::{ChatMessage, ChatRequest, Mode, RelayEvent};

/// Lifecycle state of an [`AssistantTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No fragment received yet.
    Idle,
    /// At least one fragment received; more may follow.
    Streaming,
    /// Frozen.  Further events are ignored.
    Terminated,
}

/// How a turn reached [`TurnState::Terminated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The terminal marker arrived.
    Completed,
    /// The stream closed without the terminal marker.
    Truncated,
    /// The reader abandoned the stream.
    Interrupted,
}

/// Something that happened on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A text fragment arrived.
    FragmentReceived(String),
    /// The stream ended; `done` is true when the terminal marker was seen.
    StreamEnded { done: bool },
    /// The reader gave up on the stream.
    CallerDisconnected,
}

/// The assistant's current turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantTurn {
    text: String,
    fragments: usize,
    outcome: Option<TurnOutcome>,
}

impl AssistantTurn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        match (self.outcome, self.fragments) {
            (Some(_), _) => TurnState::Terminated,
            (None, 0) => TurnState::Idle,
            (None, _) => TurnState::Streaming,
        }
    }

    /// The accumulated text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn outcome(&self) -> Option<TurnOutcome> {
        self.outcome
    }

    /// Advance the state machine and return the new state.
    pub fn apply(&mut self, event: TurnEvent) -> TurnState {
        if self.outcome.is_some() {
            return TurnState::Terminated;
        }
        match event {
            TurnEvent::FragmentReceived(fragment) => {
                self.text.push_str(&fragment);
                self.fragments += 1;
            }
            TurnEvent::StreamEnded { done: true } => self.outcome = Some(TurnOutcome::Completed),
            TurnEvent::StreamEnded { done: false } => self.outcome = Some(TurnOutcome::Truncated),
            TurnEvent::CallerDisconnected => self.outcome = Some(TurnOutcome::Interrupted),
        }
        self.state()
    }
}

/// A conversation as seen by the client.
///
/// The first message is always the mode's start-of-chat message.  It is
/// shown to the user but never sent to the relay.
#[derive(Debug, Clone)]
pub struct Conversation {
    mode: Mode,
    messages: Vec<ChatMessage>,
    pending: Option<AssistantTurn>,
}

impl Conversation {
    /// Start a conversation in `mode`, greeting with the start-of-chat message.
    pub fn start(mode: Mode, date: Date) -> Self {
        let welcome = mode.descriptor().start_of_chat(date);
        Self {
            mode,
            messages: vec![ChatMessage::assistant(welcome)],
            pending: None,
        }
    }

    /// Discard everything and start again in `mode`.
    pub fn reset(&mut self, mode: Mode, date: Date) {
        *self = Self::start(mode, date);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Every message, including the start-of-chat message.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The start-of-chat message.
    pub fn welcome(&self) -> &str {
        self.messages.first().map(|m| m.content.as_str()).unwrap_or("")
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// The turns to send upstream: everything after the start-of-chat message.
    pub fn request_prefix(&self) -> Vec<ChatMessage> {
        self.messages.iter().skip(1).cloned().collect()
    }

    /// The relay request for the conversation as it stands.
    pub fn request(&self) -> ChatRequest {
        ChatRequest::new(self.request_prefix(), self.mode)
    }

    /// Open a new assistant turn.  Any unfinished turn is discarded.
    pub fn begin_turn(&mut self) {
        self.pending = Some(AssistantTurn::new());
    }

    /// The turn being streamed, if any.
    pub fn pending(&self) -> Option<&AssistantTurn> {
        self.pending.as_ref()
    }

    /// The text of the turn being streamed.
    pub fn current_text(&self) -> &str {
        self.pending.as_ref().map(AssistantTurn::text).unwrap_or("")
    }

    /// Feed an event to the pending turn.
    ///
    /// When the turn terminates it is frozen into the message list.  A
    /// completed turn is always kept; a truncated or interrupted one only if
    /// it produced text.  Returns `None` when no turn is open.
    pub fn apply(&mut self, event: TurnEvent) -> Option<TurnState> {
        let turn = self.pending.as_mut()?;
        let state = turn.apply(event);
        if state == TurnState::Terminated {
            self.finish();
        }
        Some(state)
    }

    fn finish(&mut self) {
        let Some(turn) = self.pending.take() else {
            return;
        };
        let keep = turn.outcome() == Some(TurnOutcome::Completed) || !turn.text().is_empty();
        if keep {
            self.messages.push(ChatMessage::assistant(turn.text));
        }
    }

    /// Drop the pending turn without recording it, as when the request failed
    /// before any stream opened.
    pub fn fail_turn(&mut self) {
        self.pending = None;
    }
}

/// Read a relay response body into the conversation's pending turn.
///
/// `on_fragment` is called after every fragment with the fragment and the
/// text accumulated so far.  Malformed events are logged and skipped.
/// Cancelling `cancel` abandons the stream.  The caller must have called
/// [`Conversation::begin_turn`].
pub async fn read_turn<S, E, F>(
    byte_stream: S,
    conversation: &mut Conversation,
    mut on_fragment: F,
    cancel: CancellationToken,
) -> TurnOutcome
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: FnMut(&str, &str),
{
    if conversation.pending().is_none() {
        conversation.begin_turn();
    }
    let mut events = std::pin::pin!(process_sse(byte_stream));
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("abandoning relay stream");
                conversation.apply(TurnEvent::CallerDisconnected);
                return TurnOutcome::Interrupted;
            }
            next = events.next() => next,
        };
        match next {
            Some(Ok(event)) => match RelayEvent::decode(&event.data) {
                Ok(RelayEvent::Fragment(fragment)) => {
                    conversation.apply(TurnEvent::FragmentReceived(fragment.clone()));
                    on_fragment(&fragment, conversation.current_text());
                }
                Ok(RelayEvent::Done) => {
                    conversation.apply(TurnEvent::StreamEnded { done: true });
                    return TurnOutcome::Completed;
                }
                Err(err) => {
                    CONSUMER_MALFORMED_EVENTS.click();
                    tracing::warn!(error = %err, "skipping malformed relay event");
                }
            },
            Some(Err(err)) if err.is_streaming() => {
                tracing::warn!(error = %err, "relay stream failed");
                conversation.apply(TurnEvent::StreamEnded { done: false });
                return TurnOutcome::Truncated;
            }
            Some(Err(err)) => {
                CONSUMER_MALFORMED_EVENTS.click();
                tracing::warn!(error = %err, "skipping undecodable relay event");
            }
            None => {
                conversation.apply(TurnEvent::StreamEnded { done: false });
                return TurnOutcome::Truncated;
            }
        }
    }
}
