//! The streaming relay.
//!
//! A [`Relay`] accepts one conversation and mode, opens exactly one upstream
//! streaming completion, and hands back a [`RelayStream`] that re-emits every
//! upstream fragment in receipt order followed by a single
//! [`RelayEvent::Done`].
//!
//! The stream is a three-state machine:
//!
//! ```text
//!   Idle ──relay()──▶ Streaming ──upstream done──▶ Terminated (+ Done)
//!                       │  ▲   ──upstream error─▶ Terminated (no Done)
//!                       └──┘   ──caller drop───▶ Terminated (no Done)
//!                     fragment
//! ```
//!
//! Dropping the stream drops the upstream stream with it, which closes the
//! upstream connection.  Nothing is retried.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Stream;
use futures::stream::FusedStream;

use crate::Result;
use crate::observability::{
    RELAY_REJECTED, RELAY_REQUESTS, RELAY_SETUP_ERRORS, STREAM_COMPLETED, STREAM_DISCONNECTS,
    STREAM_DURATION, STREAM_FRAGMENT_BYTES, STREAM_FRAGMENTS, STREAM_TTFF,
    STREAM_UPSTREAM_ERRORS,
};
use crate::provider::{CompletionProvider, FragmentStream};
use crate::types::{ChatCompletionCreateParams, ChatMessage, CompletionMessage, Mode, RelayEvent};

/// Default upstream model.
pub const DEFAULT_MODEL: &str = "gpt-5";

/// Default cap on generated tokens per response.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 8192;

/// Upstream request settings shared by every relay invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Upstream model identifier.
    pub model: String,
    /// Cap on generated tokens per response.
    pub max_completion_tokens: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
        }
    }
}

/// Forwards conversations to a [`CompletionProvider`] and relays its output.
///
/// A `Relay` holds no per-conversation state, so one instance serves any
/// number of concurrent conversations.
#[derive(Clone)]
pub struct Relay {
    provider: Arc<dyn CompletionProvider>,
    settings: RelaySettings,
}

impl Relay {
    /// Create a relay in front of `provider`.
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: RelaySettings) -> Self {
        Self { provider, settings }
    }

    /// The settings applied to every upstream request.
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Build the upstream request: the mode's system prompt, then the prefix.
    pub fn params(&self, mode: Mode, prefix: Vec<ChatMessage>) -> ChatCompletionCreateParams {
        let mut messages = Vec::with_capacity(prefix.len() + 1);
        messages.push(CompletionMessage::system(
            mode.descriptor().system_prompt.clone(),
        ));
        messages.extend(prefix.into_iter().map(CompletionMessage::from));
        ChatCompletionCreateParams::new(
            self.settings.model.clone(),
            messages,
            self.settings.max_completion_tokens,
        )
    }

    /// Relay a conversation under the mode named by `mode`.
    ///
    /// An identifier outside the fixed set fails with
    /// [`Error::InvalidMode`](crate::Error::InvalidMode) before the upstream is
    /// contacted.
    pub async fn relay(&self, prefix: Vec<ChatMessage>, mode: &str) -> Result<RelayStream> {
        let mode = match mode.parse::<Mode>() {
            Ok(mode) => mode,
            Err(err) => {
                RELAY_REJECTED.click();
                return Err(err);
            }
        };
        self.relay_mode(prefix, mode).await
    }

    /// Relay a conversation under an already-resolved mode.
    ///
    /// Errors returned here happened before any fragment was produced.
    pub async fn relay_mode(&self, prefix: Vec<ChatMessage>, mode: Mode) -> Result<RelayStream> {
        RELAY_REQUESTS.click();
        let turns = prefix.len();
        let mut stream = RelayStream::new(mode);
        let params = self.params(mode, prefix);
        match self.provider.stream(params).await {
            Ok(upstream) => {
                tracing::info!(%mode, turns, "relaying conversation");
                stream.start(upstream);
                Ok(stream)
            }
            Err(err) => {
                RELAY_SETUP_ERRORS.click();
                tracing::warn!(%mode, error = %err, "upstream rejected completion request");
                Err(err)
            }
        }
    }
}

/// Lifecycle state of a [`RelayStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Created, upstream not yet open.
    Idle,
    /// Upstream open; fragments are flowing.
    Streaming,
    /// Finished, failed, or abandoned.  Terminal.
    Terminated,
}

/// The caller-facing event stream of one relay invocation.
///
/// Owns its upstream exclusively; nothing is shared between invocations.
pub struct RelayStream {
    mode: Mode,
    state: RelayState,
    upstream: Option<FragmentStream>,
    started: Instant,
    fragments: u64,
}

impl RelayStream {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            state: RelayState::Idle,
            upstream: None,
            started: Instant::now(),
            fragments: 0,
        }
    }

    fn start(&mut self, upstream: FragmentStream) {
        debug_assert_eq!(self.state, RelayState::Idle);
        self.upstream = Some(upstream);
        self.state = RelayState::Streaming;
    }

    fn terminate(&mut self) {
        self.upstream = None;
        self.state = RelayState::Terminated;
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
    }

    /// The current lifecycle state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// The mode this stream was opened under.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of fragments emitted so far.
    pub fn fragments(&self) -> u64 {
        self.fragments
    }
}

impl Stream for RelayStream {
    type Item = RelayEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != RelayState::Streaming {
            return Poll::Ready(None);
        }
        let Some(upstream) = this.upstream.as_mut() else {
            this.terminate();
            return Poll::Ready(None);
        };
        loop {
            match upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(fragment))) if fragment.is_empty() => continue,
                Poll::Ready(Some(Ok(fragment))) => {
                    if this.fragments == 0 {
                        STREAM_TTFF.add(this.started.elapsed().as_secs_f64());
                    }
                    this.fragments += 1;
                    STREAM_FRAGMENTS.click();
                    STREAM_FRAGMENT_BYTES.count(fragment.len() as u64);
                    return Poll::Ready(Some(RelayEvent::Fragment(fragment)));
                }
                Poll::Ready(Some(Err(err))) => {
                    STREAM_UPSTREAM_ERRORS.click();
                    tracing::warn!(
                        mode = %this.mode,
                        fragments = this.fragments,
                        error = %err,
                        "upstream failed mid-stream; closing without [DONE]"
                    );
                    this.terminate();
                    return Poll::Ready(None);
                }
                Poll::Ready(None) => {
                    STREAM_COMPLETED.click();
                    tracing::info!(
                        mode = %this.mode,
                        fragments = this.fragments,
                        "stream complete"
                    );
                    this.terminate();
                    return Poll::Ready(Some(RelayEvent::Done));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl FusedStream for RelayStream {
    fn is_terminated(&self) -> bool {
        self.state == RelayState::Terminated
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.state == RelayState::Streaming {
            STREAM_DISCONNECTS.click();
            tracing::debug!(
                mode = %self.mode,
                fragments = self.fragments,
                "caller disconnected; abandoning upstream"
            );
            self.terminate();
        }
    }
}
