//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration for a chat session.

use arrrg_derive::CommandLine;

use crate::Result;
use crate::types::Mode;

/// Default relay the chat client talks to.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:5000/";

/// Command-line arguments for the moderelay-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the relay.
    #[arrrg(optional, "Relay base URL (default: http://127.0.0.1:5000/)", "URL")]
    pub relay_url: Option<String>,

    /// Mode to start in.
    #[arrrg(optional, "Mode to start in (default: executive)", "MODE")]
    pub mode: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the relay, always ending in `/`.
    pub relay_url: String,

    /// Mode the session starts in.
    pub mode: Mode,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            mode: Mode::Executive,
            use_color: true,
        }
    }

    /// Sets the relay URL.
    pub fn with_relay_url(mut self, relay_url: impl Into<String>) -> Self {
        let mut relay_url = relay_url.into();
        if !relay_url.ends_with('/') {
            relay_url.push('/');
        }
        self.relay_url = relay_url;
        self
    }

    /// Sets the starting mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The chat endpoint of the relay.
    pub fn chat_url(&self) -> Result<url::Url> {
        Ok(url::Url::parse(&self.relay_url)?.join("api/chat")?)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = crate::Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(relay_url) = args.relay_url {
            url::Url::parse(&relay_url)?;
            config = config.with_relay_url(relay_url);
        }
        if let Some(mode) = args.mode {
            config = config.with_mode(mode.parse()?);
        }
        if args.no_color {
            config = config.without_color();
        }
        Ok(config)
    }
}
