//! Command-line configuration for the relay server.

use std::net::SocketAddr;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_API_URL, DEFAULT_TIMEOUT, OpenAi};
use crate::error::{Error, Result};
use crate::relay::{DEFAULT_MAX_COMPLETION_TOKENS, DEFAULT_MODEL, RelaySettings};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Command-line arguments for the moderelay-server tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct RelayArgs {
    /// Address to listen on.
    #[arrrg(optional, "Address to listen on (default: 127.0.0.1:5000)", "ADDR")]
    pub bind: Option<String>,

    /// Upstream model.
    #[arrrg(optional, "Upstream model (default: gpt-5)", "MODEL")]
    pub model: Option<String>,

    /// Maximum completion tokens per response.
    #[arrrg(optional, "Max completion tokens per response (default: 8192)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Upstream API base URL.
    #[arrrg(optional, "Upstream API base URL (default: https://api.openai.com/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Upstream request timeout in seconds.
    #[arrrg(optional, "Upstream request timeout in seconds (default: 600)", "SECS")]
    pub timeout_secs: Option<u64>,
}

/// Resolved relay server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Settings applied to every upstream request.
    pub settings: RelaySettings,
    /// Upstream API base URL.
    pub base_url: String,
    /// Upstream request timeout.
    pub timeout: Duration,
}

impl RelayConfig {
    /// Build the upstream client.  The key comes from `OPENAI_API_KEY` when
    /// `api_key` is `None`.
    pub fn provider(&self, api_key: Option<String>) -> Result<OpenAi> {
        OpenAi::with_options(api_key, Some(self.base_url.clone()), Some(self.timeout))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            settings: RelaySettings::default(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TryFrom<RelayArgs> for RelayConfig {
    type Error = Error;

    fn try_from(args: RelayArgs) -> Result<Self> {
        let bind = args.bind.as_deref().unwrap_or(DEFAULT_BIND);
        let bind = bind.parse::<SocketAddr>().map_err(|e| {
            Error::validation(
                format!("invalid bind address {bind:?}: {e}"),
                Some("bind".to_string()),
            )
        })?;
        let max_completion_tokens = args.max_tokens.unwrap_or(DEFAULT_MAX_COMPLETION_TOKENS);
        if max_completion_tokens == 0 {
            return Err(Error::validation(
                "max tokens must be positive",
                Some("max-tokens".to_string()),
            ));
        }
        let base_url = args.base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&base_url)?;
        let timeout = args
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Ok(Self {
            bind,
            settings: RelaySettings {
                model: args.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_completion_tokens,
            },
            base_url,
            timeout,
        })
    }
}
