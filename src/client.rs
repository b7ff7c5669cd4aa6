use std::env;
use std::time::Duration;

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};

use crate::error::{Error, Result};
use crate::provider::{CompletionProvider, FragmentStream};
use crate::sse::{SseEvent, process_sse};
use crate::types::{
    ChatCompletionChunk, ChatCompletionCreateParams, DONE_MARKER, UpstreamErrorBody,
};

/// Default base URL of the upstream API.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Overall request timeout, including the time spent streaming the body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming client for an OpenAI-compatible chat-completion API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl OpenAi {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the OPENAI_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };

        let base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&base_url)?;
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<UpstreamErrorBody>(&error_body)
            .map(|body| body.error)
            .unwrap_or_default();
        let error_message = detail.message.unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(error_message, detail.param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, detail.error_type, error_message),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Send a completion request and stream back its text fragments.
    ///
    /// The returned stream yields each non-empty delta in order and ends after
    /// the upstream's `[DONE]` marker.  A body that ends without the marker,
    /// or an error object inside the stream, is yielded as an error.
    pub async fn stream_completion(
        &self,
        mut params: ChatCompletionCreateParams,
    ) -> Result<FragmentStream> {
        params.stream = true;
        let url = format!("{}chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&params)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(fragments(process_sse(response.bytes_stream()))))
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAi {
    async fn stream(&self, params: ChatCompletionCreateParams) -> Result<FragmentStream> {
        self.stream_completion(params).await
    }
}

/// Reduce upstream events to text fragments.
fn fragments<S>(events: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = Result<SseEvent>> + Send + 'static,
{
    stream::unfold(Some(Box::pin(events)), |events| async move {
        let mut events = events?;
        loop {
            match events.next().await {
                Some(Ok(event)) => match decode_chunk(&event.data) {
                    Ok(Chunk::Text(text)) => return Some((Ok(text), Some(events))),
                    Ok(Chunk::Empty) => continue,
                    Ok(Chunk::Done) => return None,
                    Err(e) => return Some((Err(e), None)),
                },
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    return Some((
                        Err(Error::streaming(
                            "upstream stream closed before [DONE]",
                            None,
                        )),
                        None,
                    ));
                }
            }
        }
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk {
    Text(String),
    Empty,
    Done,
}

fn decode_chunk(data: &str) -> Result<Chunk> {
    if data == DONE_MARKER {
        return Ok(Chunk::Done);
    }
    let value: serde_json::Value = serde_json::from_str(data)?;
    if value.get("error").is_some() {
        let body: UpstreamErrorBody = serde_json::from_value(value)?;
        return Err(Error::api(
            500,
            body.error.error_type,
            body.error
                .message
                .unwrap_or_else(|| "upstream reported an error".to_string()),
        ));
    }
    let chunk: ChatCompletionChunk = serde_json::from_value(value)?;
    Ok(match chunk.content() {
        Some(text) => Chunk::Text(text.to_string()),
        None => Chunk::Empty,
    })
}
