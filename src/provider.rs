//! The seam between the relay and the hosted completion API.

use std::pin::Pin;

use futures::Stream;

use crate::Result;
use crate::types::ChatCompletionCreateParams;

/// An ordered stream of incremental text fragments.
///
/// The stream ends with `None` only when the upstream completed normally; a
/// failure part-way through is yielded as an `Err`.  Dropping the stream must
/// release the upstream connection.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A hosted chat-completion API that can stream its output.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open one streaming completion.
    ///
    /// Errors returned here happen before any fragment exists: connection
    /// failures, authentication failures, and rejected requests.
    async fn stream(&self, params: ChatCompletionCreateParams) -> Result<FragmentStream>;
}
