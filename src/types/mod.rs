// Public modules
pub mod chat_message;
pub mod chat_request;
pub mod completion;
pub mod error_body;
pub mod mode;
pub mod relay_event;

// Re-exports
pub use chat_message::{ChatMessage, Role};
pub use chat_request::{BODY_PARAM, ChatRequest};
pub use completion::{
    ChatCompletionChunk, ChatCompletionCreateParams, ChunkChoice, ChunkDelta, CompletionMessage,
    CompletionRole, UpstreamErrorBody, UpstreamErrorDetail,
};
pub use error_body::ErrorBody;
pub use mode::{Mode, ModeDescriptor, ModeSummary, today};
pub use relay_event::{DONE_MARKER, FragmentPayload, RelayEvent};
