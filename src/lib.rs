// Public modules
pub mod chat;
pub mod client;
pub mod consumer;
pub mod error;
pub mod provider;
pub mod relay;
pub mod render;
pub mod server;
pub mod sse;
pub mod types;

mod observability;

// Re-exports
pub use client::OpenAi;
pub use consumer::{AssistantTurn, Conversation, TurnEvent, TurnOutcome, TurnState, read_turn};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use provider::{CompletionProvider, FragmentStream};
pub use relay::{Relay, RelaySettings, RelayState, RelayStream};
pub use types::*;
