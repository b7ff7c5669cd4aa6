//! Interactive chat client for the relay.
//!
//! This module provides a streaming REPL built on the client-side stream
//! consumer. It supports:
//!
//! - Progressive rendering of the assistant's turn as fragments arrive
//! - Abandoning a response mid-stream
//! - Slash commands for switching modes and inspecting the conversation
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: conversation state and relay interaction
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, modes_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_RELAY_URL};
pub use session::ChatSession;
