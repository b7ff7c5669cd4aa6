//! Interactive chat client for a running moderelay-server.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local relay in the default mode
//! moderelay-chat
//!
//! # Start in research mode against another relay
//! moderelay-chat --relay-url http://10.0.0.5:5000/ --mode research
//!
//! # Disable colors (useful for piping output)
//! moderelay-chat --no-color
//! ```
//!
//! # Commands
//!
//! - `/mode <id>` - Switch mode and start over
//! - `/modes` - List modes
//! - `/clear` - Start over in the current mode
//! - `/history` - Show the conversation
//! - `/help` - Show available commands
//! - `/quit` - Exit the application
//!
//! Ctrl+C while a response is streaming abandons it.

use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use moderelay::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    modes_text, parse_command,
};

/// Main entry point for the moderelay-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let (args, free) = ChatArgs::from_command_line_relaxed("moderelay-chat [OPTIONS]");
    if !free.is_empty() {
        eprintln!("unexpected arguments: {}", free.join(" "));
        std::process::exit(2);
    }
    let config = ChatConfig::try_from(args)?;
    let use_color = config.use_color;

    let mut session = ChatSession::new(config)?;
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Token for the response currently streaming; replaced every turn.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let handler_current = Arc::clone(&current);
    ctrlc::set_handler(move || {
        if let Ok(token) = handler_current.lock() {
            token.cancel();
        }
    })?;

    println!("Mode Relay Chat (relay: {})", session.relay_url());
    println!("Type /help for commands, /quit to exit\n");
    renderer.print_message(session.mode(), &session.welcome());

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                            renderer.print_message(session.mode(), &session.welcome());
                        }
                        ChatCommand::Mode(mode) => {
                            session.set_mode(mode);
                            renderer.print_info(&format!(
                                "Switched to {}.",
                                mode.descriptor().name
                            ));
                            renderer.print_message(session.mode(), &session.welcome());
                        }
                        ChatCommand::Modes => {
                            for line in modes_text(session.mode()).lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::History => {
                            let mode = session.mode();
                            for message in session.messages() {
                                renderer.print_message(mode, message);
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                let cancel = CancellationToken::new();
                match current.lock() {
                    Ok(mut slot) => *slot = cancel.clone(),
                    Err(_) => {
                        renderer.print_error("interrupt handler is unavailable");
                        break;
                    }
                }
                if let Err(e) = session.send_streaming(line, &mut renderer, cancel).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}
