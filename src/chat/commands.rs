//! Slash command parsing for the chat application.
//!
//! Commands start with `/` and control the session locally; they are never
//! sent to the relay.

use crate::types::Mode;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Switch to another mode, starting a fresh conversation.
    Mode(Mode),

    /// List the available modes.
    Modes,

    /// Clear the conversation and show the start-of-chat message again.
    Clear,

    /// Print every turn of the conversation so far.
    History,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.
///
/// # Examples
///
/// ```
/// # use moderelay::chat::{ChatCommand, parse_command};
/// # use moderelay::Mode;
/// assert_eq!(parse_command("/mode research"), Some(ChatCommand::Mode(Mode::Research)));
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "mode" => match argument {
            Some(id) => match id.to_lowercase().parse::<Mode>() {
                Ok(mode) => ChatCommand::Mode(mode),
                Err(err) => ChatCommand::Invalid(format!("{err}; try /modes")),
            },
            None => ChatCommand::Invalid("/mode requires a mode name".to_string()),
        },
        "modes" => ChatCommand::Modes,
        "clear" | "new" => ChatCommand::Clear,
        "history" => ChatCommand::History,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        other => ChatCommand::Invalid(format!("Unknown command: /{other}")),
    };
    Some(result)
}

/// Returns the help text for available commands.
pub fn help_text() -> &'static str {
    r#"Commands:
  /mode <id>     Switch mode and start a new conversation
  /modes         List available modes
  /clear         Start over in the current mode
  /history       Show the conversation so far
  /help          Show this help message
  /quit          Exit the chat

Press Ctrl+C while a response is streaming to stop it."#
}

/// One line per mode, marking the active one.
pub fn modes_text(active: Mode) -> String {
    Mode::ALL
        .iter()
        .map(|mode| {
            let descriptor = mode.descriptor();
            let marker = if *mode == active { '*' } else { ' ' };
            format!(
                "{marker} {:<10} {} {} - {}",
                descriptor.id(),
                descriptor.icon,
                descriptor.name,
                descriptor.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_mode() {
        assert_eq!(
            parse_command("/mode blackflag"),
            Some(ChatCommand::Mode(Mode::BlackFlag))
        );
        assert_eq!(
            parse_command("/MODE  Direct "),
            Some(ChatCommand::Mode(Mode::Direct))
        );
        assert!(matches!(
            parse_command("/mode"),
            Some(ChatCommand::Invalid(_))
        ));
        match parse_command("/mode nonexistent") {
            Some(ChatCommand::Invalid(message)) => assert!(message.contains("nonexistent")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("/modes"), Some(ChatCommand::Modes));
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert!(parse_command("Hello").is_none());
        assert!(parse_command("what about /mode?").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn modes_listing_marks_active() {
        let text = modes_text(Mode::Research);
        assert_eq!(text.lines().count(), Mode::ALL.len());
        let active: Vec<&str> = text.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(active.len(), 1);
        assert!(active[0].contains("research"));
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/mode"));
        assert!(help.contains("/quit"));
    }
}
