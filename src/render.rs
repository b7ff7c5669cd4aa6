//! Output rendering for the chat client.
//!
//! A [`Renderer`] receives the assistant's turn fragment by fragment, so the
//! text appears progressively as the relay streams it.

use std::io::{self, Stdout, Write};

use crate::types::{ChatMessage, Mode, Role};

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for informational messages).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for interrupted turns).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering streaming output.
///
/// Implementations decide how text is styled; the session only reports what
/// happened.
pub trait Renderer: Send {
    /// Called before the first fragment of an assistant turn.
    fn start_response(&mut self, mode: Mode);

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as fragments arrive from the relay.
    fn print_text(&mut self, text: &str);

    /// Called when a response completed normally.
    fn finish_response(&mut self);

    /// Called when the relay closed the stream before the terminal marker.
    fn print_truncated(&mut self);

    /// Called when the user abandoned the stream.
    fn print_interrupted(&mut self);

    /// Print one stored turn, e.g. the start-of-chat message or history.
    fn print_message(&mut self, mode: Mode, message: &ChatMessage);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
        }
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn styled(&mut self, style: &str, text: &str) {
        if self.use_color {
            self.write(&format!("{style}{text}{ANSI_RESET}"));
            self.line_start = text.ends_with('\n');
        } else {
            self.write(text);
        }
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn label(&mut self, mode: Mode, role: Role) {
        match role {
            Role::User => self.styled(ANSI_BOLD, "You: "),
            Role::Assistant => {
                let descriptor = mode.descriptor();
                let label = format!("{} {}: ", descriptor.icon, descriptor.name);
                let style = format!("{ANSI_BOLD}{ANSI_CYAN}");
                self.styled(&style, &label);
            }
        }
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_response(&mut self, mode: Mode) {
        self.end_line();
        self.label(mode, Role::Assistant);
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_response(&mut self) {
        self.end_line();
        self.write("\n");
    }

    fn print_truncated(&mut self) {
        self.end_line();
        self.styled(ANSI_YELLOW, "[response ended early]\n");
        self.write("\n");
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        self.styled(ANSI_YELLOW, "[interrupted]\n");
        self.write("\n");
    }

    fn print_message(&mut self, mode: Mode, message: &ChatMessage) {
        self.end_line();
        self.label(mode, message.role);
        if message.role == Role::Assistant {
            self.write("\n");
        }
        self.write(&message.content);
        self.end_line();
        self.write("\n");
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        self.styled(ANSI_RED, &format!("Error: {error}\n"));
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.styled(ANSI_DIM, &format!("{info}\n"));
    }
}
