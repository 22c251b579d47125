//! REPL command parsing
//!
//! A line starting with `/` is a command; anything else is a prompt.

use std::path::PathBuf;

use prism_conductor::{Mode, ParseModeError};

/// Help text printed by `/help`
pub const HELP: &str = "\
Commands:
  /mode <name>   switch mode (chat, image, document, audio, invoice)
  /modes         list modes
  /file <path>   stage a file for the next submission
  /clear-file    drop the staged file
  /history       print the conversation
  /help          show this help
  /quit          exit
Anything else is sent as a prompt in the current mode.";

/// One parsed input line
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Blank line
    Empty,
    /// Send a prompt in the current mode
    Submit(String),
    /// Switch mode
    Mode(Mode),
    /// List modes
    Modes,
    /// Stage an attachment
    File(PathBuf),
    /// Drop the staged attachment
    ClearFile,
    /// Print the conversation
    History,
    /// Print help
    Help,
    /// Exit
    Quit,
    /// Input that could not be understood
    Invalid(String),
}

impl Command {
    /// Parse one input line
    ///
    /// Prompts are passed on exactly as typed.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::Submit(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match (name, arg) {
            ("mode", "") => Self::Invalid("usage: /mode <name>".to_string()),
            ("mode", arg) => match arg.parse() {
                Ok(mode) => Self::Mode(mode),
                Err(ParseModeError(_)) => Self::Invalid(format!("unknown mode '{arg}'")),
            },
            ("modes", _) => Self::Modes,
            ("file", "") => Self::Invalid("usage: /file <path>".to_string()),
            ("file", arg) => Self::File(PathBuf::from(arg)),
            ("clear-file", _) => Self::ClearFile,
            ("history", _) => Self::History,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit" | "q", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("unknown command '/{other}', try /help")),
        }
    }
}
