//! Parsing of typed input lines.

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Send a chat message.
    Say(String),
    /// `/name <name>`
    Name(String),
    /// `/reconnect`
    Reconnect,
    /// `/clear`
    Clear,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// A slash command that does not exist.
    Unknown(String),
    /// Blank line.
    Empty,
}

impl Input {
    /// Parse one line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }

        let Some(command) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };
        let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));

        match name {
            "name" => Self::Name(rest.trim().to_string()),
            "reconnect" => Self::Reconnect,
            "clear" => Self::Clear,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Help text for `/help`.
pub const HELP: &str = "\
commands:
  /name <name>   set your display name
  /reconnect     reconnect to the server now
  /clear         clear the local message log
  /quit          leave";
