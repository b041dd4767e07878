//! Operator commands read from stdin.
//!
//! Stand-ins for the physical button and the status LED of a real device,
//! plus knobs for the simulated radio.

use std::str::FromStr;

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Grant the bootstrap confirmation (button press)
    Confirm,
    /// Factory reset (long button press)
    Reset,
    /// Print the engine state
    Status,
    /// Report this text with the next failure
    Error(String),
    /// Make a network visible
    Add { ssid: String, passphrase: String },
    /// Make a network disappear
    Remove { ssid: String },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  confirm               grant bootstrap confirmation
  reset                 factory reset
  status                show engine state
  error <text>          set the message reported with the next failure
  add <ssid> [pass]     make a network visible
  remove <ssid>         make a network disappear
  help                  this text
  quit                  stop the device";

/// Unparseable console input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("empty input")]
    Empty,
}

impl FromStr for ConsoleCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((line, ""));

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseCommandError::Empty),
            "confirm" | "c" => Ok(ConsoleCommand::Confirm),
            "reset" => Ok(ConsoleCommand::Reset),
            "status" | "s" => Ok(ConsoleCommand::Status),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            "error" if rest.is_empty() => Err(ParseCommandError::MissingArgument("error")),
            "error" => Ok(ConsoleCommand::Error(rest.to_string())),
            "add" => {
                let mut parts = rest.split_whitespace();
                let ssid = parts
                    .next()
                    .ok_or(ParseCommandError::MissingArgument("add"))?;
                Ok(ConsoleCommand::Add {
                    ssid: ssid.to_string(),
                    passphrase: parts.next().unwrap_or_default().to_string(),
                })
            }
            "remove" if rest.is_empty() => Err(ParseCommandError::MissingArgument("remove")),
            "remove" => Ok(ConsoleCommand::Remove {
                ssid: rest.to_string(),
            }),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}
