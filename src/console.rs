use crate::error::{AppError, Result};
use crate::model::RELAY_COUNT;

/// Operator commands read from stdin by the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    SetRelay { index: usize, state: bool },
    ToggleRelay { index: usize },
    Status,
    Trend,
    Quit,
}

/// Parse one input line. Relays are numbered 1-4 as labelled on the panel.
/// Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "relay" | "r" => {
            let number = parts
                .next()
                .ok_or_else(|| usage("relay number missing"))?;
            let number: usize = number
                .parse()
                .map_err(|_| usage(&format!("invalid relay number: {}", number)))?;
            if number == 0 || number > RELAY_COUNT {
                return Err(usage(&format!(
                    "relay number must be 1-{}, got {}",
                    RELAY_COUNT, number
                )));
            }
            let index = number - 1;

            match parts.next().map(|s| s.to_ascii_lowercase()).as_deref() {
                Some("on") => ConsoleCommand::SetRelay { index, state: true },
                Some("off") => ConsoleCommand::SetRelay { index, state: false },
                Some("toggle") | None => ConsoleCommand::ToggleRelay { index },
                Some(other) => return Err(usage(&format!("unknown relay action: {}", other))),
            }
        }
        "status" | "s" => ConsoleCommand::Status,
        "trend" | "t" => ConsoleCommand::Trend,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(usage(&format!("unknown command: {}", other))),
    };

    Ok(Some(command))
}

fn usage(reason: &str) -> AppError {
    AppError::InvalidCommand(format!(
        "{} (usage: relay <1-{}> [on|off|toggle], status, trend, quit)",
        reason, RELAY_COUNT
    ))
}
