//! Interactive console: the thin collaborator that a GUI would
//! otherwise be. Parses one command per stdin line and acts on the
//! shared transport and mode switches.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use navlink_core::{Command, Transport};

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Help,
    Ports,
    Open(Option<String>),
    Close,
    Status,
    Automatic(bool),
    Send(String),
    Quit,
    Unknown(String),
    Empty,
}

/// Parses a console line into an [`Action`]. Pure, so it is easy to
/// test; execution lives in [`Console`].
pub fn parse(line: &str) -> Action {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Action::Empty;
    };
    let rest = line[line.find(verb).unwrap_or(0) + verb.len()..].trim();

    match verb {
        "help" | "?" => Action::Help,
        "ports" => Action::Ports,
        "open" => {
            if rest.is_empty() || rest == "none" {
                Action::Open(None)
            } else {
                Action::Open(Some(rest.to_string()))
            }
        }
        "close" => Action::Close,
        "status" => Action::Status,
        "auto" => match rest {
            "on" => Action::Automatic(true),
            "off" => Action::Automatic(false),
            other => Action::Unknown(format!("auto {other}")),
        },
        "send" => Action::Send(rest.to_string()),
        "quit" | "exit" => Action::Quit,
        other => Action::Unknown(other.to_string()),
    }
}

pub struct Console {
    pub transport: Arc<Transport>,
    pub automatic: Arc<AtomicBool>,
}

impl Console {
    /// Blocks on stdin until `quit` or end of input.
    pub fn run(&self) {
        print_help();
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.execute(parse(&line)) {
                break;
            }
        }
    }

    /// Returns false when the console should exit.
    fn execute(&self, action: Action) -> bool {
        match action {
            Action::Help => print_help(),
            Action::Ports => {
                for device in Transport::list_available() {
                    match device {
                        Some(name) => println!("  {name}"),
                        None => println!("  none"),
                    }
                }
            }
            Action::Open(device) => match self.transport.open(device.as_deref()) {
                Ok(()) => match self.transport.current_device() {
                    Some(name) => println!("opened {name}"),
                    None => println!("no device selected"),
                },
                Err(e) => println!("open failed: {e}"),
            },
            Action::Close => {
                self.transport.close();
                println!("closed");
            }
            Action::Status => {
                match self.transport.current_device() {
                    Some(name) => println!("device: {name}"),
                    None => println!("device: none"),
                }
                let mode = if self.automatic.load(Ordering::Relaxed) {
                    "on"
                } else {
                    "off"
                };
                println!("automatic mode: {mode}");
            }
            Action::Automatic(enabled) => {
                self.automatic.store(enabled, Ordering::Relaxed);
                println!("automatic mode {}", if enabled { "on" } else { "off" });
            }
            Action::Send(what) => self.send_command(&what),
            Action::Quit => return false,
            Action::Unknown(what) => println!("unknown command {what:?}, try 'help'"),
            Action::Empty => {}
        }
        true
    }

    /// Resolves `what` as a wire value or a command name, then sends
    /// it. Unknown commands are surfaced here and never reach the
    /// wire.
    fn send_command(&self, what: &str) {
        let command = match what.parse::<i32>() {
            Ok(value) => Command::from_value(value),
            Err(_) => Command::from_name(what),
        };
        match command {
            Ok(command) => {
                if !self.transport.is_open() {
                    println!("no device open, command dropped");
                }
                if let Err(e) = self.transport.send(&command.encode()) {
                    warn!("failed to send {command}: {e}");
                    println!("send failed: {e}");
                } else if self.transport.is_open() {
                    println!("sent {command} ({:?})", command.encode());
                }
            }
            Err(e) => {
                let known: Vec<&str> = Command::ALL.iter().map(|c| c.name()).collect();
                println!("{e}; known commands: {}", known.join(", "));
            }
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  ports            list serial devices");
    println!("  open <device>    open a serial device (or 'open none')");
    println!("  close            close the current device");
    println!("  status           show device and mode");
    println!("  auto on|off      toggle automatic mode");
    println!("  send <cmd>       send a command by name or value");
    println!("  quit             shut down");
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verbs() {
        assert_eq!(parse(""), Action::Empty);
        assert_eq!(parse("  "), Action::Empty);
        assert_eq!(parse("ports"), Action::Ports);
        assert_eq!(parse("close"), Action::Close);
        assert_eq!(parse("quit"), Action::Quit);
        assert_eq!(parse("auto on"), Action::Automatic(true));
        assert_eq!(parse("auto off"), Action::Automatic(false));
        assert!(matches!(parse("auto sideways"), Action::Unknown(_)));
        assert!(matches!(parse("launch"), Action::Unknown(_)));
    }

    #[test]
    fn parses_open_variants() {
        assert_eq!(parse("open /dev/ttyUSB0"), Action::Open(Some("/dev/ttyUSB0".into())));
        assert_eq!(parse("open none"), Action::Open(None));
        assert_eq!(parse("open"), Action::Open(None));
    }

    #[test]
    fn send_keeps_the_full_argument() {
        assert_eq!(parse("send Emergency Stop"), Action::Send("Emergency Stop".into()));
        assert_eq!(parse("send 1"), Action::Send("1".into()));
    }
}
