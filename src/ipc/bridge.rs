//! IPC bridge: stdin reader and stdout event emitter.
//!
//! A blocking stdin reader thread forwards JSON commands through an mpsc
//! channel and hands plain lines to a typed-input callback, plus a helper to
//! emit JSON-line events to stdout.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{JarvisCommand, JarvisEvent};

/// Emit a `JarvisEvent` as a JSON line on stdout and flush.
pub fn emit_event(event: &JarvisEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Ignore write/flush errors: the pipe may be closed.
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

/// Convenience helper for emitting error events.
pub fn emit_error(message: &str) {
    emit_event(&JarvisEvent::Error {
        message: message.to_string(),
    });
}

/// Normalize incoming JSON: if it has a `"type"` field but no `"command"`
/// field, rename `"type"` to `"command"` so serde can deserialize it.
fn normalize_command_json(input: &str) -> String {
    if let Ok(mut obj) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(input)
    {
        if !obj.contains_key("command") {
            if let Some(type_val) = obj.remove("type") {
                obj.insert("command".to_string(), type_val);
                if let Ok(json) = serde_json::to_string(&obj) {
                    return json;
                }
            }
        }
    }
    input.to_string()
}

/// What one stdin line means.
#[derive(Debug, PartialEq, Eq)]
enum StdinLine {
    Blank,
    Command(JarvisCommand),
    Invalid(String),
    Typed(String),
    /// `exit` or `quit`: no more typed input is accepted.
    EndTyped,
}

fn classify_line(line: &str) -> StdinLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StdinLine::Blank;
    }
    if trimmed.starts_with('{') {
        let normalized = normalize_command_json(trimmed);
        return match serde_json::from_str::<JarvisCommand>(&normalized) {
            Ok(cmd) => StdinLine::Command(cmd),
            Err(e) => StdinLine::Invalid(e.to_string()),
        };
    }
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" => StdinLine::EndTyped,
        _ => StdinLine::Typed(trimmed.to_string()),
    }
}

/// Spawn a blocking thread that reads stdin line by line. JSON objects are
/// deserialized into `JarvisCommand` and forwarded through the returned
/// channel; other lines are passed to `on_typed` on the reader thread.
///
/// The thread exits when stdin is closed or on an unrecoverable read error.
/// Closing stdin does not end the assistant.
pub fn spawn_stdin_reader(
    on_typed: impl Fn(String) + Send + 'static,
) -> mpsc::UnboundedReceiver<JarvisCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = io::stdin();
            let mut typed_open = true;
            for line in stdin.lock().lines() {
                let text = match line {
                    Ok(text) => text,
                    Err(e) => {
                        error!("stdin read error: {}", e);
                        break;
                    }
                };
                match classify_line(&text) {
                    StdinLine::Blank => {}
                    StdinLine::Command(cmd) => {
                        debug!(?cmd, "Received command");
                        if tx.send(cmd).is_err() {
                            break; // Receiver dropped: main task is gone.
                        }
                    }
                    StdinLine::Invalid(e) => {
                        error!("Invalid JSON command: {} (input: {})", e, text.trim());
                        emit_error(&format!("Invalid JSON command: {}", e));
                    }
                    StdinLine::EndTyped => {
                        if typed_open {
                            info!("Typed input closed");
                        }
                        typed_open = false;
                    }
                    StdinLine::Typed(line) if typed_open => on_typed(line),
                    StdinLine::Typed(_) => debug!("Typed input is closed, line ignored"),
                }
            }
            debug!("stdin reader thread exiting");
        });
    if let Err(e) = spawned {
        error!("Failed to spawn stdin reader: {}", e);
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("   "), StdinLine::Blank);
        assert_eq!(
            classify_line(" open youtube "),
            StdinLine::Typed("open youtube".into())
        );
        assert_eq!(classify_line("Quit"), StdinLine::EndTyped);
        assert_eq!(
            classify_line(r#"{"command":"query","text":"what is the time"}"#),
            StdinLine::Command(JarvisCommand::Query {
                text: "what is the time".into()
            })
        );
        assert!(matches!(
            classify_line(r#"{"command":"fly"}"#),
            StdinLine::Invalid(_)
        ));
    }

    #[test]
    fn test_type_field_normalized() {
        assert_eq!(
            classify_line(r#"{"type":"ping"}"#),
            StdinLine::Command(JarvisCommand::Ping {})
        );
        assert_eq!(normalize_command_json("not json"), "not json");
    }
}
