//! IPC protocol types for the JSON-line channel on stdin/stdout.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (core -> UI).
//! Commands use `{"command": "<name>", ...}` format (UI -> core).

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::transcript::{Role, TranscriptEntry};

// ---------------------------------------------------------------------------
// Events: core -> UI (stdout)
// ---------------------------------------------------------------------------

/// All events emitted via stdout as JSON lines.
///
/// Serialized as `{"event": "<variant>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum JarvisEvent {
    Starting {},
    Ready {
        name: String,
    },
    Transcript {
        role: Role,
        text: String,
        /// RFC 3339 local time.
        at: String,
    },
    ListeningStart {
        source: String,
    },
    ListeningStop {},
    WakeWord {},
    Error {
        message: String,
    },
    Pong {},
    Stopping {},
}

impl From<&TranscriptEntry> for JarvisEvent {
    fn from(entry: &TranscriptEntry) -> Self {
        Self::Transcript {
            role: entry.role,
            text: entry.text.clone(),
            at: entry.at.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands: UI -> core (stdin)
// ---------------------------------------------------------------------------

/// All commands received via stdin as JSON lines.
///
/// Deserialized from `{"command": "<variant>", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum JarvisCommand {
    /// Dispatch text as if it had been typed.
    Query { text: String },
    /// Start one microphone cycle.
    Listen {},
    StopSpeaking {},
    SetWakeWord { enabled: bool },
    Ping {},
    Stop {},
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn test_event_shape() {
        let json = serde_json::to_value(JarvisEvent::ListeningStart {
            source: "hotkey".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "listening_start", "data": {"source": "hotkey"}})
        );
        let json = serde_json::to_string(&JarvisEvent::Pong {}).unwrap();
        assert_eq!(json, r#"{"event":"pong","data":{}}"#);
    }

    #[test]
    fn test_transcript_event_from_entry() {
        let entry = TranscriptEntry {
            role: Role::Assistant,
            text: "Opening YouTube".into(),
            at: Local::now(),
        };
        let json = serde_json::to_value(JarvisEvent::from(&entry)).unwrap();
        assert_eq!(json["event"], "transcript");
        assert_eq!(json["data"]["role"], "assistant");
        assert_eq!(json["data"]["text"], "Opening YouTube");
    }

    #[test]
    fn test_command_parsing() {
        let cmd: JarvisCommand =
            serde_json::from_str(r#"{"command": "set_wake_word", "enabled": false}"#).unwrap();
        assert_eq!(cmd, JarvisCommand::SetWakeWord { enabled: false });
        let cmd: JarvisCommand = serde_json::from_str(r#"{"command": "listen"}"#).unwrap();
        assert_eq!(cmd, JarvisCommand::Listen {});
        assert!(serde_json::from_str::<JarvisCommand>(r#"{"command": "query"}"#).is_err());
    }
}
