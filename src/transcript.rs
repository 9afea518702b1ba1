//! In-memory conversation transcript.
//!
//! Entries are kept for the lifetime of the process only. An optional sink
//! mirrors each entry as it is recorded (used to forward `transcript` events
//! to the UI process).

use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    You,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::You => write!(f, "You"),
            Self::Assistant => write!(f, "Assistant"),
            Self::System => write!(f, "System"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Local>,
}

type Sink = Box<dyn Fn(&TranscriptEntry) + Send + Sync>;

#[derive(Default)]
pub struct Transcript {
    entries: Mutex<Vec<TranscriptEntry>>,
    sink: Option<Sink>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: impl Fn(&TranscriptEntry) + Send + Sync + 'static) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sink: Some(Box::new(sink)),
        }
    }

    pub fn record(&self, role: Role, text: &str) {
        let entry = TranscriptEntry {
            role,
            text: text.to_string(),
            at: Local::now(),
        };
        info!(role = %role, "{}", text);
        if let Some(sink) = &self.sink {
            sink(&entry);
        }
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    pub fn user(&self, text: &str) {
        self.record(Role::You, text);
    }

    pub fn assistant(&self, text: &str) {
        self.record(Role::Assistant, text);
    }

    pub fn system(&self, text: &str) {
        self.record(Role::System, text);
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Text of the most recent assistant entry.
    pub fn last_assistant(&self) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|e| e.role == Role::Assistant)
            .map(|e| e.text.clone())
    }

    /// All assistant lines, oldest first.
    pub fn assistant_lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.role == Role::Assistant)
            .map(|e| e.text)
            .collect()
    }
}
