use uuid::Uuid;

/// Where an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceSource {
    /// Push-to-talk or remote `listen` capture.
    Speech,
    /// A line typed on stdin or sent as a `query` command.
    Typed,
    /// Captured right after the wake token was heard.
    Wake,
}

impl std::fmt::Display for UtteranceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Speech => write!(f, "speech"),
            Self::Typed => write!(f, "typed"),
            Self::Wake => write!(f, "wake"),
        }
    }
}

/// One unit of user input, normalized once at creation and never mutated.
#[derive(Debug, Clone)]
pub struct Utterance {
    id: Uuid,
    text: String,
    source: UtteranceSource,
}

impl Utterance {
    pub fn new(raw: &str, source: UtteranceSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: raw.trim().to_lowercase(),
            source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> UtteranceSource {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
