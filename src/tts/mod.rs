//! Text-to-Speech backends.
//!
//! Provides a common `TtsEngine` trait with implementations for:
//! - The platform's built-in voice (espeak-ng / `say` / System.Speech)
//! - OpenAI TTS API, played through rodio
//! - A silent engine that only logs (headless machines, CI)

pub mod cloud;
pub mod playback;
pub mod system;

use tokio::runtime::Handle;
use tracing::info;

use crate::speech::interrupt::SpeechTicket;

/// Common trait for all TTS engines (dyn-compatible).
///
/// `speak` blocks the calling thread until the text has been spoken, the
/// ticket is cancelled, or `stop` is called from another thread.
pub trait TtsEngine: Send + Sync {
    fn speak(&self, text: &str, ticket: &SpeechTicket) -> Result<(), TtsError>;

    /// Interrupt any in-progress utterance.
    fn stop(&self);

    /// Display name for this engine (e.g. "System voice (espeak-ng)").
    fn name(&self) -> String;

    /// Installed voice names. Spoken voice numbers index into this list.
    fn voices(&self) -> Vec<String> {
        Vec::new()
    }

    fn set_voice(&self, _voice: &str) -> Result<(), TtsError> {
        Err(TtsError::NotReady)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtsError {
    /// TTS synthesis failed.
    SynthesisError(String),
    /// Network error (for cloud TTS).
    NetworkError(String),
    /// Engine not initialized or backend missing.
    NotReady,
    /// Synthesis was cancelled.
    Cancelled,
    /// Audio playback error.
    PlaybackError(String),
}

impl std::fmt::Display for TtsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SynthesisError(msg) => write!(f, "TTS synthesis error: {}", msg),
            Self::NetworkError(msg) => write!(f, "TTS network error: {}", msg),
            Self::NotReady => write!(f, "TTS engine not ready"),
            Self::Cancelled => write!(f, "TTS synthesis cancelled"),
            Self::PlaybackError(msg) => write!(f, "TTS playback error: {}", msg),
        }
    }
}

impl std::error::Error for TtsError {}

/// Engine that logs instead of speaking.
pub struct SilentTts;

impl TtsEngine for SilentTts {
    fn speak(&self, text: &str, _ticket: &SpeechTicket) -> Result<(), TtsError> {
        info!(text, "(silent) speak");
        Ok(())
    }

    fn stop(&self) {}

    fn name(&self) -> String {
        "Silent".to_string()
    }
}

/// Create a TTS engine from config values.
///
/// `adapter` is one of: "system", "openai-tts", "silent".
pub fn create_tts_engine(
    adapter: &str,
    voice: Option<&str>,
    api_key: Option<&str>,
    runtime: &Handle,
) -> anyhow::Result<Box<dyn TtsEngine>> {
    match adapter {
        "system" => {
            let engine = system::SystemVoice::detect()?;
            if let Some(v) = voice {
                engine.set_voice(v)?;
            }
            Ok(Box::new(engine))
        }
        "openai-tts" => {
            let key = api_key.ok_or_else(|| anyhow::anyhow!("OpenAI TTS requires an API key"))?;
            let v = voice.unwrap_or("alloy");
            Ok(Box::new(cloud::OpenAiTts::new(key, v, runtime.clone())))
        }
        "silent" => Ok(Box::new(SilentTts)),
        other => anyhow::bail!("Unknown TTS adapter: {}", other),
    }
}
