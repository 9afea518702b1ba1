//! OpenAI TTS adapter.
//!
//! POST `https://api.openai.com/v1/audio/speech`
//! Body: `{"model": "tts-1", "input": "text", "voice": "alloy", "response_format": "pcm"}`
//! Returns raw 24 kHz 16-bit mono PCM, played through [`AudioPlayer`].

use std::sync::Mutex;

use tokio::runtime::Handle;
use tracing::info;

use super::playback::AudioPlayer;
use super::{TtsEngine, TtsError};
use crate::speech::interrupt::SpeechTicket;

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const PCM_SAMPLE_RATE: u32 = 24_000;
const VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

pub struct OpenAiTts {
    api_key: String,
    voice: Mutex<String>,
    model: String,
    client: reqwest::Client,
    runtime: Handle,
    player: AudioPlayer,
}

impl OpenAiTts {
    pub fn new(api_key: &str, voice: &str, runtime: Handle) -> Self {
        Self {
            api_key: api_key.to_string(),
            voice: Mutex::new(voice.to_string()),
            model: "tts-1".to_string(),
            client: reqwest::Client::new(),
            runtime,
            player: AudioPlayer::new(1.0),
        }
    }

    fn current_voice(&self) -> String {
        self.voice.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<f32>, TtsError> {
        let voice = self.current_voice();
        info!(voice = %voice, text_len = text.len(), "OpenAI TTS request");

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            "response_format": "pcm",
        });

        let resp = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TtsError::NetworkError(format!("OpenAI TTS request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::NetworkError(format!(
                "OpenAI TTS API error {}: {}",
                status, body
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| {
                TtsError::NetworkError(format!("Failed to read OpenAI TTS response: {}", e))
            })?;

        Ok(pcm16_to_f32(&bytes))
    }
}

/// Convert little-endian i16 PCM to f32 samples.
fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

impl TtsEngine for OpenAiTts {
    fn speak(&self, text: &str, ticket: &SpeechTicket) -> Result<(), TtsError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let samples = self.runtime.block_on(self.synthesize(text))?;
        if ticket.is_cancelled() {
            return Err(TtsError::Cancelled);
        }
        self.player.play(samples, PCM_SAMPLE_RATE, ticket)
    }

    fn stop(&self) {
        self.player.stop();
    }

    fn name(&self) -> String {
        format!("OpenAI TTS ({})", self.current_voice())
    }

    fn voices(&self) -> Vec<String> {
        VOICES.iter().map(|v| v.to_string()).collect()
    }

    fn set_voice(&self, voice: &str) -> Result<(), TtsError> {
        let voice = voice.trim().to_lowercase();
        if !VOICES.contains(&voice.as_str()) {
            return Err(TtsError::SynthesisError(format!("unknown voice {}", voice)));
        }
        *self.voice.lock().unwrap_or_else(|e| e.into_inner()) = voice;
        Ok(())
    }
}
