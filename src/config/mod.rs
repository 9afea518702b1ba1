//! Configuration reading and data directory paths.

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use paths::get_data_dir;

/// Name the assistant answers to until the user renames it.
pub const DEFAULT_ASSISTANT_NAME: &str = "Jarvis";

/// Top-level jarvis_config.json shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JarvisConfig {
    /// Initial name when no renamed one has been persisted.
    pub assistant_name: Option<String>,
    /// Word that arms the wake listener (matched case-insensitively).
    pub wake_token: String,
    pub wake_word_enabled: bool,
    pub prefer_online_playback: bool,
    /// Route speech through the reliable system voice instead of the queue.
    pub use_system_voice: bool,
    /// Startup directory for file and project commands (defaults to cwd).
    pub working_directory: Option<PathBuf>,
    /// Queued speech backend: "system", "openai-tts" or "silent".
    pub tts_adapter: String,
    pub tts_voice: Option<String>,
    pub tts_api_key: Option<String>,
    /// Push-to-talk key (e.g. "F9", "MouseButton5").
    pub listen_key: Option<String>,
    /// Barge-in key that silences all speech.
    pub stop_key: Option<String>,
    pub input_device: Option<String>,
    /// Mean absolute amplitude above which a frame counts as speech.
    pub vad_threshold: f32,
    /// Stream search tool used for online playback.
    pub resolver_command: String,
    /// External audio player used for online playback.
    pub player_command: String,
    pub player_args: Vec<String>,
    /// Register the assistant to start at login every time it launches.
    pub autostart_on_launch: bool,
    pub stt: SttSettings,
    pub llm: LlmSettings,
}

impl Default for JarvisConfig {
    fn default() -> Self {
        Self {
            assistant_name: None,
            wake_token: "jarvis".to_string(),
            wake_word_enabled: true,
            prefer_online_playback: false,
            use_system_voice: true,
            working_directory: None,
            tts_adapter: "system".to_string(),
            tts_voice: None,
            tts_api_key: None,
            listen_key: Some("F9".to_string()),
            stop_key: Some("F10".to_string()),
            input_device: None,
            vad_threshold: 0.01,
            resolver_command: "yt-dlp".to_string(),
            player_command: "mpv".to_string(),
            player_args: vec![
                "--no-video".to_string(),
                "--really-quiet".to_string(),
                "--volume=85".to_string(),
            ],
            autostart_on_launch: false,
            stt: SttSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

/// Speech-to-text adapter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SttSettings {
    /// "openai-cloud" or "custom-cloud".
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Language-model fallback settings. Environment variables take precedence,
/// see [`crate::llm::resolve_provider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl JarvisConfig {
    /// Fill the STT key from `OPENAI_API_KEY` when the file leaves it empty.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.stt.api_key.is_none() {
            self.stt.api_key = env("OPENAI_API_KEY");
        }
        if self.stt.adapter.is_none() && self.stt.api_key.is_some() {
            self.stt.adapter = Some("openai-cloud".to_string());
        }
        if self.tts_adapter == "openai-tts" && self.tts_api_key.is_none() {
            self.tts_api_key = env("OPENAI_API_KEY");
        }
    }
}

/// Read jarvis_config.json from the data directory, applying environment
/// overrides.
pub fn read_config() -> JarvisConfig {
    let path = get_config_path();
    let mut config: JarvisConfig = read_json_file(&path).unwrap_or_default();
    config.apply_env_overrides(env_var);
    config
}

/// Path to jarvis_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("jarvis_config.json")
}

/// Path to the persisted assistant name.
pub fn get_name_path() -> PathBuf {
    get_data_dir().join("assistant_name.txt")
}

/// Non-empty environment variable lookup.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Assistant name
// ---------------------------------------------------------------------------

/// The assistant's display name, persisted as a one-line text file.
pub struct NameStore {
    path: PathBuf,
    current: Mutex<String>,
}

impl NameStore {
    pub fn load(path: PathBuf) -> Self {
        Self::load_or(path, DEFAULT_ASSISTANT_NAME)
    }

    /// Like [`NameStore::load`], starting from `fallback` when nothing has
    /// been saved yet.
    pub fn load_or(path: PathBuf, fallback: &str) -> Self {
        let current = std::fs::read_to_string(&path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    pub fn get(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Persist a new name. The in-memory name only changes if the write
    /// succeeds.
    pub fn set(&self, name: &str) -> anyhow::Result<()> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("assistant name cannot be empty");
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, name)?;
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = name.to_string();
        info!(name, "Assistant renamed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: JarvisConfig =
            serde_json::from_str(r#"{"wakeWordEnabled": false, "llm": {"provider": "openai"}}"#)
                .unwrap();
        assert!(!cfg.wake_word_enabled);
        assert_eq!(cfg.wake_token, "jarvis");
        assert_eq!(cfg.tts_adapter, "system");
        assert!(cfg.use_system_voice);
        assert_eq!(cfg.llm.provider.as_deref(), Some("openai"));
        assert_eq!(cfg.listen_key.as_deref(), Some("F9"));
    }

    #[test]
    fn test_env_override_fills_stt_key() {
        let mut cfg = JarvisConfig::default();
        cfg.apply_env_overrides(|k| (k == "OPENAI_API_KEY").then(|| "sk-test".to_string()));
        assert_eq!(cfg.stt.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.stt.adapter.as_deref(), Some("openai-cloud"));
    }

    #[test]
    fn test_env_override_keeps_file_values() {
        let mut cfg = JarvisConfig::default();
        cfg.stt.api_key = Some("from-file".into());
        cfg.stt.adapter = Some("custom-cloud".into());
        cfg.apply_env_overrides(|_| Some("from-env".to_string()));
        assert_eq!(cfg.stt.api_key.as_deref(), Some("from-file"));
        assert_eq!(cfg.stt.adapter.as_deref(), Some("custom-cloud"));
    }

    #[test]
    fn test_read_json_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: Option<JarvisConfig> = read_json_file(&dir.path().join("nope.json"));
        assert!(cfg.is_none());
    }

    #[test]
    fn test_name_store_defaults_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant_name.txt");

        let store = NameStore::load(path.clone());
        assert_eq!(store.get(), DEFAULT_ASSISTANT_NAME);

        store.set("  friday ").unwrap();
        assert_eq!(store.get(), "friday");
        assert_eq!(NameStore::load(path).get(), "friday");
    }

    #[test]
    fn test_name_store_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = NameStore::load(dir.path().join("n.txt"));
        assert!(store.set("   ").is_err());
        assert_eq!(store.get(), DEFAULT_ASSISTANT_NAME);
    }

    #[test]
    fn test_name_store_configured_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant_name.txt");
        assert_eq!(NameStore::load_or(path.clone(), "Edith").get(), "Edith");
        std::fs::write(&path, "Friday\n").unwrap();
        assert_eq!(NameStore::load_or(path, "Edith").get(), "Friday");
    }
}
