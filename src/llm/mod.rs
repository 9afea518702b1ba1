//! Language-model fallback for utterances no command rule claims.
//!
//! Providers: OpenRouter (default), OpenAI, Gemini through its
//! OpenAI-compatible endpoint, Anthropic Messages, and a local Ollama server.
//! Selection follows `LLM_PROVIDER`, then the config file; credentials only
//! ever come from the environment or the config file.

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::LlmSettings;

pub const SYSTEM_PROMPT: &str = "You are a helpful desktop assistant.";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 256;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Collaborator seam used by the router.
pub trait LanguageModel: Send + Sync {
    /// `provider:model`, as reported to the user.
    fn label(&self) -> String;
    fn complete(&self, prompt: &str, system: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    OpenAi,
    Gemini,
    Anthropic,
    Ollama,
}

impl Provider {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "openrouter" | "open-router" | "router" => Some(Self::OpenRouter),
            "openai" => Some(Self::OpenAi),
            "gemini" | "google" => Some(Self::Gemini),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "ollama" | "local" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }

    fn key_var(self) -> Option<&'static str> {
        match self {
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GOOGLE_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }

    fn model_var(self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_MODEL",
            Self::OpenAi => "OPENAI_MODEL",
            Self::Gemini => "GEMINI_MODEL",
            Self::Anthropic => "ANTHROPIC_MODEL",
            Self::Ollama => "OLLAMA_MODEL",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => "openai/gpt-4o",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::Ollama => "llama3.1",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

/// Fully resolved connection details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl ProviderConfig {
    pub fn label(&self) -> String {
        format!("{}:{}", self.provider.id(), self.model)
    }
}

/// Pick the provider to use, or `None` when none is usable.
///
/// The preferred provider comes from `LLM_PROVIDER`, then the config file,
/// and defaults to OpenRouter. It is only used if it has a key (Ollama needs
/// none). `auto` takes the first hosted provider with a key.
pub fn resolve_provider(
    settings: &LlmSettings,
    env: impl Fn(&str) -> Option<String>,
) -> Option<ProviderConfig> {
    let preferred = env("LLM_PROVIDER")
        .or_else(|| settings.provider.clone())
        .unwrap_or_else(|| "openrouter".to_string())
        .trim()
        .to_lowercase();

    let configured = settings
        .provider
        .as_deref()
        .and_then(|p| Provider::parse(&p.trim().to_lowercase()));

    let build = |provider: Provider| -> Option<ProviderConfig> {
        let from_file = configured == Some(provider);
        let api_key = match provider.key_var() {
            Some(var) => Some(
                env(var).or_else(|| from_file.then(|| settings.api_key.clone()).flatten())?,
            ),
            None => None,
        };
        let base_url = (provider == Provider::OpenRouter)
            .then(|| env("OPENROUTER_BASE_URL"))
            .flatten()
            .or_else(|| from_file.then(|| settings.base_url.clone()).flatten())
            .unwrap_or_else(|| provider.default_base_url().to_string());
        let model = env(provider.model_var())
            .or_else(|| from_file.then(|| settings.model.clone()).flatten())
            .unwrap_or_else(|| provider.default_model().to_string());
        Some(ProviderConfig {
            provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    };

    if preferred == "auto" || preferred.is_empty() {
        return [
            Provider::OpenRouter,
            Provider::OpenAi,
            Provider::Gemini,
            Provider::Anthropic,
        ]
        .into_iter()
        .find_map(build);
    }
    Provider::parse(&preferred).and_then(build)
}

/// HTTP client for the resolved provider.
pub struct ChatClient {
    config: ProviderConfig,
    client: reqwest::Client,
    runtime: Handle,
}

impl ChatClient {
    pub fn new(config: ProviderConfig, runtime: Handle) -> Self {
        info!(provider = config.provider.id(), model = %config.model, "Language model configured");
        Self {
            config,
            client: reqwest::Client::new(),
            runtime,
        }
    }

    async fn chat_completion(&self, prompt: &str, system: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        if self.config.provider == Provider::OpenRouter {
            if let Some(site) = crate::config::env_var("OPENROUTER_SITE_URL") {
                req = req.header("HTTP-Referer", site);
            }
            if let Some(name) = crate::config::env_var("OPENROUTER_SITE_NAME") {
                req = req.header("X-Title", name);
            }
        }

        let json = send_json(req).await?;
        Ok(parse_chat_completion(&json))
    }

    async fn anthropic_message(&self, prompt: &str, system: &str) -> anyhow::Result<String> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "system": system,
            "messages": [{"role": "user", "content": prompt}],
        });
        let req = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.clone().unwrap_or_default())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let json = send_json(req).await?;
        Ok(parse_anthropic_message(&json))
    }
}

async fn send_json(req: reqwest::RequestBuilder) -> anyhow::Result<serde_json::Value> {
    let resp = req.send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("API error {}: {}", status, body);
    }
    Ok(resp.json().await?)
}

fn parse_chat_completion(json: &serde_json::Value) -> String {
    json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn parse_anthropic_message(json: &serde_json::Value) -> String {
    json["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

impl LanguageModel for ChatClient {
    fn label(&self) -> String {
        self.config.label()
    }

    fn complete(&self, prompt: &str, system: &str) -> anyhow::Result<String> {
        debug!(provider = self.config.provider.id(), "Asking language model");
        match self.config.provider {
            Provider::Anthropic => self.runtime.block_on(self.anthropic_message(prompt, system)),
            _ => self.runtime.block_on(self.chat_completion(prompt, system)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_default_is_openrouter_when_keyed() {
        let env = env_from(&[("OPENROUTER_API_KEY", "or-key")]);
        let cfg = resolve_provider(&LlmSettings::default(), env).unwrap();
        assert_eq!(cfg.provider, Provider::OpenRouter);
        assert_eq!(cfg.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(cfg.label(), "openrouter:openai/gpt-4o");
    }

    #[test]
    fn test_preferred_provider_without_key_is_none() {
        let env = env_from(&[("LLM_PROVIDER", "anthropic"), ("OPENAI_API_KEY", "sk")]);
        assert!(resolve_provider(&LlmSettings::default(), env).is_none());
        assert!(resolve_provider(&LlmSettings::default(), env_from(&[])).is_none());
    }

    #[test]
    fn test_env_overrides_config() {
        let settings = LlmSettings {
            provider: Some("openai".into()),
            api_key: Some("file-key".into()),
            base_url: None,
            model: Some("gpt-4o".into()),
        };
        let cfg = resolve_provider(&settings, env_from(&[])).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("file-key"));
        assert_eq!(cfg.model, "gpt-4o");

        let cfg = resolve_provider(
            &settings,
            env_from(&[("OPENAI_API_KEY", "env-key"), ("OPENAI_MODEL", "gpt-4.1")]),
        )
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("env-key"));
        assert_eq!(cfg.model, "gpt-4.1");

        let cfg = resolve_provider(
            &settings,
            env_from(&[("LLM_PROVIDER", "gemini"), ("GOOGLE_API_KEY", "g")]),
        )
        .unwrap();
        assert_eq!(cfg.provider, Provider::Gemini);
        // File values belong to the file's provider only.
        assert_eq!(cfg.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_auto_picks_first_keyed() {
        let env = env_from(&[("LLM_PROVIDER", "auto"), ("ANTHROPIC_API_KEY", "a")]);
        let cfg = resolve_provider(&LlmSettings::default(), env).unwrap();
        assert_eq!(cfg.provider, Provider::Anthropic);
        assert_eq!(cfg.label(), "anthropic:claude-3-5-sonnet-latest");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let cfg = resolve_provider(&LlmSettings::default(), env_from(&[("LLM_PROVIDER", "ollama")]))
            .unwrap();
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_parse_responses() {
        let chat = serde_json::json!({"choices": [{"message": {"content": "  Paris. "}}]});
        assert_eq!(parse_chat_completion(&chat), "Paris.");
        assert_eq!(parse_chat_completion(&serde_json::json!({})), "");

        let msg = serde_json::json!({
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]
        });
        assert_eq!(parse_anthropic_message(&msg), "a\nb");
    }
}
