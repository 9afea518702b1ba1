//! Speech-to-Text adapters.
//!
//! Both adapters speak the OpenAI `/audio/transcriptions` protocol:
//! - "openai-cloud": the hosted Whisper API
//! - "custom-cloud": any compatible endpoint (faster-whisper server, LocalAI, ...)

pub mod cloud;

use crate::config::SttSettings;

pub use cloud::CloudStt;

/// Create an STT engine from config values.
pub fn create_stt_engine(settings: &SttSettings) -> anyhow::Result<CloudStt> {
    let adapter = settings
        .adapter
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("No STT adapter configured"))?;
    match adapter {
        "openai-cloud" => {
            let key = settings
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("OpenAI STT requires an API key"))?;
            Ok(CloudStt::openai(key))
        }
        "custom-cloud" => {
            let url = settings
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Custom STT requires an endpoint URL"))?;
            Ok(CloudStt::custom(url, settings.api_key.clone()))
        }
        other => anyhow::bail!("Unknown STT adapter: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_stt_engine_requires_adapter() {
        assert!(create_stt_engine(&SttSettings::default()).is_err());
    }

    #[test]
    fn test_create_stt_engine_openai_needs_key() {
        let mut settings = SttSettings {
            adapter: Some("openai-cloud".into()),
            ..Default::default()
        };
        assert!(create_stt_engine(&settings).is_err());
        settings.api_key = Some("sk-x".into());
        let engine = create_stt_engine(&settings).unwrap();
        assert!(engine.endpoint().contains("api.openai.com"));
    }

    #[test]
    fn test_create_stt_engine_custom() {
        let settings = SttSettings {
            adapter: Some("custom-cloud".into()),
            endpoint: Some("http://localhost:8000/v1/audio/transcriptions".into()),
            api_key: None,
        };
        let engine = create_stt_engine(&settings).unwrap();
        assert_eq!(engine.endpoint(), "http://localhost:8000/v1/audio/transcriptions");
    }

    #[test]
    fn test_create_stt_engine_unknown() {
        let settings = SttSettings {
            adapter: Some("carrier-pigeon".into()),
            ..Default::default()
        };
        assert!(create_stt_engine(&settings).is_err());
    }
}
