use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Openai,
    Grok,
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    /// `None` for local endpoints that accept any key
    pub env_var: Option<&'static str>,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Ollama => ProviderConfig {
                api_url: "http://localhost:11434/v1/chat/completions",
                model: "gemma2:9b",
                env_var: None,
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-5.1",
                env_var: Some("OPENAI_API_KEY"),
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: Some("XAI_API_KEY"),
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-3-pro",
                env_var: Some("GEMINI_API_KEY"),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
            Provider::Gemini => "Gemini",
        }
    }

    /// Read the API key from this provider's environment variable
    pub fn validate_api_key(&self) -> Result<Option<String>> {
        let Some(env_var) = self.config().env_var else {
            return Ok(None);
        };
        std::env::var(env_var)
            .map(Some)
            .map_err(|_| PipelineError::MissingApiKey {
                env_var: env_var.to_string(),
            })
    }
}

/// Overrides for the provider preset, as read from config files or flags
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligenceSettings {
    pub provider: Provider,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

/// Fully resolved connection settings handed to the language model client
#[derive(Clone, Debug)]
pub struct IntelligenceConfig {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl IntelligenceConfig {
    pub fn resolve(settings: &IntelligenceSettings) -> Result<Self> {
        let preset = settings.provider.config();
        Ok(Self {
            provider: settings.provider,
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| preset.api_url.to_string()),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| preset.model.to_string()),
            api_key: settings.provider.validate_api_key()?,
            temperature: 0.3,
        })
    }
}
