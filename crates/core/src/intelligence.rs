use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{PipelineError, Result},
    provider::IntelligenceConfig,
};

/// Language model capabilities the resolver delegates to
#[async_trait]
pub trait Intelligence: Send + Sync {
    /// Name of the text's language in English, lowercased (e.g. "english")
    async fn detect_language(&self, text: &str) -> Result<String>;

    /// Translate `text`. Returns the input unchanged when both languages match.
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;

    async fn summarize(&self, text: &str) -> Result<String>;
}

const DETECTION_SAMPLE_CHARS: usize = 200;

static SUMMARY_PROMPT: &str = r#"請根據以下影片轉錄文字稿生成一份簡潔的繁體中文摘要（直接回答，不要做其他說明或評論，並提供HTML格式的內容，例如<ul><li>）。摘要應包含以下內容:

1. 影片的主要主題或目的
2. 3-5個關鍵要點或主要論點
3. 任何重要的結論或呼籲行動
4. 總結全文的簡短段落

請基於以下內容生成："#;

/// OpenAI-compatible chat completions client
pub struct ChatClient {
    http: reqwest::Client,
    config: IntelligenceConfig,
}

impl ChatClient {
    pub fn new(config: IntelligenceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn complete(&self, capability: &'static str, prompt: String) -> Result<String> {
        debug!(capability, model = %self.config.model, "sending chat completion");

        let mut request = self
            .http
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt,
                    },
                ],
                "temperature": self.config.temperature,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        extract_content(&response).ok_or_else(|| PipelineError::IntelligenceFailed {
            capability,
            reason: format!("Invalid API response: {:?}", response),
        })
    }
}

fn extract_content(response: &serde_json::Value) -> Option<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl Intelligence for ChatClient {
    async fn detect_language(&self, text: &str) -> Result<String> {
        let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
        let prompt = format!(
            "Please detect the language of the following text and respond with only the language name in English: {}",
            sample
        );
        let language = self.complete("Language detection", prompt).await?;
        Ok(language.trim().to_lowercase())
    }

    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        if source_language == target_language {
            return Ok(text.to_string());
        }
        let prompt = format!(
            "請將以下 {} 的內容翻譯為 {}。請保持原文的段落結構，直接翻譯，不要做其他任何回覆或說明: {}",
            source_language, target_language, text
        );
        self.complete("Translation", prompt)
            .await
            .map_err(|e| PipelineError::TranslationFailed {
                reason: e.to_string(),
            })
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!("{}\n{}", SUMMARY_PROMPT, text);
        self.complete("Summarization", prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    fn client() -> ChatClient {
        ChatClient::new(IntelligenceConfig {
            provider: Provider::Ollama,
            // nothing listens here; any request would fail
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            model: "test".to_string(),
            api_key: None,
            temperature: 0.3,
        })
    }

    #[test]
    fn extracts_first_choice_content() {
        let response = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "english"}}]
        });
        assert_eq!(extract_content(&response).as_deref(), Some("english"));
        assert_eq!(extract_content(&serde_json::json!({"error": "boom"})), None);
    }

    #[tokio::test]
    async fn translating_into_the_same_language_skips_the_request() {
        let out = client()
            .translate("字幕", "Traditional Chinese", "Traditional Chinese")
            .await
            .unwrap();
        assert_eq!(out, "字幕");
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_as_translation_failure() {
        let err = client()
            .translate("hello", "english", "Traditional Chinese")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TranslationFailed { .. }));
    }
}
