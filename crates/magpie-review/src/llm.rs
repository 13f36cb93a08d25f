use std::time::Duration;

use magpie_core::{LlmConfig, MagpieError, ReviewFinding};
use tracing::{debug, info};

use crate::prompt;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the LLM reviewer (Anthropic Messages API).
///
/// # Examples
///
/// ```
/// use magpie_core::LlmConfig;
/// use magpie_review::llm::ReviewerClient;
///
/// let client = ReviewerClient::new(&LlmConfig::with_api_key("test-key")).unwrap();
/// ```
pub struct ReviewerClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ReviewerClient {
    /// Create a new reviewer client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, MagpieError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| MagpieError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Ask the model to review one file and return its findings.
    ///
    /// Sends the full file content with the fixed review prompt at
    /// temperature 0. The response text is parsed against the finding
    /// schema; a malformed response yields an empty set, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Llm`] on transport failures, non-success
    /// status codes, or an unexpected response envelope. The caller treats
    /// those as zero findings for the file and keeps going.
    pub async fn review_file(
        &self,
        file_path: &str,
        content: &str,
    ) -> Result<Vec<ReviewFinding>, MagpieError> {
        info!(file_path, "requesting review");

        let url = format!("{}/v1/messages", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": 0,
            "system": prompt::build_system_prompt(),
            "messages": [{
                "role": "user",
                "content": prompt::build_review_prompt(file_path, content),
            }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MagpieError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(MagpieError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MagpieError::Llm(format!("failed to parse response: {e}")))?;

        let text = response_body
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                MagpieError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        debug!(file_path, response = text, "raw reviewer response");

        let findings = prompt::parse_findings(text);
        info!(file_path, count = findings.len(), "parsed review findings");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_succeeds() {
        let client = ReviewerClient::new(&LlmConfig::with_api_key("k"));
        assert!(client.is_ok());
    }

    #[test]
    fn model_returns_config_model() {
        let mut config = LlmConfig::with_api_key("k");
        config.model = "claude-3-5-haiku-20241022".into();
        let client = ReviewerClient::new(&config).unwrap();
        assert_eq!(client.model(), "claude-3-5-haiku-20241022");
    }
}
