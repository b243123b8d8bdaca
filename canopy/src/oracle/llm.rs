//! LLM-backed oracle adapter for any OpenAI-compatible chat endpoint
//! (Ollama, LM Studio, OpenAI, ...). Retry and timeout policy for the
//! remote calls lives here; the index core propagates failures untouched.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;

use crate::config::OracleConfig;
use crate::error::{CanopyError, Result};
use crate::oracle::{prompts, validate_score, Oracle, ScoreContext};

const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Clone)]
pub struct LlmOracle {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
    summary_max_tokens: u32,
    persona: Option<String>,
}

impl LlmOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());

        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                CanopyError::OracleUnavailable(format!(
                    "failed to create oracle HTTP client: {error}"
                ))
            })?;

        // Cap async-openai's internal backoff at our timeout; its default
        // max_elapsed_time retries server errors for up to 15 minutes.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            model: config.model.clone(),
            max_retries: config.max_retries,
            summary_max_tokens: config.summary_max_tokens.max(1),
            persona: config.persona.clone(),
        })
    }

    /// Bound summary length in proportion to the index geometry: an internal
    /// node concatenates up to `max_subtopics` child summaries into a text
    /// that must itself fit the chunk budget.
    pub fn with_summary_budget(mut self, chunk_length: usize, max_subtopics: usize) -> Self {
        let budget = chunk_length / max_subtopics.max(1);
        self.summary_max_tokens = budget.clamp(1, u32::MAX as usize) as u32;
        self
    }

    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let mut last_error: Option<CanopyError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(prompt, system_prompt, max_tokens)?;

            match self.client.chat().create(request).await {
                Ok(response) => return Self::extract_content(response),
                Err(error) => {
                    if let Some(rate_limit_error) = Self::rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.max_retries {
                        tracing::warn!(attempt, error = %mapped_error, "Oracle call failed, retrying");
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CanopyError::Oracle("oracle call failed after retries".to_string())))
    }

    fn build_request(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if let Some(system_prompt) = system_prompt {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|error| {
                        CanopyError::Oracle(format!("invalid system prompt: {error}"))
                    })?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|error| CanopyError::Oracle(format!("invalid user prompt: {error}")))?
                .into(),
        );

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(self.model.clone())
            .messages(messages)
            .temperature(0.0);

        if let Some(max_tokens) = max_tokens {
            request.max_tokens(max_tokens);
        }

        request
            .build()
            .map_err(|error| CanopyError::Oracle(format!("invalid oracle request: {error}")))
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CanopyError::Oracle("oracle response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(CanopyError::Oracle(
                "oracle response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    fn parse_relevance(content: &str) -> Result<f64> {
        let value: serde_json::Value = serde_json::from_str(content.trim()).map_err(|e| {
            CanopyError::Oracle(format!("relevance response is not valid JSON: {e}"))
        })?;

        let score = value
            .get("relevance")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                CanopyError::Oracle("relevance response missing numeric 'relevance'".to_string())
            })?;

        validate_score(score)
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn rate_limit_error(error: &OpenAIError) -> Option<CanopyError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
            {
                Some(CanopyError::OracleRateLimit { retry_after: None })
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => {
                Some(CanopyError::OracleRateLimit { retry_after: None })
            }
            _ => None,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
    }

    fn map_openai_error(error: OpenAIError) -> CanopyError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                CanopyError::Oracle(format!("oracle request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                CanopyError::Oracle(format!("oracle API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                CanopyError::Oracle(format!("failed to parse oracle response: {err}"))
            }
            other => CanopyError::Oracle(other.to_string()),
        }
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn score(&self, ctx: &ScoreContext<'_>) -> Result<f64> {
        let persona = ctx.persona.or(self.persona.as_deref());
        let prompt = prompts::relevance_prompt(persona, ctx.question, ctx.text);
        let content = self.complete(&prompt, None, None).await?;
        Self::parse_relevance(&content)
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!("The text to be summarized is:\n{text}");
        self.complete(
            &prompt,
            Some(prompts::summary_prompt()),
            Some(self.summary_max_tokens),
        )
        .await
    }
}
