//! OpenAI-compatible chat completions provider.
//!
//! Works against any endpoint speaking the OpenAI chat completions API.
//! Structured output uses `response_format: json_schema`; transport
//! failures (429/5xx) are retried with exponential backoff, semantic
//! failures are not.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    check_required_properties, ChatMessage, CompletionRequest, CompletionResponse, LlmProvider,
    Role,
};
use crate::llm::retry::{is_retryable_status, retry_backoff_delay};

/// OpenAI-compatible chat completions provider.
pub struct OpenAiCompatProvider {
    client: Client,
    config: LlmConfig,
}

impl OpenAiCompatProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() {
            return Err(LlmError::AuthFailed {
                provider: "openai_compat".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> String {
        self.config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default()
    }

    /// Send a request with retry on transient HTTP errors.
    async fn send_request(&self, body: &ChatCompletionRequest) -> Result<String, LlmError> {
        let url = self.api_url();
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            tracing::debug!(url = %url, attempt = attempt + 1, "sending chat completion request");

            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key()))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if attempt < max_retries {
                        let delay = retry_backoff_delay(attempt);
                        tracing::warn!(
                            "request error (attempt {}/{}), retrying in {:?}: {}",
                            attempt + 1,
                            max_retries + 1,
                            delay,
                            e,
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(LlmError::RequestFailed {
                        provider: "openai_compat".to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            let status = response.status();
            let response_text = response.text().await.unwrap_or_default();

            if !status.is_success() {
                let status_code = status.as_u16();

                if status_code == 401 {
                    return Err(LlmError::AuthFailed {
                        provider: "openai_compat".to_string(),
                    });
                }

                if is_retryable_status(status_code) && attempt < max_retries {
                    let delay = retry_backoff_delay(attempt);
                    tracing::warn!(
                        "HTTP {} (attempt {}/{}), retrying in {:?}",
                        status_code,
                        attempt + 1,
                        max_retries + 1,
                        delay,
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                if status_code == 429 {
                    return Err(LlmError::RateLimited {
                        provider: "openai_compat".to_string(),
                        retry_after: None,
                    });
                }
                return Err(LlmError::RequestFailed {
                    provider: "openai_compat".to_string(),
                    reason: format!("HTTP {}: {}", status, response_text),
                });
            }

            return Ok(response_text);
        }

        // Unreachable: the loop always returns.
        Err(LlmError::RequestFailed {
            provider: "openai_compat".to_string(),
            reason: "retry loop exited unexpectedly".to_string(),
        })
    }

    fn parse_content(&self, response_text: &str) -> Result<(String, u32, u32), LlmError> {
        let response: ChatCompletionResponse =
            serde_json::from_str(response_text).map_err(|e| LlmError::InvalidResponse {
                provider: "openai_compat".to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, response_text),
            })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: "openai_compat".to_string(),
                reason: "no choices in response".to_string(),
            })?;

        let content = choice.message.content.unwrap_or_default();
        if content.is_empty() {
            // An empty completion is a failure, never a silent success.
            return Err(LlmError::InvalidResponse {
                provider: "openai_compat".to_string(),
                reason: "empty completion content".to_string(),
            });
        }

        let usage = response.usage.unwrap_or_default();
        Ok((content, usage.prompt_tokens, usage.completion_tokens))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: None,
        };

        let text = self.send_request(&request).await?;
        let (content, input_tokens, output_tokens) = self.parse_content(&text)?;

        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }

    async fn complete_structured(
        &self,
        req: CompletionRequest,
        schema_name: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: schema_name.to_string(),
                    strict: true,
                    schema: schema.clone(),
                },
            }),
        };

        let text = self.send_request(&request).await?;
        let (content, _, _) = self.parse_content(&text)?;

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| LlmError::InvalidResponse {
                provider: "openai_compat".to_string(),
                reason: format!("structured content is not valid JSON: {}", e),
            })?;

        check_required_properties(&value, schema)?;
        Ok(value)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI-compatible wire types.

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
