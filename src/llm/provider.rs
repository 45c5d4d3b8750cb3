// src/llm/provider.rs
// Generic chat-completions client. Grounded on the reference GLM-4 client's
// request/retry shape: a single chat-completions endpoint, exponential
// backoff over a bounded retry count, and a json_chat wrapper that appends
// a JSON-reply instruction to the system prompt when the caller didn't
// already request response_format=json_object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::llm::LlmConfig;
use crate::error::LlmError;
use crate::model::Statistics;
use crate::utils::RateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
    pub response_format: Option<ResponseFormat>,
    pub stop: Option<Vec<String>>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Generic chat-completions surface. The orchestrator depends only on this
/// trait, never on a concrete provider, so a mock can stand in for tests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn chat(
        &self,
        messages: Vec<Message>,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError>;

    /// Chat with the response parsed as JSON. If the caller didn't already
    /// request `ResponseFormat::JsonObject`, an instruction to reply in
    /// JSON is appended to the system message.
    async fn json_chat(
        &self,
        mut messages: Vec<Message>,
        mut options: ChatOptions,
    ) -> Result<Value, LlmError> {
        let wants_json = matches!(options.response_format, Some(ResponseFormat::JsonObject));
        if !wants_json {
            if let Some(system_msg) = messages.iter_mut().find(|m| m.role == "system") {
                system_msg.content.push_str("\n\nPlease reply in JSON format.");
            } else {
                messages.insert(
                    0,
                    Message::system("Please reply in JSON format."),
                );
            }
            options.response_format = Some(ResponseFormat::JsonObject);
        }

        let response = self.chat(messages, options).await?;
        parse_json_reply(&response.content)
    }

    async fn stream(
        &self,
        _messages: Vec<Message>,
        _options: ChatOptions,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String, LlmError>> + Send + Unpin>, LlmError>
    {
        Err(LlmError::Unavailable(format!(
            "{} does not support streaming",
            self.name()
        )))
    }
}

/// Strips Markdown code fences and surrounding prose before parsing, since
/// some models wrap JSON replies in ```json ... ``` even in JSON mode.
fn parse_json_reply(raw: &str) -> Result<Value, LlmError> {
    let trimmed = raw.trim();
    let candidate = if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
        match after_fence.find("```") {
            Some(end) => after_fence[..end].trim(),
            None => after_fence.trim(),
        }
    } else {
        trimmed
    };

    serde_json::from_str(candidate).map_err(|e| LlmError::ParseError {
        reason: e.to_string(),
        raw: raw.to_string(),
    })
}

/// Reference provider talking to a GLM-4-class chat-completions endpoint.
pub struct GlmProvider {
    client: reqwest::Client,
    config: LlmConfig,
    stats: Arc<Statistics>,
    rate_limiter: RateLimiter,
}

impl GlmProvider {
    pub fn new(config: LlmConfig, stats: Arc<Statistics>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let rate_limiter = RateLimiter::new(config.rate_limit_rpm)?;
        Ok(Self {
            client,
            config,
            stats,
            rate_limiter,
        })
    }

    fn headers_auth(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }

    async fn make_request(&self, payload: &Value) -> Result<Value, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.config.max_retries {
            self.rate_limiter
                .acquire()
                .await
                .map_err(|e| LlmError::Unavailable(e.to_string()))?;
            let result = self
                .client
                .post(&url)
                .header("Authorization", self.headers_auth())
                .header("Content-Type", "application/json")
                .json(payload)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::Unavailable(e.to_string()))?;
                    self.stats.record_llm_call();
                    return Ok(body);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let transient = status.is_server_error();
                    let body_text = resp.text().await.unwrap_or_default();
                    last_error = Some(LlmError::Unavailable(format!(
                        "HTTP {status}: {body_text}"
                    )));
                    if !transient || attempt == self.config.max_retries {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Unavailable(e.to_string()));
                    if attempt == self.config.max_retries {
                        break;
                    }
                }
            }

            tokio::time::sleep(delay).await;
            delay = delay.mul_f32(self.config.retry_factor);
        }

        Err(last_error.unwrap_or_else(|| LlmError::Unavailable("exhausted retries".into())))
    }
}

#[async_trait]
impl LlmProvider for GlmProvider {
    fn name(&self) -> &'static str {
        "glm"
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let model = options.model.clone().unwrap_or_else(|| self.config.model.clone());
        let mut payload = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(0.95),
        });

        if let Some(max_tokens) = options.max_tokens {
            payload["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(stop) = &options.stop {
            payload["stop"] = serde_json::json!(stop);
        }
        if let Some(request_id) = &options.request_id {
            payload["request_id"] = serde_json::json!(request_id);
        }
        if let Some(format) = options.response_format {
            let format_str = match format {
                ResponseFormat::Text => "text",
                ResponseFormat::JsonObject => "json_object",
            };
            payload["response_format"] = serde_json::json!({ "type": format_str });
        }

        let body = match self.make_request(&payload).await {
            Ok(body) => body,
            Err(e) => {
                crate::metrics::record_llm_call(&model, false);
                return Err(e);
            }
        };

        let content = match body["choices"][0]["message"]["content"].as_str() {
            Some(content) => content.to_string(),
            None => {
                crate::metrics::record_llm_call(&model, false);
                return Err(LlmError::Unavailable(
                    "missing choices[0].message.content".into(),
                ));
            }
        };
        let prompt_tokens = body["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = body["usage"]["completion_tokens"].as_u64().unwrap_or(0);

        crate::metrics::record_llm_call(&model, true);
        Ok(ChatResponse {
            content,
            model,
            prompt_tokens,
            completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"intent\": \"search\"}\n```";
        let value = parse_json_reply(raw).unwrap();
        assert_eq!(value["intent"], "search");
    }

    #[test]
    fn parses_bare_json() {
        let raw = "{\"intent\": \"chat\"}";
        let value = parse_json_reply(raw).unwrap();
        assert_eq!(value["intent"], "chat");
    }

    #[test]
    fn rejects_non_json() {
        let raw = "sure thing, here's your answer";
        assert!(parse_json_reply(raw).is_err());
    }

    struct MockProvider {
        reply: String,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn chat(
            &self,
            _messages: Vec<Message>,
            _options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                content: self.reply.clone(),
                model: "mock-model".to_string(),
                prompt_tokens: 1,
                completion_tokens: 1,
            })
        }
    }

    #[tokio::test]
    async fn json_chat_appends_instruction_when_absent() {
        let provider = MockProvider {
            reply: "{\"ok\": true}".to_string(),
        };
        let messages = vec![Message::system("you are helpful"), Message::user("hi")];
        let value = provider
            .json_chat(messages, ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }
}
