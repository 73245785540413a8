use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AdviceError, AdviceFuture, AdviceProvider, SERVER_TIMEOUT};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const GEMINI_EMPTY_RESPONSE: &str = "The AI returned an empty response.";

const DEFAULT_GROK_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_GROK_MODEL: &str = "grok-2-1212";
const GROK_SYSTEM_PROMPT: &str = "You are a professional financial advisor.";
const GROK_TEMPERATURE: f64 = 0.7;

fn http_client() -> Result<reqwest::Client, AdviceError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(SERVER_TIMEOUT)
        .build()
        .map_err(|err| AdviceError::Transport(err.to_string()))
}

/// Google Gemini `generateContent` endpoint.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl GeminiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AdviceError> {
        Self::with_endpoint(api_key, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, AdviceError> {
        Ok(Self {
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http_client: http_client()?,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, AdviceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("requesting advice from gemini model {}", self.model);
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!("Gemini API error response: {text}");
            return Err(AdviceError::Api {
                status: status.as_u16(),
                message: provider_error_message("Gemini", status.as_u16(), &text),
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)?;
        let advice = parsed.text();
        if advice.trim().is_empty() {
            return Ok(GEMINI_EMPTY_RESPONSE.to_string());
        }
        Ok(advice)
    }
}

impl AdviceProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate_advice<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a> {
        Box::pin(self.generate(prompt))
    }
}

/// xAI Grok chat completions endpoint.
pub struct GrokProvider {
    api_key: String,
    base_url: String,
    model: String,
    http_client: reqwest::Client,
}

impl GrokProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AdviceError> {
        Self::with_endpoint(api_key, DEFAULT_GROK_BASE_URL, DEFAULT_GROK_MODEL)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, AdviceError> {
        Ok(Self {
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http_client: http_client()?,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, AdviceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: GROK_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: GROK_TEMPERATURE,
        };

        debug!("requesting advice from grok model {}", self.model);
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!("Grok API error response: {text}");
            return Err(AdviceError::Api {
                status: status.as_u16(),
                message: provider_error_message("Grok", status.as_u16(), &text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AdviceError::EmptyResponse)
    }
}

impl AdviceProvider for GrokProvider {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn generate_advice<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a> {
        Box::pin(self.generate(prompt))
    }
}

/// Best human-readable message from a provider error body: `error.message`,
/// then a string `error`, then top-level `message`, then the raw body.
fn provider_error_message(provider: &str, status: u16, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return format!("{provider} API error ({status}): {body}");
    };
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

impl GeminiResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}
