//! Narrative advice for a plan, produced by an external text-generation
//! provider. The projection engine never depends on this module.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

mod prompt;
mod providers;

pub use prompt::{COUNTRIES, Country, build_prompt, country_by_code};
pub use providers::{GeminiProvider, GrokProvider};

/// Per-attempt bound applied by callers waiting on a provider.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on a whole advice request, retries included, on the server.
pub const SERVER_TIMEOUT: Duration = Duration::from_secs(300);

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const XAI_API_KEY_VAR: &str = "XAI_API_KEY";

/// Errors emitted by advice providers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdviceError {
    #[error("{var} is not set in the server environment variables.")]
    MissingApiKey { var: &'static str },

    #[error("advice transport error: {0}")]
    Transport(String),

    #[error("advice provider error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("advice parse error: {0}")]
    Parse(String),

    #[error("advice request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("the AI returned an empty response")]
    EmptyResponse,
}

impl AdviceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AdviceError::Timeout { .. })
    }
}

impl From<reqwest::Error> for AdviceError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Timeout {
                seconds: SERVER_TIMEOUT.as_secs(),
            };
        }
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for AdviceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

pub type AdviceFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AdviceError>> + Send + 'a>>;

/// Turns a prompt into Markdown advice.
pub trait AdviceProvider: Send + Sync {
    /// Returns the provider name for logging.
    fn name(&self) -> &'static str;

    fn generate_advice<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a>;
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ProviderKind {
    #[default]
    Gemini,
    Grok,
}

impl ProviderKind {
    /// Unknown names fall back to Gemini.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("grok") {
            ProviderKind::Grok
        } else {
            ProviderKind::Gemini
        }
    }
}

/// Provider credentials resolved from the environment.
#[derive(Clone, Default)]
pub struct AdviceConfig {
    pub gemini_api_key: Option<String>,
    pub xai_api_key: Option<String>,
}

impl std::fmt::Debug for AdviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdviceConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("xai_api_key", &self.xai_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl AdviceConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_env(GEMINI_API_KEY_VAR),
            xai_api_key: non_empty_env(XAI_API_KEY_VAR),
        }
    }

    /// Builds the provider for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`AdviceError::MissingApiKey`] when the provider's key is not
    /// configured, or a transport error if the HTTP client cannot be built.
    pub fn provider(&self, kind: ProviderKind) -> Result<Box<dyn AdviceProvider>, AdviceError> {
        match kind {
            ProviderKind::Gemini => {
                let key = self.gemini_api_key.clone().ok_or(AdviceError::MissingApiKey {
                    var: GEMINI_API_KEY_VAR,
                })?;
                Ok(Box::new(GeminiProvider::new(key)?))
            }
            ProviderKind::Grok => {
                info!("{XAI_API_KEY_VAR} present: {}", self.xai_api_key.is_some());
                let key = self.xai_api_key.clone().ok_or(AdviceError::MissingApiKey {
                    var: XAI_API_KEY_VAR,
                })?;
                Ok(Box::new(GrokProvider::new(key)?))
            }
        }
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Asks `provider` for advice, bounding each attempt by `timeout` and
/// retrying exactly once on any failure.
pub async fn request_advice(
    provider: &dyn AdviceProvider,
    prompt: &str,
    timeout: Duration,
) -> Result<String, AdviceError> {
    match attempt(provider, prompt, timeout).await {
        Ok(text) => Ok(text),
        Err(err) => {
            warn!(
                "advice from {} failed, retrying once: {err}",
                provider.name()
            );
            attempt(provider, prompt, timeout).await
        }
    }
}

async fn attempt(
    provider: &dyn AdviceProvider,
    prompt: &str,
    timeout: Duration,
) -> Result<String, AdviceError> {
    match tokio::time::timeout(timeout, provider.generate_advice(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(AdviceError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}
