use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use stylecast_core::{ImageGeneration, TextCompletion};
use thiserror::Error;
use tracing::warn;

mod gemini;
mod openai;

pub use gemini::{DEFAULT_GEMINI_IMAGE_MODEL, GeminiClient};
pub use openai::{DEFAULT_OPENAI_IMAGE_MODEL, OpenAiClient};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const RETRY_BASE_DELAY_MS: u64 = 800;
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} API key is missing")]
    MissingApiKey { provider: ProviderKind },
    #[error("unknown provider `{0}` (expected `gemini` or `openai`)")]
    UnknownProvider(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: ProviderKind,
        status: u16,
        body: String,
    },
    #[error("{provider} response contained no {what}")]
    EmptyResponse {
        provider: ProviderKind,
        what: &'static str,
    },
    #[error("failed to decode image payload")]
    Decode(#[from] base64::DecodeError),
}

/// Completion providers selectable by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn default_api_key_env_var(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_image_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => DEFAULT_GEMINI_IMAGE_MODEL,
            ProviderKind::OpenAi => DEFAULT_OPENAI_IMAGE_MODEL,
        }
    }

    /// Guess the provider from a well-known model family name.
    pub fn infer_from_model(model: &str) -> Option<Self> {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("gemini") || model.starts_with("imagen") {
            return Some(ProviderKind::Gemini);
        }
        const OPENAI_FAMILIES: &[&str] = &["gpt-", "chatgpt", "o1", "o3", "o4", "dall-e"];
        if OPENAI_FAMILIES
            .iter()
            .any(|family| model.starts_with(family))
        {
            return Some(ProviderKind::OpenAi);
        }
        None
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => f.write_str("gemini"),
            ProviderKind::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

/// Split a `provider/model` identifier.
///
/// Without a recognised prefix the provider is inferred from the model name,
/// and the identifier is returned unchanged.
pub fn split_model_id(model: &str) -> (Option<ProviderKind>, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        if let Ok(kind) = prefix.parse::<ProviderKind>() {
            return (Some(kind), rest);
        }
    }
    (ProviderKind::infer_from_model(model), model)
}

/// Settings shared by every client a provider builds.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub max_retries: u32,
    pub temperature: f32,
    pub image_model: String,
    pub aspect_ratio: Option<String>,
}

impl ClientOptions {
    pub fn for_provider(kind: ProviderKind) -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            temperature: DEFAULT_TEMPERATURE,
            image_model: kind.default_image_model().to_string(),
            aspect_ratio: Some(DEFAULT_ASPECT_RATIO.to_string()),
        }
    }
}

/// Build the text/vision collaborator for `kind`.
///
/// # Errors
///
/// Returns [`ProviderError::MissingApiKey`] for a blank key, before any
/// request is made.
pub fn text_client(
    kind: ProviderKind,
    api_key: &str,
    options: ClientOptions,
) -> Result<Box<dyn TextCompletion>, ProviderError> {
    Ok(match kind {
        ProviderKind::Gemini => Box::new(GeminiClient::new(api_key, options)?),
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(api_key, options)?),
    })
}

/// Build the image-generation collaborator for `kind`.
pub fn image_client(
    kind: ProviderKind,
    api_key: &str,
    options: ClientOptions,
) -> Result<Box<dyn ImageGeneration>, ProviderError> {
    Ok(match kind {
        ProviderKind::Gemini => Box::new(GeminiClient::new(api_key, options)?),
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(api_key, options)?),
    })
}

pub(crate) fn checked_api_key(
    provider: ProviderKind,
    api_key: &str,
) -> Result<String, ProviderError> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::MissingApiKey { provider });
    }
    Ok(trimmed.to_string())
}

pub(crate) fn http_client() -> Result<Client, ProviderError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn should_retry_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(u64::from(attempt.max(1))))
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
    format!("{truncated}...")
}

/// Send a request, retrying transient failures with linear backoff.
pub(crate) fn send_with_retry<F>(
    provider: ProviderKind,
    max_retries: u32,
    build: F,
) -> Result<Response, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let can_retry = attempt <= max_retries;

        match build().send() {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                if can_retry && should_retry_status(status) {
                    warn!(%provider, status = status.as_u16(), attempt, "retrying request");
                    thread::sleep(retry_delay(attempt));
                    continue;
                }
                let body = response.text().unwrap_or_default();
                return Err(ProviderError::Status {
                    provider,
                    status: status.as_u16(),
                    body: truncate_body(&body),
                });
            }
            Err(error) if can_retry && should_retry_error(&error) => {
                warn!(%provider, %error, attempt, "retrying request");
                thread::sleep(retry_delay(attempt));
            }
            Err(error) => return Err(error.into()),
        }
    }
}
