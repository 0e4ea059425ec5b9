//! Model Gateway — the single point of entry for chat-completion calls.
//!
//! No other module talks to the GreenPT API directly. The response body is
//! untrusted JSON and must pass through `normalize::extract_text` before any
//! text reaches a session.

pub mod normalize;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::errors::AppError;
use crate::sessions::Message;

/// Default chat model requested from GreenPT.
pub const DEFAULT_MODEL: &str = "green-l";
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 512;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// Per-call knobs forwarded in the request payload.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        ChatOptions {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: false,
        }
    }
}

/// The chat-completion contract the core depends on. Implemented by
/// `GreenPtClient` in production and by stubs in controller tests.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, messages: &[Message], options: &ChatOptions)
        -> Result<Value, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Thin async client for the GreenPT chat-completion endpoint.
#[derive(Clone)]
pub struct GreenPtClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GreenPtClient {
    pub fn new(api_key: String, api_url: String) -> Self {
        GreenPtClient {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            api_url,
        }
    }
}

#[async_trait]
impl ChatGateway for GreenPtClient {
    /// Sends the full message sequence to GreenPT. Non-2xx responses are
    /// reported as `GatewayError::Api`; there is no retry loop here — upstream
    /// failures are surfaced to the caller, not papered over.
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<Value, GatewayError> {
        let payload = json!({
            "model": options.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": options.stream,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        debug!("chat call succeeded: {} messages sent", messages.len());
        Ok(body)
    }
}
