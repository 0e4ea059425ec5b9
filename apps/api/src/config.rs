use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub greenpt_api_key: String,
    pub greenpt_api_url: String,
    pub greenpt_stt_url: String,
    pub greenpt_stt_model: String,
    pub cors_origin: String,
    pub port: u16,
    pub rust_log: String,
    /// Default per-session question cap when the client does not supply one.
    pub default_max_questions: u64,
    /// Idle sessions older than this are evicted by the background sweeper.
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            greenpt_api_key: require_env("GREENPT_API_KEY")?,
            greenpt_api_url: std::env::var("GREENPT_API_URL")
                .unwrap_or_else(|_| "https://api.greenpt.ai/v1/chat/completions".to_string()),
            greenpt_stt_url: std::env::var("GREENPT_STT_URL")
                .unwrap_or_else(|_| "https://api.greenpt.ai/v1/listen".to_string()),
            greenpt_stt_model: std::env::var("GREENPT_STT_MODEL")
                .unwrap_or_else(|_| "green-s".to_string()),
            cors_origin: std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            default_max_questions: std::env::var("MAX_QUESTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u64>()
                .context("MAX_QUESTIONS must be a non-negative integer")?,
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse::<u64>()
                .context("SESSION_TTL_SECS must be a non-negative integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
