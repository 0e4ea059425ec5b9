mod config;
mod errors;
mod extract;
mod gateway;
mod interview;
mod prompt;
mod routes;
mod sessions;
mod state;
mod transcribe;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gateway::{ChatOptions, GreenPtClient};
use crate::prompt::presets::PresetStore;
use crate::routes::build_router;
use crate::sessions::SessionStore;
use crate::state::AppState;
use crate::transcribe::GreenPtStt;

const SWEEP_INTERVAL_SECS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize chat gateway and transcription clients
    let gateway = Arc::new(GreenPtClient::new(
        config.greenpt_api_key.clone(),
        config.greenpt_api_url.clone(),
    ));
    info!("Chat gateway initialized ({})", config.greenpt_api_url);

    let transcriber = Arc::new(GreenPtStt::new(
        config.greenpt_api_key.clone(),
        config.greenpt_stt_url.clone(),
        config.greenpt_stt_model.clone(),
    ));
    info!("Transcriber initialized (model: {})", config.greenpt_stt_model);

    // Eagerly materialize the 27 style presets
    let presets = Arc::new(PresetStore::new());

    // Session registry plus idle-session sweeper
    let sessions = SessionStore::new();
    spawn_session_sweeper(sessions.clone(), config.session_ttl_secs);

    let state = AppState {
        sessions,
        gateway,
        transcriber,
        presets,
        chat_options: ChatOptions::default(),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &Config) -> Result<CorsLayer> {
    if config.cors_origin == "*" {
        return Ok(CorsLayer::permissive());
    }
    Ok(CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Evicts idle sessions on a fixed cadence. Sessions live in memory only, so
/// without this the registry grows for the life of the process.
fn spawn_session_sweeper(sessions: SessionStore, ttl_secs: u64) {
    tokio::spawn(async move {
        let ttl = chrono::Duration::seconds(ttl_secs as i64);
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            let evicted = sessions.sweep_idle(ttl).await;
            if evicted > 0 {
                info!("evicted {evicted} idle session(s); {} remain", sessions.len());
            }
        }
    });
}
