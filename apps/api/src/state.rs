use std::sync::Arc;

use crate::config::Config;
use crate::gateway::{ChatGateway, ChatOptions};
use crate::prompt::presets::PresetStore;
use crate::sessions::SessionStore;
use crate::transcribe::Transcriber;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// In-memory session registry. Constructed once at startup; never a
    /// module-level global.
    pub sessions: SessionStore,
    /// Chat-completion gateway behind a trait so controller logic is testable
    /// against stubs.
    pub gateway: Arc<dyn ChatGateway>,
    pub transcriber: Arc<dyn Transcriber>,
    /// Eagerly-populated style preset cache.
    pub presets: Arc<PresetStore>,
    pub chat_options: ChatOptions,
    pub config: Config,
}
