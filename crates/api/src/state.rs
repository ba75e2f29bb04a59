use std::sync::Arc;

use studio_comfyui::backend::GenerationBackend;
use studio_core::session::SessionStore;
use studio_core::template::TemplateRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`. Only the session
/// store is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Active generation backend (ComfyUI in production).
    pub backend: Arc<dyn GenerationBackend>,
    /// Workflow templates, validated at startup.
    pub templates: Arc<TemplateRegistry>,
    /// Conversational context for `text_gen`.
    pub sessions: Arc<SessionStore>,
}
