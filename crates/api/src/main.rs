use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use studio_comfyui::backend::{select_endpoint, GenerationBackend};
use studio_core::session::SessionStore;
use studio_core::task::TaskKind;
use studio_core::template::TemplateRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_api::config::{LogFormat, ServerConfig};
use studio_api::router::build_app_router;
use studio_api::state::AppState;

/// Timeout for a single outbound call to the backend.
const BACKEND_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "studio_api=debug,studio_comfyui=debug,tower_http=debug".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let poll_budget = config.longest_poll_budget();
    if Duration::from_secs(config.request_timeout_secs) < poll_budget {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs,
            poll_budget_secs = poll_budget.as_secs(),
            "Request timeout is shorter than the longest polling budget; slow jobs will be cut off",
        );
    }

    // --- Workflow templates ---
    let templates = TemplateRegistry::load(&config.workflow_dir, &TaskKind::ALL)
        .await
        .expect("Failed to load workflow templates");
    tracing::info!(count = templates.len(), dir = %config.workflow_dir.display(), "Workflow templates validated");

    // --- Generation backend ---
    let client = reqwest::Client::builder()
        .timeout(BACKEND_CALL_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client");
    let backend = select_endpoint(&client, &config.comfyui_urls)
        .await
        .expect("COMFYUI_URLS must list at least one URL");
    tracing::info!(endpoint = backend.endpoint(), dir = %config.comfyui_dir.display(), "ComfyUI backend selected");

    // --- Chat sessions ---
    let sessions = SessionStore::new(config.session_max_turns, config.session_idle);

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        backend: Arc::new(backend),
        templates: Arc::new(templates),
        sessions: Arc::new(sessions),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
