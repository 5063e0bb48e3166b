//! Promptr gateway: JSON API for the prompt library, title generation, and waitlist.
//! Single sled database on disk; bearer tokens map to user ids from config.

mod auth;
mod cors;
mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use promptr_core::{PromptrConfig, PromptrStores};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handlers::{library, memories, naming, waitlist};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<PromptrConfig>,
    pub(crate) stores: PromptrStores,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PromptrConfig::load()?;
    if config.access_tokens.is_empty() {
        tracing::warn!("no access tokens configured; authenticated routes will answer 401");
    }
    let stores = PromptrStores::open(&config.storage_path)?;
    tracing::info!(
        app = %config.app_name,
        storage = %config.storage_path,
        users = config.access_tokens.len(),
        "stores opened"
    );

    let addr = config.bind_addr();
    let app = build_app(AppState {
        config: Arc::new(config),
        stores,
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutdown requested");
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/memories/generate-name", post(naming::generate_name))
        .route(
            "/api/memories",
            get(memories::list_memories)
                .post(memories::create_memory)
                .delete(memories::delete_memory),
        )
        .route("/api/memories/bulk-delete", post(memories::bulk_delete))
        .route("/api/memories/import", post(memories::import_memories))
        .route("/api/memories/export", get(memories::export_memories))
        .route("/api/memories/:id", patch(memories::update_memory))
        .route("/api/memories/:id/duplicate", post(memories::duplicate_memory))
        .route("/api/memories/:id/revert", post(memories::revert_memory))
        .route("/api/memories/:id/versions", get(memories::list_versions))
        .route("/api/memories/:id/copy", post(memories::copy_memory))
        .route("/api/memories/:id/favorite", post(memories::toggle_favorite))
        .route("/api/memories/:id/tags", post(memories::add_tag))
        .route("/api/memories/:id/tags/:tag", delete(memories::remove_tag))
        .route("/api/memories/:id/folder", put(memories::assign_folder))
        .route(
            "/api/folders",
            get(library::list_folders).post(library::create_folder),
        )
        .route("/api/folders/:id", delete(library::delete_folder))
        .route("/api/library", get(library::library))
        .route("/api/library/stats", get(library::stats))
        .route("/api/library/tags", get(library::tags))
        .route("/api/waitlist", post(waitlist::join_waitlist))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(cors::cors))
}

async fn health() -> &'static str {
    "OK"
}
