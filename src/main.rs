mod config;
mod db;
mod error;
mod handlers;
mod jobs;
mod middleware;
mod models;
mod services;
mod storage;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::jobs::{PassthroughRenderer, ThumbnailQueueHandle, ThumbnailWorker};
use crate::storage::{BlobStore, LocalBlobStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub blobs: Arc<dyn BlobStore>,
    pub thumbnails: ThumbnailQueueHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cumulus=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cumulus...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    // Initialize blob storage
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.storage.blob_path));

    // Start the thumbnail worker
    let thumbnails =
        ThumbnailWorker::spawn(db.clone(), blobs.clone(), Arc::new(PassthroughRenderer));

    // Create app state
    let state = AppState {
        db,
        config: config.clone(),
        blobs,
        thumbnails,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        // Auth
        .route("/auth/logout", post(handlers::auth::logout))
        // User
        .route("/user/me", get(handlers::user::me))
        // Files
        .route(
            "/files",
            get(handlers::file::list_files).post(handlers::file::create_folder),
        )
        .route("/files/upload", post(handlers::file::upload_file))
        .route("/files/:id", get(handlers::file::get_file))
        .route("/files/:id/publish", put(handlers::file::publish_file))
        .route("/files/:id/unpublish", put(handlers::file::unpublish_file))
        .route("/files/:id/download", get(handlers::file::download_file))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine all routes under /api/v1
    Router::new()
        .nest("/api/v1", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
