mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod static_files;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::services::{ChatPdfClient, GeminiClient};
use crate::storage::StorageProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub storage: Arc<dyn StorageProvider>,
    pub gemini: GeminiClient,
    pub chat_pdf: ChatPdfClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardshare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CardShare...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let storage = storage::from_config(&config.storage);
    let gemini = GeminiClient::new(&config.ai)?;
    let chat_pdf = ChatPdfClient::new(&config.ai)?;

    if config.ai.metadata_api_key.is_none() || config.ai.folder_suggestions_api_key.is_none() {
        tracing::warn!("Gemini API keys are not fully configured; AI suggestions will fail");
    }

    // Create app state
    let state = AppState {
        db,
        config: config.clone(),
        storage,
        gemini,
        chat_pdf,
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

/// Request body limit for uploads: the largest accepted file plus 1 MiB of multipart framing
fn upload_body_limit(max_upload_size: u64) -> usize {
    let limit = max_upload_size.saturating_add(1024 * 1024);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = upload_body_limit(state.config.storage.max_upload_size);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/sign-up", post(handlers::auth::sign_up))
        .route("/auth/sign-in", post(handlers::auth::sign_in))
        .route("/public/cards/:card_id", get(handlers::card::get_public_card))
        .route(
            "/public/cards/:card_id/files/:file_id/download",
            get(handlers::card::download_public_file),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        // Auth
        .route("/auth/sign-out", post(handlers::auth::sign_out))
        // User
        .route("/user/me", get(handlers::user::get_me))
        .route("/user/storage", get(handlers::user::get_storage_summary))
        // Files
        .route("/files", get(handlers::file::list_files))
        .route(
            "/files/upload",
            post(handlers::file::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/move", post(handlers::file::move_files))
        .route(
            "/files/:id",
            get(handlers::file::get_file)
                .patch(handlers::file::rename_file)
                .delete(handlers::file::delete_file),
        )
        .route("/files/:id/users", put(handlers::file::update_file_users))
        .route("/files/:id/download", get(handlers::file::download_file))
        // Folders
        .route(
            "/folders",
            get(handlers::folder::list_folders).post(handlers::folder::create_folder),
        )
        .route("/folders/:id/path", get(handlers::folder::folder_path))
        .route("/folders/:id", delete(handlers::folder::delete_folder))
        // Cards
        .route("/cards", post(handlers::card::create_card))
        .route("/cards/my", get(handlers::card::list_my_cards))
        .route("/cards/:card_id", delete(handlers::card::delete_card))
        // AI
        .route("/ai/card-metadata", post(handlers::ai::card_metadata))
        .route("/ai/folder-suggestions", post(handlers::ai::folder_suggestions))
        .route("/chat-pdf/list", get(handlers::ai::chat_pdf_list))
        .route("/chat-pdf/ask", post(handlers::ai::chat_pdf_ask))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine all routes under /api/v1
    let router = Router::new().nest("/api/v1", public_routes.merge(protected_routes));

    let router = match state.config.server.web_root.as_deref() {
        Some(web_root) => router.fallback_service(static_files::spa_service(Path::new(web_root))),
        None => router.fallback(|| async { AppError::NotFound("Not found".to_string()) }),
    };

    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            static_files::page_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
