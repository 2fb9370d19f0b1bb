//! College Website Content Backend
//!
//! Serves live site content out of a SQLite-backed document store, keeps an
//! in-memory view of every collection current, and hosts the admin authoring
//! API behind a session guard.

mod api;
mod assistant;
mod auth;
mod config;
mod db;
mod errors;
mod gateway;
mod media;
mod models;
mod store;
mod sync;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use assistant::Assistant;
use auth::{
    AccountProvider, IdentityProvider, OpenProvider, SessionGuard, SessionRegistry, StaticProvider,
};
use config::{AuthMode, Config};
use db::Repository;
use errors::AppError;
use gateway::ContentGateway;
use media::LocalMediaStore;
use store::{ContentStore, SqliteContentStore};
use sync::{ContentSynchronizer, SiteContent};

/// Largest accepted media upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub content: Arc<SiteContent>,
    pub gateway: ContentGateway,
    pub guard: SessionGuard,
    pub assistant: Arc<Assistant>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting college content backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Media directory: {:?}", config.media_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    let state = build_state(config.clone()).await?;
    let content = state.content.clone();

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    content.detach();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Open the stores, attach the live content views and wire up the services.
pub async fn build_state(config: Config) -> Result<AppState, AppError> {
    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);
    let store: Arc<dyn ContentStore> = Arc::new(SqliteContentStore::new(repo.clone()));

    // Initialize media store
    let media = LocalMediaStore::new(config.media_dir.clone(), config.public_media_url.clone());
    media.initialize().await?;

    let provider = identity_provider(&config, repo).await?;

    // Attach live views of every collection
    let sync = ContentSynchronizer::new(store.clone(), config.seed_write_back.clone());
    let content = Arc::new(SiteContent::attach(&sync).await);

    let assistant = Arc::new(Assistant::from_config(&config)?);

    Ok(AppState {
        gateway: ContentGateway::new(store.clone(), Arc::new(media)),
        store,
        content,
        guard: SessionGuard::new(provider),
        assistant,
        config: Arc::new(config),
    })
}

async fn identity_provider(
    config: &Config,
    repo: Repository,
) -> Result<Arc<dyn IdentityProvider>, AppError> {
    let sessions = Arc::new(SessionRegistry::new(config.session_ttl));

    let provider: Arc<dyn IdentityProvider> = match config.auth_mode {
        AuthMode::Accounts => {
            let provider = AccountProvider::new(repo, sessions.clone());
            provider
                .bootstrap(config.admin_email.as_deref(), config.admin_password.as_deref())
                .await?;
            Arc::new(provider)
        }
        AuthMode::Static => {
            let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password)
            else {
                return Err(AppError::Config(
                    "Static auth requires CMS_ADMIN_EMAIL and CMS_ADMIN_PASSWORD".to_string(),
                ));
            };
            Arc::new(StaticProvider::new(email, password, sessions.clone()))
        }
        AuthMode::Open => {
            tracing::warn!("CMS_AUTH_MODE=open: the admin API is not protected!");
            return Ok(Arc::new(OpenProvider::new()));
        }
    };

    sessions.spawn_sweeper();
    tracing::info!(
        "Admin sessions expire after {}s",
        sessions.ttl().as_secs()
    );
    Ok(provider)
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guard = state.guard.clone();

    // Admin routes, session required
    let admin_routes = Router::new()
        .route("/content/{collection}", post(api::save_record))
        .route("/content/{collection}/{id}", delete(api::delete_record))
        .route("/site-info", put(api::save_site_info))
        .route(
            "/media",
            post(api::upload_media).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::require_admin(guard.clone(), req, next)
        }));

    // API routes
    let api_routes = Router::new()
        // Site content
        .route("/site-info", get(api::get_site_info))
        .route("/site-info/events", get(api::site_info_events))
        .route("/content/{collection}", get(api::get_collection))
        .route("/content/{collection}/events", get(api::collection_events))
        .route("/gallery/categories", get(api::get_gallery_categories))
        // Assistant
        .route("/assistant/status", get(api::assistant_status))
        .route("/assistant/chat", post(api::chat))
        // Session
        .route("/session/login", post(api::login))
        .route("/session/logout", post(api::logout))
        .route("/session/view", get(api::get_view))
        .route("/session/events", get(api::view_events))
        .nest("/admin", admin_routes);

    // Health check and uploaded media (no auth required)
    let media = ServeDir::new(&state.config.media_dir);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .nest_service("/media", media)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
