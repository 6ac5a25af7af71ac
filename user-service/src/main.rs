mod auth;
mod config;
mod handlers;
mod models;
mod services;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use shared::auth::{admin_middleware, auth_middleware, TokenService};
use shared::observability::{init_logging, LogConfig};
use shared::storage::{ObjectStore, R2Store};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::services::github::GithubClient;
use crate::services::session_store::{RedisSessionStore, SessionStore};
use crate::services::user_service::UserService;

const MB: usize = 1024 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub db_pool: sqlx::PgPool,
    pub user_service: UserService,
    pub sessions: Arc<dyn SessionStore>,
    pub store: Arc<dyn ObjectStore>,
    pub tokens: Arc<TokenService>,
    pub github: Option<GithubClient>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("user-service"))?;

    info!("Starting User Service...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let db_pool = shared::database::create_connection_pool(&config.database).await?;
    shared::database::migrate_database(&db_pool).await?;

    // Initialize Redis client for sessions
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis_client.get_connection_manager().await?;
    info!("Redis connection established");

    let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(redis_conn));
    let store: Arc<dyn ObjectStore> = Arc::new(R2Store::new(&config.storage));
    let tokens = Arc::new(TokenService::new(config.jwt.clone()));

    let github = match config.github.clone() {
        Some(github) => Some(GithubClient::new(github)?),
        None => {
            info!("GITHUB_ID/GITHUB_SECRET not set, GitHub login disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        user_service: UserService::new(db_pool.clone(), tokens.clone(), sessions.clone()),
        config: config.clone(),
        db_pool: db_pool.clone(),
        sessions,
        store,
        tokens,
        github,
    });

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("User Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shared::shutdown::shutdown_signal())
        .await?;

    shared::database::close_connections(&db_pool).await;
    info!("User Service shut down gracefully");

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let tokens = state.tokens.clone();
    let max_avatar_request = state.config.uploads.max_image_size + MB;

    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/auth/github", get(handlers::github::github_login))
        .route("/api/auth/github/callback", get(handlers::github::github_callback))
        .route("/api/users/:id", get(handlers::profile::get_user))
        .route("/api/contact", post(handlers::contact::submit_contact));

    let protected = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/session", get(handlers::auth::session))
        .route(
            "/api/user/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )
        .route("/api/user/uploads", get(handlers::favorites::list_uploads))
        .route("/api/user/downloads", get(handlers::favorites::list_downloads))
        .route("/api/user/favorites", get(handlers::favorites::list_favorites))
        .route(
            "/api/user/favorites/:file_id",
            post(handlers::favorites::add_favorite).delete(handlers::favorites::remove_favorite),
        )
        .route_layer(middleware::from_fn_with_state(tokens.clone(), auth_middleware));

    let avatar = Router::new()
        .route("/api/user/profile/avatar", post(handlers::profile::upload_avatar))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_avatar_request))
        .route_layer(middleware::from_fn_with_state(tokens.clone(), auth_middleware));

    let admin = Router::new()
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route("/api/admin/users/:id/role", put(handlers::admin::update_role))
        .route_layer(middleware::from_fn_with_state(tokens, admin_middleware));

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .merge(avatar)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
