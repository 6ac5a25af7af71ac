mod config;
mod db;
mod handlers;
mod models;

use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use shared::auth::{admin_middleware, auth_middleware, TokenService};
use shared::observability::{init_logging, LogConfig};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;

/// Application state shared across handlers
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub tokens: Arc<TokenService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_logging(LogConfig::from_env("forum-service"))?;

    info!("Starting Forum Service...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let db_pool = shared::database::create_connection_pool(&config.database).await?;
    shared::database::migrate_database(&db_pool).await?;

    let state = Arc::new(AppState {
        tokens: Arc::new(TokenService::new(config.jwt.clone())),
        db_pool: db_pool.clone(),
    });

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Forum Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shared::shutdown::shutdown_signal())
        .await?;

    shared::database::close_connections(&db_pool).await;
    info!("Forum Service shut down gracefully");

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let tokens = state.tokens.clone();

    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/forum/categories", get(handlers::categories::list_categories))
        .route("/api/forum/topics", get(handlers::topics::list_topics))
        .route("/api/forum/topics/:id", get(handlers::topics::get_topic));

    let protected = Router::new()
        .route("/api/forum/topics", post(handlers::topics::create_topic))
        .route(
            "/api/forum/topics/:id/replies",
            post(handlers::topics::create_reply),
        )
        .route(
            "/api/forum/topics/:id",
            axum::routing::delete(handlers::topics::delete_topic),
        )
        .route_layer(middleware::from_fn_with_state(tokens.clone(), auth_middleware));

    let admin = Router::new()
        .route("/api/forum/topics/:id/pin", put(handlers::topics::set_pinned))
        .route_layer(middleware::from_fn_with_state(tokens, admin_middleware));

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
