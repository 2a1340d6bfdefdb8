//! REST backend for accounts, groups and CP sync.
//!
//! # Responsibility
//! - Wire core services to axum routes under `/api`.
//! - Translate core errors into HTTP statuses.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use log::warn;
use tower_http::cors::{Any, CorsLayer};

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Full application router.
pub fn app(state: AppState, cors_origin: Option<&str>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health))
        .nest("/api/auth", routes::auth::router())
        .nest("/api/groups", routes::groups::router())
        .nest("/api/users", routes::users::router())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

/// Allows one configured origin, or any origin when unset.
pub fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!("event=cors_config module=server status=error origin_invalid=true");
            CorsLayer::permissive()
        }
    }
}
