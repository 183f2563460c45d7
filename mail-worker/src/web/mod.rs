//! HTTP surface: health plus the launch and newsletter signup lists.

pub mod handlers;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    count_launch, count_newsletter, health, register_launch, register_newsletter, AppState,
    HealthResponse, RegisterRequest,
};
pub use response::ApiResponse;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/launch-mails/register", post(register_launch))
        .route("/api/v1/launch-mails/count", get(count_launch))
        .route("/api/v1/newsletter-mails/register", post(register_newsletter))
        .route("/api/v1/newsletter-mails/count", get(count_newsletter))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
