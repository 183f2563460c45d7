//! Signup list endpoints.
//!
//! Registering inserts the address and enqueues a confirmation email; the
//! handler never renders or sends mail itself.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::db::{RecipientList, SubscriberStore};
use crate::queue::{enqueue_email, EmailQueue};
use crate::template::FRONTEND_URL_KEY;
use crate::web::response::ApiResponse;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<dyn EmailQueue>,
    pub store: Arc<dyn SubscriberStore>,
}

impl AppState {
    pub fn new(config: Config, queue: Arc<dyn EmailQueue>, store: Arc<dyn SubscriberStore>) -> Self {
        Self {
            config: Arc::new(config),
            queue,
            store,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Signup Lists
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
}

pub async fn register_launch(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResponse {
    register(&state, RecipientList::LaunchMails, payload).await
}

pub async fn count_launch(State(state): State<AppState>) -> ApiResponse {
    count(&state, RecipientList::LaunchMails).await
}

pub async fn register_newsletter(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResponse {
    register(&state, RecipientList::NewsletterMails, payload).await
}

pub async fn count_newsletter(State(state): State<AppState>) -> ApiResponse {
    count(&state, RecipientList::NewsletterMails).await
}

/// Confirmation email sent on signup to `list`.
fn confirmation(list: RecipientList, config: &Config) -> (String, &'static str, Map<String, Value>) {
    match list {
        RecipientList::LaunchMails => {
            let mut data = Map::new();
            data.insert(
                FRONTEND_URL_KEY.to_string(),
                Value::String(config.frontend_url.clone()),
            );
            (
                format!("{} Is Officially Live!", config.brand_name),
                "launch-email.hbs",
                data,
            )
        }
        RecipientList::NewsletterMails => (
            format!("Welcome to the {} Waitlist!", config.brand_name),
            "newsletter-confirmation.hbs",
            Map::new(),
        ),
    }
}

async fn register(
    state: &AppState,
    list: RecipientList,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResponse {
    let email = match payload {
        Ok(Json(request)) => request.email.trim().to_string(),
        Err(e) => {
            warn!(list = list.table(), error = %e, "signup_body_invalid");
            return ApiResponse::failure(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    if email.parse::<lettre::Address>().is_err() {
        warn!(list = list.table(), email = %email, "signup_email_invalid");
        return ApiResponse::failure(StatusCode::BAD_REQUEST, "Invalid email address");
    }

    match state.store.add_subscriber(list, &email).await {
        Ok(true) => {}
        Ok(false) => {
            info!(list = list.table(), email = %email, "signup_duplicate");
            return ApiResponse::failure(StatusCode::BAD_REQUEST, "Email already exists");
        }
        Err(e) => {
            error!(list = list.table(), error = %e, "signup_insert_failed");
            return ApiResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add email");
        }
    }

    let (subject, template, data) = confirmation(list, &state.config);
    if let Err(e) = enqueue_email(state.queue.as_ref(), &email, &subject, template, data).await {
        error!(list = list.table(), email = %email, error = %e, "signup_enqueue_failed");
        return ApiResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add email");
    }

    info!(list = list.table(), email = %email, "signup_registered");

    ApiResponse::success(StatusCode::OK, "Email added successfully")
}

async fn count(state: &AppState, list: RecipientList) -> ApiResponse {
    let label = list.table().replace('_', " ");

    match state.store.count_subscribers(list).await {
        Ok(n) => ApiResponse::success(StatusCode::OK, format!("Count of {}", label)).with_data(n),
        Err(e) => {
            error!(list = list.table(), error = %e, "signup_count_failed");
            ApiResponse::failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get count of {}", label),
            )
        }
    }
}
