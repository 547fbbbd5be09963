//! HTTP routes for the account API: health check, registration and login.
//!
//! `/api/registro` and the Portuguese field names (`nome`, `cpf`, `senha`)
//! are accepted alongside the English ones so older web clients keep working.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::accounts::{AccountError, AccountStore, NewAccount};

pub fn router(store: Arc<AccountStore>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/register", post(register))
        .route("/api/registro", post(register))
        .route("/api/login", post(login))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Every failure leaves the API as `{"message": ...}`.
#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Account(AccountError::InvalidInput(_) | AccountError::AlreadyRegistered) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Account(AccountError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Body(rejection) => rejection.status(),
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "chat room API is up",
    }))
}

async fn register(
    State(store): State<Arc<AccountStore>>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(new) = body.inspect_err(log_rejection)?;
    let profile = store.register(new).await?;
    info!(email = %profile.email, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "registration complete" })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default, alias = "senha")]
    password: String,
}

async fn login(
    State(store): State<Arc<AccountStore>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = body.inspect_err(log_rejection)?;
    if request.email.trim().is_empty() {
        return Err(AccountError::InvalidInput("email").into());
    }
    if request.password.is_empty() {
        return Err(AccountError::InvalidInput("password").into());
    }

    let profile = store.login(&request.email, &request.password).await?;
    info!(email = %profile.email, "login succeeded");
    // `nome` mirrors `name` for clients written against the older API.
    Ok(Json(json!({
        "message": "login succeeded",
        "user": {
            "name": profile.name,
            "nome": profile.name,
            "email": profile.email,
        },
    })))
}

fn log_rejection(rejection: &JsonRejection) {
    debug!(status = %rejection.status(), reason = %rejection.body_text(), "rejected request body");
}
