//! HTTP surface: point reads, filtered visit reads, location averages and
//! the create/update endpoints that go through the write coordinator.

pub mod filters;
pub mod handlers;

use crate::consistency::WriteCoordinator;
use crate::core::DbError;
use crate::storage::EntityStore;
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Database(DbError),
    /// Request could not be read: bad JSON body or query parameter.
    Input(String),
}

pub type WebResult<T> = Result<T, WebError>;

impl From<DbError> for WebError {
    fn from(err: DbError) -> Self {
        WebError::Database(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Input(msg) | WebError::Database(DbError::Malformed(msg)) => {
                (StatusCode::BAD_REQUEST, msg, "malformed")
            }
            WebError::Database(DbError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg, "not_found"),
            WebError::Database(DbError::Integrity(msg)) => {
                (StatusCode::BAD_REQUEST, msg, "integrity")
            }
            WebError::Database(err) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.to_string(),
                    "database_error",
                )
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<WriteCoordinator>,
    /// Unix seconds age filters are measured against.
    pub now: i64,
}

impl AppState {
    pub fn new(coordinator: Arc<WriteCoordinator>, now: i64) -> Self {
        Self { coordinator, now }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        self.coordinator.store()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/users/:id", get(handlers::get_user).post(handlers::post_user))
        .route("/users/:id/visits", get(handlers::user_visits))
        .route(
            "/locations/:id",
            get(handlers::get_location).post(handlers::post_location),
        )
        .route("/locations/:id/avg", get(handlers::location_avg))
        .route("/visits/:id", get(handlers::get_visit).post(handlers::post_visit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
