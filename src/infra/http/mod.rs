mod admin;
mod error;
mod middleware;
mod models;
mod public;
mod rate_limit;

pub use admin::{AdminState, build_admin_router};
pub use error::{ApiError, ApiErrorBody, ApiErrorMessage};
pub use public::{PublicState, build_public_router};
pub use rate_limit::RateLimiter;

use crate::application::error::ErrorReport;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlx::Error as SqlxError;

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
