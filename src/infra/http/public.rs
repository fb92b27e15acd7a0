use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{application::registration::RegistrationService, infra::db::PostgresRepositories};

use super::{
    db_health_response,
    error::{ApiError, registration_to_api},
    middleware::{log_responses, registration_rate_limit, set_request_context},
    models::{RegisterRequest, RegisterResponse},
    rate_limit::RateLimiter,
};

#[derive(Clone)]
pub struct PublicState {
    pub db: Arc<PostgresRepositories>,
    pub registration: Arc<RegistrationService>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub fn build_public_router(state: PublicState) -> Router {
    let registration = Router::new()
        .route(
            "/api/participants/register/{share_id}",
            post(register_participant),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            registration_rate_limit,
        ));

    Router::new()
        .route("/_health", get(health))
        .route("/api/participants/public/{share_id}", get(public_event))
        .merge(registration)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health(State(state): State<PublicState>) -> Response {
    db_health_response(state.db.health_check().await)
}

async fn public_event(
    State(state): State<PublicState>,
    Path(share_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .registration
        .public_event(&share_id)
        .await
        .map_err(registration_to_api)?;
    Ok(Json(event))
}

async fn register_participant(
    State(state): State<PublicState>,
    Path(share_id): Path<String>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let participant = state
        .registration
        .register(&share_id, payload.into())
        .await
        .map_err(registration_to_api)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful",
            participant,
        }),
    ))
}
