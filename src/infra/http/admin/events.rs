use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::infra::http::error::{ApiError, event_to_api};
use crate::infra::http::models::{
    EventCreateRequest, EventListQuery, EventUpdateRequest, ShareLinkResponse,
};

use super::AdminState;

pub(super) async fn list_events(
    State(state): State<AdminState>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state
        .events
        .list(query.into())
        .await
        .map_err(event_to_api)?;
    Ok(Json(events))
}

pub(super) async fn create_event(
    State(state): State<AdminState>,
    Json(payload): Json<EventCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .events
        .create(payload.into())
        .await
        .map_err(event_to_api)?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub(super) async fn get_event(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.events.get(id).await.map_err(event_to_api)?;
    Ok(Json(event))
}

pub(super) async fn update_event(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .events
        .update(id, payload.into())
        .await
        .map_err(event_to_api)?;
    Ok(Json(event))
}

pub(super) async fn delete_event(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.events.delete(id).await.map_err(event_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn share_event(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.events.get(id).await.map_err(event_to_api)?;
    let link = state.events.share_link(id).await.map_err(event_to_api)?;
    Ok(Json(ShareLinkResponse {
        share_id: event.share_id,
        link,
    }))
}

pub(super) async fn list_participants(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let participants = state
        .events
        .participants(id)
        .await
        .map_err(event_to_api)?;
    Ok(Json(participants))
}
