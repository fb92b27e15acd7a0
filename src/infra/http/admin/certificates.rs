use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::infra::http::error::{ApiError, issue_to_api};
use crate::infra::http::models::{
    IssuanceResponse, SendBulkRequest, SendCertificatesRequest, SendSelectedRequest,
    issue_options,
};

use super::AdminState;

pub(super) async fn send_event_certificates(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<SendCertificatesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let force = payload.and_then(|Json(body)| body.force);
    let report = state
        .certificates
        .issue_for_event(id, issue_options(force))
        .await
        .map_err(issue_to_api)?;
    Ok(Json(IssuanceResponse::from(report)))
}

pub(super) async fn send_selected_certificates(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendSelectedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.participant_ids.is_empty() {
        return Err(ApiError::bad_request(
            "participant_ids must not be empty",
            None,
        ));
    }

    let summary = state
        .certificates
        .issue_for_selected(id, &payload.participant_ids, issue_options(payload.force))
        .await
        .map_err(issue_to_api)?;
    Ok(Json(summary))
}

pub(super) async fn send_bulk_certificates(
    State(state): State<AdminState>,
    Json(payload): Json<SendBulkRequest>,
) -> Result<Response, ApiError> {
    let options = issue_options(payload.force);
    match payload.participant_ids.filter(|ids| !ids.is_empty()) {
        Some(ids) => {
            let summary = state
                .certificates
                .issue_for_selected(payload.event_id, &ids, options)
                .await
                .map_err(issue_to_api)?;
            Ok(Json(summary).into_response())
        }
        None => {
            let report = state
                .certificates
                .issue_for_event(payload.event_id, options)
                .await
                .map_err(issue_to_api)?;
            Ok(Json(IssuanceResponse::from(report)).into_response())
        }
    }
}

pub(super) async fn send_participant_certificate(
    State(state): State<AdminState>,
    Path(participant_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let participant = state
        .certificates
        .issue_for_participant(participant_id)
        .await
        .map_err(issue_to_api)?;
    Ok(Json(participant))
}

pub(super) async fn preview_certificate(
    State(state): State<AdminState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let pdf = state
        .certificates
        .render_preview(participant_id)
        .await
        .map_err(issue_to_api)?;

    let mut response = pdf.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!(
        "inline; filename=\"certificate-{participant_id}.pdf\""
    )) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
