//! Request and response bodies for the JSON endpoints.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::certificates::{IssuanceReport, IssueFailure, IssueOptions};
use crate::application::events::{CreateEventCommand, EventFilter, UpdateEventCommand};
use crate::application::registration::RegisterCommand;
use crate::domain::entities::ParticipantRecord;
use crate::domain::types::{EventCategory, EventMode};

#[derive(Debug, Deserialize)]
pub struct EventCreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<EventCategory>,
    pub mode: EventMode,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    #[serde(default)]
    pub cert_template_path: Option<String>,
    #[serde(default)]
    pub signature_path: Option<String>,
}

impl From<EventCreateRequest> for CreateEventCommand {
    fn from(request: EventCreateRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            category: request.category,
            mode: request.mode,
            location: request.location,
            start_at: request.start_at,
            end_at: request.end_at,
            cert_template_path: request.cert_template_path,
            signature_path: request.signature_path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<EventCategory>,
    pub mode: Option<EventMode>,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
    pub cert_template_path: Option<String>,
    pub signature_path: Option<String>,
}

impl From<EventUpdateRequest> for UpdateEventCommand {
    fn from(request: EventUpdateRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            category: request.category,
            mode: request.mode,
            location: request.location,
            start_at: request.start_at,
            end_at: request.end_at,
            cert_template_path: request.cert_template_path,
            signature_path: request.signature_path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    pub mode: Option<EventMode>,
    pub category: Option<EventCategory>,
    pub search: Option<String>,
}

impl From<EventListQuery> for EventFilter {
    fn from(query: EventListQuery) -> Self {
        Self {
            mode: query.mode,
            category: query.category,
            search: query.search,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub share_id: String,
    pub link: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendCertificatesRequest {
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SendSelectedRequest {
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SendBulkRequest {
    pub event_id: Uuid,
    #[serde(default)]
    pub participant_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub force: Option<bool>,
}

pub fn issue_options(force: Option<bool>) -> IssueOptions {
    force.map_or_else(IssueOptions::default, |force| IssueOptions { force })
}

#[derive(Debug, Serialize)]
pub struct IssuanceResponse {
    pub sent: u64,
    pub failed: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IssueFailure>,
}

impl From<IssuanceReport> for IssuanceResponse {
    fn from(report: IssuanceReport) -> Self {
        Self {
            sent: report.sent,
            failed: report.failed,
            total: report.total,
            errors: report.failures,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub college: Option<String>,
    #[serde(default, alias = "yearDept")]
    pub year_dept: Option<String>,
}

impl From<RegisterRequest> for RegisterCommand {
    fn from(request: RegisterRequest) -> Self {
        Self {
            name: request.name,
            email: request.email,
            phone: request.phone,
            college: request.college,
            year_dept: request.year_dept,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub participant: ParticipantRecord,
}
