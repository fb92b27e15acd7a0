//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{EventRecord, ParticipantRecord};
use crate::domain::types::{EventCategory, EventMode};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateEventParams {
    pub share_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: EventCategory,
    pub mode: EventMode,
    pub location: Option<String>,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub cert_template_path: Option<String>,
    pub signature_path: Option<String>,
}

/// Full replacement of the administrator-editable columns of an event.
#[derive(Debug, Clone)]
pub struct UpdateEventParams {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: EventCategory,
    pub mode: EventMode,
    pub location: Option<String>,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub cert_template_path: Option<String>,
    pub signature_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventQueryFilter {
    pub mode: Option<EventMode>,
    pub category: Option<EventCategory>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventWithCount {
    #[serde(flatten)]
    pub event: EventRecord,
    pub participant_count: u64,
}

#[async_trait]
pub trait EventsRepo: Send + Sync {
    async fn create_event(&self, params: CreateEventParams) -> Result<EventRecord, RepoError>;

    async fn update_event(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError>;

    /// Delete an event together with its participants. Returns `false` when nothing matched.
    async fn delete_event(&self, id: Uuid) -> Result<bool, RepoError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError>;

    async fn find_by_share_id(&self, share_id: &str) -> Result<Option<EventRecord>, RepoError>;

    /// Newest first.
    async fn list_events(&self, filter: &EventQueryFilter)
    -> Result<Vec<EventWithCount>, RepoError>;

    /// Events whose `end_at` is strictly before `now` and whose certificates were not sent.
    async fn list_due_events(&self, now: OffsetDateTime) -> Result<Vec<EventRecord>, RepoError>;

    async fn mark_certificates_sent(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateParticipantParams {
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub year_dept: Option<String>,
}

/// Which participants of an event a query should return.
#[derive(Debug, Clone, Default)]
pub struct ParticipantSelection {
    /// Restrict to these ids; ids belonging to other events never match.
    pub ids: Option<Vec<Uuid>>,
    /// Skip participants already marked as having received a certificate.
    pub unsent_only: bool,
}

impl ParticipantSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Some(ids),
            unsent_only: false,
        }
    }

    pub fn unsent_only(mut self, unsent_only: bool) -> Self {
        self.unsent_only = unsent_only;
        self
    }

    pub fn matches(&self, participant: &ParticipantRecord) -> bool {
        let id_matches = self
            .ids
            .as_ref()
            .is_none_or(|ids| ids.contains(&participant.id));
        id_matches && !(self.unsent_only && participant.certificate_sent)
    }
}

#[async_trait]
pub trait ParticipantsRepo: Send + Sync {
    /// Fails with [`RepoError::Duplicate`] when the email is already registered for the event.
    async fn create_participant(
        &self,
        params: CreateParticipantParams,
    ) -> Result<ParticipantRecord, RepoError>;

    async fn find_participant(&self, id: Uuid) -> Result<Option<ParticipantRecord>, RepoError>;

    /// Ordered by registration time, oldest first.
    async fn list_for_event(
        &self,
        event_id: Uuid,
        selection: &ParticipantSelection,
    ) -> Result<Vec<ParticipantRecord>, RepoError>;

    /// Set `certificate_sent` and `certificate_sent_at` together.
    async fn mark_certificate_sent(
        &self,
        id: Uuid,
        sent_at: OffsetDateTime,
    ) -> Result<ParticipantRecord, RepoError>;
}
