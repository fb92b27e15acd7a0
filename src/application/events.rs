//! Event administration.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::application::repos::{
    CreateEventParams, EventQueryFilter, EventWithCount, EventsRepo, ParticipantSelection,
    ParticipantsRepo, RepoError, UpdateEventParams,
};
use crate::domain::entities::{EventRecord, ParticipantRecord};
use crate::domain::error::DomainError;
use crate::domain::events::{generate_share_id, normalize_title, optional_text, validate_schedule};
use crate::domain::types::{EventCategory, EventMode};

#[derive(Debug, Error)]
pub enum EventServiceError {
    #[error("event not found")]
    NotFound,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateEventCommand {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<EventCategory>,
    pub mode: EventMode,
    pub location: Option<String>,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub cert_template_path: Option<String>,
    pub signature_path: Option<String>,
}

/// Partial update; `None` leaves the stored value alone.
///
/// Optional text columns take `Some(String::new())` to clear them.
#[derive(Debug, Clone, Default)]
pub struct UpdateEventCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<EventCategory>,
    pub mode: Option<EventMode>,
    pub location: Option<String>,
    pub start_at: Option<OffsetDateTime>,
    pub end_at: Option<OffsetDateTime>,
    pub cert_template_path: Option<String>,
    pub signature_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub mode: Option<EventMode>,
    pub category: Option<EventCategory>,
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventsRepo>,
    participants: Arc<dyn ParticipantsRepo>,
    frontend_url: Url,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventsRepo>,
        participants: Arc<dyn ParticipantsRepo>,
        frontend_url: Url,
    ) -> Self {
        Self {
            events,
            participants,
            frontend_url,
        }
    }

    pub async fn create(&self, command: CreateEventCommand) -> Result<EventRecord, EventServiceError> {
        let title = normalize_title(&command.title)?;
        validate_schedule(command.start_at, command.end_at)?;

        let record = self
            .events
            .create_event(CreateEventParams {
                share_id: generate_share_id(),
                title,
                description: optional_text(command.description),
                category: command.category.unwrap_or_default(),
                mode: command.mode,
                location: optional_text(command.location),
                start_at: command.start_at,
                end_at: command.end_at,
                cert_template_path: optional_text(command.cert_template_path),
                signature_path: optional_text(command.signature_path),
            })
            .await?;

        info!(
            target = "eventhub::events",
            event_id = %record.id,
            share_id = %record.share_id,
            "event created"
        );
        Ok(record)
    }

    pub async fn list(&self, filter: EventFilter) -> Result<Vec<EventWithCount>, EventServiceError> {
        let filter = EventQueryFilter {
            mode: filter.mode,
            category: filter.category,
            search: optional_text(filter.search),
        };
        Ok(self.events.list_events(&filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<EventRecord, EventServiceError> {
        self.events
            .find_event(id)
            .await?
            .ok_or(EventServiceError::NotFound)
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateEventCommand,
    ) -> Result<EventRecord, EventServiceError> {
        let current = self.get(id).await?;

        let title = match command.title {
            Some(title) => normalize_title(&title)?,
            None => current.title,
        };
        let start_at = command.start_at.unwrap_or(current.start_at);
        let end_at = command.end_at.unwrap_or(current.end_at);
        validate_schedule(start_at, end_at)?;

        let merge = |update: Option<String>, existing: Option<String>| match update {
            Some(value) => optional_text(Some(value)),
            None => existing,
        };

        let record = self
            .events
            .update_event(UpdateEventParams {
                id,
                title,
                description: merge(command.description, current.description),
                category: command.category.unwrap_or(current.category),
                mode: command.mode.unwrap_or(current.mode),
                location: merge(command.location, current.location),
                start_at,
                end_at,
                cert_template_path: merge(command.cert_template_path, current.cert_template_path),
                signature_path: merge(command.signature_path, current.signature_path),
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => EventServiceError::NotFound,
                other => EventServiceError::Repo(other),
            })?;

        info!(target = "eventhub::events", event_id = %id, "event updated");
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), EventServiceError> {
        if !self.events.delete_event(id).await? {
            return Err(EventServiceError::NotFound);
        }
        info!(target = "eventhub::events", event_id = %id, "event deleted");
        Ok(())
    }

    /// Public registration link for an event.
    pub async fn share_link(&self, id: Uuid) -> Result<String, EventServiceError> {
        let event = self.get(id).await?;
        Ok(registration_link(&self.frontend_url, &event.share_id))
    }

    pub async fn participants(&self, id: Uuid) -> Result<Vec<ParticipantRecord>, EventServiceError> {
        let event = self.get(id).await?;
        Ok(self
            .participants
            .list_for_event(event.id, &ParticipantSelection::all())
            .await?)
    }
}

pub fn registration_link(frontend_url: &Url, share_id: &str) -> String {
    format!(
        "{}/register/{share_id}",
        frontend_url.as_str().trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_link_ignores_trailing_slash() {
        let base = Url::parse("https://events.example.org/").expect("url");
        assert_eq!(
            registration_link(&base, "abc123defg"),
            "https://events.example.org/register/abc123defg"
        );

        let nested = Url::parse("https://example.org/hub").expect("url");
        assert_eq!(
            registration_link(&nested, "abc123defg"),
            "https://example.org/hub/register/abc123defg"
        );
    }
}
