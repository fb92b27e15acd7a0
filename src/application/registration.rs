//! Public registration through an event's share token.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::mailer::{MailTransport, OutgoingMail, dispatch_detached};
use crate::application::repos::{CreateParticipantParams, EventsRepo, ParticipantsRepo, RepoError};
use crate::domain::entities::{EventRecord, ParticipantRecord};
use crate::domain::error::DomainError;
use crate::domain::events::optional_text;
use crate::domain::participants::{normalize_email, normalize_name};
use crate::domain::types::{EventCategory, EventMode};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("event not found")]
    EventNotFound,
    #[error("You have already registered.")]
    AlreadyRegistered,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for RegistrationError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } => Self::AlreadyRegistered,
            other => Self::Repo(other),
        }
    }
}

/// Event fields visible to anyone holding the share link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicEventView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: EventCategory,
    pub mode: EventMode,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
}

impl From<EventRecord> for PublicEventView {
    fn from(event: EventRecord) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            category: event.category,
            mode: event.mode,
            location: event.location,
            start_at: event.start_at,
            end_at: event.end_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub year_dept: Option<String>,
}

pub fn confirmation_mail(event: &EventRecord, participant: &ParticipantRecord) -> OutgoingMail {
    let name = ammonia::clean_text(&participant.name);
    let title = ammonia::clean_text(&event.title);
    let html = format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h2 style=\"color: #1e40af;\">Registration confirmed</h2>\
         <p>Hi {name},</p>\
         <p>You are registered for <strong>{title}</strong>. \
         Your certificate will be emailed to you after the event.</p>\
         </div>"
    );
    OutgoingMail::new(
        participant.email.clone(),
        format!("Registration confirmed - {}", event.title),
        html,
    )
}

#[derive(Clone)]
pub struct RegistrationService {
    events: Arc<dyn EventsRepo>,
    participants: Arc<dyn ParticipantsRepo>,
    mailer: Arc<dyn MailTransport>,
}

impl RegistrationService {
    pub fn new(
        events: Arc<dyn EventsRepo>,
        participants: Arc<dyn ParticipantsRepo>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            events,
            participants,
            mailer,
        }
    }

    pub async fn public_event(&self, share_id: &str) -> Result<PublicEventView, RegistrationError> {
        self.load(share_id).await.map(PublicEventView::from)
    }

    /// Register a participant. The confirmation email goes out in the background.
    pub async fn register(
        &self,
        share_id: &str,
        command: RegisterCommand,
    ) -> Result<ParticipantRecord, RegistrationError> {
        let event = self.load(share_id).await?;
        let name = normalize_name(&command.name)?;
        let email = normalize_email(&command.email)?;

        let participant = self
            .participants
            .create_participant(CreateParticipantParams {
                event_id: event.id,
                name,
                email,
                phone: optional_text(command.phone),
                college: optional_text(command.college),
                year_dept: optional_text(command.year_dept),
            })
            .await?;

        counter!("eventhub_registrations_total").increment(1);
        info!(
            target = "eventhub::registration",
            event_id = %event.id,
            participant_id = %participant.id,
            "participant registered"
        );

        dispatch_detached(
            self.mailer.clone(),
            confirmation_mail(&event, &participant),
            "registration_confirmation",
        );

        Ok(participant)
    }

    async fn load(&self, share_id: &str) -> Result<EventRecord, RegistrationError> {
        self.events
            .find_by_share_id(share_id.trim())
            .await?
            .ok_or(RegistrationError::EventNotFound)
    }
}
