use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::certificates::render::{CertificateRenderer, RenderError, RenderRequest};
use crate::application::mailer::{MailError, MailTransport, OutgoingMail};
use crate::application::repos::{EventsRepo, ParticipantSelection, ParticipantsRepo, RepoError};
use crate::domain::entities::{EventRecord, ParticipantRecord};

const SOURCE: &str = "application::certificates";

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("event not found")]
    EventNotFound,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Dispatch(#[from] MailError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Controls whether participants already holding a certificate are mailed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueOptions {
    pub force: bool,
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self { force: true }
    }
}

impl IssueOptions {
    pub fn skip_sent() -> Self {
        Self { force: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueFailure {
    pub participant_id: Uuid,
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssuanceReport {
    pub sent: u64,
    pub failed: u64,
    pub total: u64,
    pub failures: Vec<IssueFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssuanceSummary {
    pub sent: u64,
    pub total: u64,
}

impl From<IssuanceReport> for IssuanceSummary {
    fn from(report: IssuanceReport) -> Self {
        Self {
            sent: report.sent,
            total: report.total,
        }
    }
}

/// Compose the certificate mail for one participant.
pub fn certificate_mail(
    event: &EventRecord,
    participant: &ParticipantRecord,
    pdf: Vec<u8>,
) -> OutgoingMail {
    let name = ammonia::clean_text(&participant.name);
    let title = ammonia::clean_text(&event.title);
    let html = format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h2 style=\"color: #1e40af;\">Certificate of Participation</h2>\
         <p>Dear {name},</p>\
         <p>Thank you for attending <strong>{title}</strong>. \
         Your certificate of participation is attached to this email.</p>\
         <p>Best regards,<br>The organizing team</p>\
         </div>"
    );

    OutgoingMail::new(
        participant.email.clone(),
        format!("Certificate - {}", event.title),
        html,
    )
    .with_attachment(format!("certificate-{}.pdf", participant.id), pdf)
}

/// Renders, mails and records certificates for event participants.
#[derive(Clone)]
pub struct CertificateService {
    events: Arc<dyn EventsRepo>,
    participants: Arc<dyn ParticipantsRepo>,
    renderer: Arc<dyn CertificateRenderer>,
    mailer: Arc<dyn MailTransport>,
}

impl CertificateService {
    pub fn new(
        events: Arc<dyn EventsRepo>,
        participants: Arc<dyn ParticipantsRepo>,
        renderer: Arc<dyn CertificateRenderer>,
        mailer: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            events,
            participants,
            renderer,
            mailer,
        }
    }

    /// Issue certificates to every participant of an event.
    ///
    /// Individual failures are collected in the report. The event is flagged as done only when
    /// at least one certificate went out.
    pub async fn issue_for_event(
        &self,
        event_id: Uuid,
        options: IssueOptions,
    ) -> Result<IssuanceReport, IssueError> {
        let event = self.load_event(event_id).await?;
        let selection = ParticipantSelection::all().unsent_only(!options.force);
        let participants = self.participants.list_for_event(event.id, &selection).await?;

        let report = self.issue_batch(&event, participants).await;

        if report.sent > 0 {
            if let Err(err) = self.events.mark_certificates_sent(event.id).await {
                error!(
                    target = SOURCE,
                    event_id = %event.id,
                    sent = report.sent,
                    failed = report.failed,
                    total = report.total,
                    error = %err,
                    "certificates delivered but event could not be flagged"
                );
                return Err(err.into());
            }
        }

        info!(
            target = SOURCE,
            event_id = %event.id,
            sent = report.sent,
            failed = report.failed,
            total = report.total,
            "event certificate run finished"
        );

        Ok(report)
    }

    /// Issue certificates to a chosen subset of an event's participants.
    ///
    /// Ids that do not belong to the event are ignored. The event flag is left untouched.
    pub async fn issue_for_selected(
        &self,
        event_id: Uuid,
        participant_ids: &[Uuid],
        options: IssueOptions,
    ) -> Result<IssuanceSummary, IssueError> {
        let event = self.load_event(event_id).await?;
        let selection =
            ParticipantSelection::only(participant_ids.to_vec()).unsent_only(!options.force);
        let participants = self.participants.list_for_event(event.id, &selection).await?;

        let report = self.issue_batch(&event, participants).await;

        info!(
            target = SOURCE,
            event_id = %event.id,
            requested = participant_ids.len(),
            sent = report.sent,
            total = report.total,
            "selected certificate run finished"
        );

        Ok(report.into())
    }

    /// Issue one certificate, propagating the first failure.
    pub async fn issue_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<ParticipantRecord, IssueError> {
        let (event, participant) = self.load_participant(participant_id).await?;
        match self.deliver(&event, &participant).await {
            Ok(updated) => {
                counter!("eventhub_certificates_sent_total").increment(1);
                Ok(updated)
            }
            Err(err) => {
                counter!("eventhub_certificates_failed_total").increment(1);
                Err(err)
            }
        }
    }

    /// Render a participant's certificate without mailing it.
    pub async fn render_preview(&self, participant_id: Uuid) -> Result<Vec<u8>, IssueError> {
        let (event, participant) = self.load_participant(participant_id).await?;
        self.render(&event, &participant).await
    }

    async fn issue_batch(
        &self,
        event: &EventRecord,
        participants: Vec<ParticipantRecord>,
    ) -> IssuanceReport {
        let mut report = IssuanceReport {
            total: participants.len() as u64,
            ..IssuanceReport::default()
        };

        for participant in participants {
            match self.deliver(event, &participant).await {
                Ok(_) => {
                    report.sent += 1;
                    counter!("eventhub_certificates_sent_total").increment(1);
                }
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        event_id = %event.id,
                        participant_id = %participant.id,
                        error = %err,
                        "certificate delivery failed"
                    );
                    counter!("eventhub_certificates_failed_total").increment(1);
                    report.failed += 1;
                    report.failures.push(IssueFailure {
                        participant_id: participant.id,
                        email: participant.email.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Render, send, then record. A participant only counts as sent once all three succeed.
    async fn deliver(
        &self,
        event: &EventRecord,
        participant: &ParticipantRecord,
    ) -> Result<ParticipantRecord, IssueError> {
        let pdf = self.render(event, participant).await?;
        let mail = certificate_mail(event, participant, pdf);
        self.mailer.send(&mail).await?;

        let updated = self
            .participants
            .mark_certificate_sent(participant.id, OffsetDateTime::now_utc())
            .await?;
        Ok(updated)
    }

    async fn render(
        &self,
        event: &EventRecord,
        participant: &ParticipantRecord,
    ) -> Result<Vec<u8>, IssueError> {
        let request = RenderRequest::for_participant(event, participant);
        let started = Instant::now();
        let pdf = self.renderer.render(&request).await?;
        histogram!("eventhub_certificate_render_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(pdf)
    }

    async fn load_event(&self, event_id: Uuid) -> Result<EventRecord, IssueError> {
        self.events
            .find_event(event_id)
            .await?
            .ok_or(IssueError::EventNotFound)
    }

    async fn load_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<(EventRecord, ParticipantRecord), IssueError> {
        let participant = self
            .participants
            .find_participant(participant_id)
            .await?
            .ok_or(IssueError::ParticipantNotFound)?;
        let event = self.load_event(participant.event_id).await?;
        Ok((event, participant))
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::types::{EventCategory, EventMode};

    fn event() -> EventRecord {
        EventRecord {
            id: Uuid::new_v4(),
            share_id: "abcdefghij".into(),
            title: "Rust <Meetup>".into(),
            description: None,
            category: EventCategory::Workshop,
            mode: EventMode::Offline,
            location: Some("Hall 3".into()),
            start_at: datetime!(2026-10-16 09:00 UTC),
            end_at: datetime!(2026-10-16 17:00 UTC),
            cert_template_path: None,
            signature_path: None,
            certificates_sent: false,
            created_at: datetime!(2026-10-01 00:00 UTC),
            updated_at: datetime!(2026-10-01 00:00 UTC),
        }
    }

    fn participant(event_id: Uuid) -> ParticipantRecord {
        ParticipantRecord {
            id: Uuid::new_v4(),
            event_id,
            name: "Ada & Co".into(),
            email: "ada@example.org".into(),
            phone: None,
            college: None,
            year_dept: None,
            certificate_sent: false,
            certificate_sent_at: None,
            created_at: datetime!(2026-10-02 00:00 UTC),
        }
    }

    #[test]
    fn certificate_mail_escapes_user_text() {
        let event = event();
        let participant = participant(event.id);
        let mail = certificate_mail(&event, &participant, b"%PDF".to_vec());

        assert_eq!(mail.to, "ada@example.org");
        assert_eq!(mail.subject, "Certificate - Rust <Meetup>");
        assert!(mail.html.contains("&amp;"));
        assert!(mail.html.contains("&lt;Meetup&gt;"));
        assert!(!mail.html.contains("<Meetup>"));
        assert_eq!(mail.attachments.len(), 1);
        assert_eq!(
            mail.attachments[0].filename,
            format!("certificate-{}.pdf", participant.id)
        );
    }

    #[test]
    fn options_default_to_resending() {
        assert!(IssueOptions::default().force);
        assert!(!IssueOptions::skip_sent().force);
    }
}
