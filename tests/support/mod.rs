#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use eventhub::application::certificates::{
    CertificateRenderer, CertificateService, RenderError, RenderRequest,
};
use eventhub::application::mailer::{MailError, MailReceipt, MailTransport, OutgoingMail};
use eventhub::application::repos::{
    CreateEventParams, CreateParticipantParams, EventQueryFilter, EventWithCount, EventsRepo,
    ParticipantSelection, ParticipantsRepo, RepoError, UpdateEventParams,
};
use eventhub::domain::entities::{EventRecord, ParticipantRecord};
use eventhub::domain::types::{EventCategory, EventMode};

/// Events and participants held in memory, shared through both repository traits.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<EventRecord>>,
    participants: Mutex<Vec<ParticipantRecord>>,
    /// Events still reported as due after they were removed, to mimic a concurrent delete.
    stale_due: Mutex<Vec<EventRecord>>,
    /// When set, flagging an event as done fails with a database error.
    pub reject_event_flag: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn seed_event(&self, title: &str, end_at: OffsetDateTime) -> EventRecord {
        let record = EventRecord {
            id: Uuid::new_v4(),
            share_id: Uuid::new_v4().simple().to_string()[..10].to_string(),
            title: title.to_string(),
            description: None,
            category: EventCategory::Workshop,
            mode: EventMode::Offline,
            location: Some("Main hall".into()),
            start_at: end_at - Duration::hours(2),
            end_at,
            cert_template_path: None,
            signature_path: None,
            certificates_sent: false,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        self.events.lock().await.push(record.clone());
        record
    }

    pub async fn seed_participant(&self, event_id: Uuid, name: &str, email: &str) -> ParticipantRecord {
        let mut participants = self.participants.lock().await;
        let created_at = OffsetDateTime::now_utc() + Duration::milliseconds(participants.len() as i64);
        let record = ParticipantRecord {
            id: Uuid::new_v4(),
            event_id,
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            college: None,
            year_dept: None,
            certificate_sent: false,
            certificate_sent_at: None,
            created_at,
        };
        participants.push(record.clone());
        record
    }

    pub async fn event(&self, id: Uuid) -> Option<EventRecord> {
        self.events.lock().await.iter().find(|e| e.id == id).cloned()
    }

    pub async fn participant(&self, id: Uuid) -> Option<ParticipantRecord> {
        self.participants
            .lock()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn participants_of(&self, event_id: Uuid) -> Vec<ParticipantRecord> {
        self.participants
            .lock()
            .await
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Drop the event but keep returning it from `list_due_events`.
    pub async fn delete_behind_listing(&self, id: Uuid) {
        let mut events = self.events.lock().await;
        if let Some(position) = events.iter().position(|e| e.id == id) {
            let removed = events.remove(position);
            self.stale_due.lock().await.push(removed);
        }
        self.participants.lock().await.retain(|p| p.event_id != id);
    }
}

#[async_trait]
impl EventsRepo for MemoryStore {
    async fn create_event(&self, params: CreateEventParams) -> Result<EventRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = EventRecord {
            id: Uuid::new_v4(),
            share_id: params.share_id,
            title: params.title,
            description: params.description,
            category: params.category,
            mode: params.mode,
            location: params.location,
            start_at: params.start_at,
            end_at: params.end_at,
            cert_template_path: params.cert_template_path,
            signature_path: params.signature_path,
            certificates_sent: false,
            created_at: now,
            updated_at: now,
        };
        self.events.lock().await.push(record.clone());
        Ok(record)
    }

    async fn update_event(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError> {
        let mut events = self.events.lock().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == params.id)
            .ok_or(RepoError::NotFound)?;
        event.title = params.title;
        event.description = params.description;
        event.category = params.category;
        event.mode = params.mode;
        event.location = params.location;
        event.start_at = params.start_at;
        event.end_at = params.end_at;
        event.cert_template_path = params.cert_template_path;
        event.signature_path = params.signature_path;
        event.updated_at = OffsetDateTime::now_utc();
        Ok(event.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id != id);
        self.participants.lock().await.retain(|p| p.event_id != id);
        Ok(events.len() != before)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError> {
        Ok(self.event(id).await)
    }

    async fn find_by_share_id(&self, share_id: &str) -> Result<Option<EventRecord>, RepoError> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .find(|e| e.share_id == share_id)
            .cloned())
    }

    async fn list_events(
        &self,
        filter: &EventQueryFilter,
    ) -> Result<Vec<EventWithCount>, RepoError> {
        let events = self.events.lock().await.clone();
        let participants = self.participants.lock().await;
        let mut listed: Vec<EventWithCount> = events
            .into_iter()
            .filter(|e| filter.mode.is_none_or(|mode| e.mode == mode))
            .filter(|e| filter.category.is_none_or(|category| e.category == category))
            .filter(|e| {
                filter.search.as_deref().is_none_or(|search| {
                    e.title.to_lowercase().contains(&search.to_lowercase())
                })
            })
            .map(|event| EventWithCount {
                participant_count: participants
                    .iter()
                    .filter(|p| p.event_id == event.id)
                    .count() as u64,
                event,
            })
            .collect();
        listed.sort_by(|a, b| b.event.created_at.cmp(&a.event.created_at));
        Ok(listed)
    }

    async fn list_due_events(&self, now: OffsetDateTime) -> Result<Vec<EventRecord>, RepoError> {
        let mut due: Vec<EventRecord> = self.stale_due.lock().await.clone();
        due.extend(
            self.events
                .lock()
                .await
                .iter()
                .filter(|e| e.is_due(now))
                .cloned(),
        );
        due.sort_by_key(|e| e.end_at);
        Ok(due)
    }

    async fn mark_certificates_sent(&self, id: Uuid) -> Result<(), RepoError> {
        if self.reject_event_flag.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection reset"));
        }
        let mut events = self.events.lock().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(RepoError::NotFound)?;
        event.certificates_sent = true;
        Ok(())
    }
}

#[async_trait]
impl ParticipantsRepo for MemoryStore {
    async fn create_participant(
        &self,
        params: CreateParticipantParams,
    ) -> Result<ParticipantRecord, RepoError> {
        let mut participants = self.participants.lock().await;
        if participants
            .iter()
            .any(|p| p.event_id == params.event_id && p.email == params.email)
        {
            return Err(RepoError::Duplicate {
                constraint: "participants_event_email_key".into(),
            });
        }
        let record = ParticipantRecord {
            id: Uuid::new_v4(),
            event_id: params.event_id,
            name: params.name,
            email: params.email,
            phone: params.phone,
            college: params.college,
            year_dept: params.year_dept,
            certificate_sent: false,
            certificate_sent_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        participants.push(record.clone());
        Ok(record)
    }

    async fn find_participant(&self, id: Uuid) -> Result<Option<ParticipantRecord>, RepoError> {
        Ok(self.participant(id).await)
    }

    async fn list_for_event(
        &self,
        event_id: Uuid,
        selection: &ParticipantSelection,
    ) -> Result<Vec<ParticipantRecord>, RepoError> {
        let mut matched: Vec<ParticipantRecord> = self
            .participants
            .lock()
            .await
            .iter()
            .filter(|p| p.event_id == event_id && selection.matches(p))
            .cloned()
            .collect();
        matched.sort_by_key(|p| p.created_at);
        Ok(matched)
    }

    async fn mark_certificate_sent(
        &self,
        id: Uuid,
        sent_at: OffsetDateTime,
    ) -> Result<ParticipantRecord, RepoError> {
        let mut participants = self.participants.lock().await;
        let participant = participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound)?;
        participant.certificate_sent = true;
        participant.certificate_sent_at = Some(sent_at);
        Ok(participant.clone())
    }
}

/// Returns a fixed byte string and counts invocations.
#[derive(Default)]
pub struct StubRenderer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CertificateRenderer for StubRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("%PDF-stub {}", request.participant_name).into_bytes())
    }
}

/// Records delivered mail; recipients listed in `failing` are rejected.
#[derive(Default)]
pub struct RecordingMailer {
    failing: HashSet<String>,
    pub sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn failing_for(emails: &[&str]) -> Self {
        Self {
            failing: emails.iter().map(|email| email.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn recipients(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.to.clone()).collect()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt, MailError> {
        if self.failing.contains(&mail.to) {
            return Err(MailError::Rejected {
                status: 422,
                message: format!("mailbox {} unavailable", mail.to),
            });
        }
        self.sent.lock().await.push(mail.clone());
        Ok(MailReceipt {
            id: Some(Uuid::new_v4().to_string()),
        })
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub renderer: Arc<StubRenderer>,
    pub mailer: Arc<RecordingMailer>,
    pub certificates: Arc<CertificateService>,
}

impl Harness {
    pub fn new(mailer: RecordingMailer) -> Self {
        let store = MemoryStore::new();
        let renderer = Arc::new(StubRenderer::default());
        let mailer = Arc::new(mailer);
        let certificates = Arc::new(CertificateService::new(
            store.clone(),
            store.clone(),
            renderer.clone(),
            mailer.clone(),
        ));
        Self {
            store,
            renderer,
            mailer,
            certificates,
        }
    }
}

pub fn ended_hours_ago(hours: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() - Duration::hours(hours)
}
