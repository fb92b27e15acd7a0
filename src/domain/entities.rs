//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{EventCategory, EventMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub share_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: EventCategory,
    pub mode: EventMode,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    pub cert_template_path: Option<String>,
    pub signature_path: Option<String>,
    pub certificates_sent: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl EventRecord {
    /// Whether the automatic scan should pick this event up at `now`.
    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        self.end_at < now && !self.certificates_sent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub year_dept: Option<String>,
    pub certificate_sent: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub certificate_sent_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
