use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use time::Date;

use crate::domain::entities::{EventRecord, ParticipantRecord};
use crate::domain::events::certificate_date;

/// Everything needed to lay out one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub participant_name: String,
    pub event_title: String,
    pub date: Date,
    pub template_path: Option<PathBuf>,
    pub signature_path: Option<PathBuf>,
}

impl RenderRequest {
    pub fn for_participant(event: &EventRecord, participant: &ParticipantRecord) -> Self {
        Self {
            participant_name: participant.name.clone(),
            event_title: event.title.clone(),
            date: certificate_date(event.start_at, Some(event.end_at)),
            template_path: event.cert_template_path.as_ref().map(PathBuf::from),
            signature_path: event.signature_path.as_ref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode certificate document: {0}")]
    Encode(String),
    #[error("certificate render task failed: {0}")]
    Task(String),
}

/// Produces a single-page PDF certificate.
///
/// Unreadable template or signature images are not errors; the renderer falls back to the
/// built-in layout and skips the signature respectively.
#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError>;
}
