//! Outbound mail contract and the detached dispatch helper.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

impl OutgoingMail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, filename: impl Into<String>, content: Vec<u8>) -> Self {
        self.attachments.push(MailAttachment {
            filename: filename.into(),
            content,
        });
        self
    }
}

/// Provider acknowledgement for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailReceipt {
    pub id: Option<String>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport is not configured")]
    NotConfigured,
    #[error("recipient address `{0}` is not deliverable")]
    InvalidRecipient(String),
    #[error("mail provider rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt, MailError>;
}

/// Send `mail` on a background task. Failures are logged and never reach the caller.
pub fn dispatch_detached(
    transport: Arc<dyn MailTransport>,
    mail: OutgoingMail,
    purpose: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match transport.send(&mail).await {
            Ok(receipt) => info!(
                target = "eventhub::mailer",
                purpose,
                to = %mail.to,
                receipt = receipt.id.as_deref().unwrap_or("-"),
                "detached mail sent"
            ),
            Err(err) => warn!(
                target = "eventhub::mailer",
                purpose,
                to = %mail.to,
                error = %err,
                "detached mail failed"
            ),
        }
    })
}
