//! Event invariants: titles, schedules, share tokens and certificate dates.

use time::{Date, OffsetDateTime, format_description::FormatItem, macros::format_description};
use uuid::Uuid;

use crate::domain::error::DomainError;

/// Length of the public token embedded in registration links.
pub const SHARE_ID_LEN: usize = 10;

const CERTIFICATE_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[weekday repr:short] [month repr:short] [day] [year]");

/// Generate a fresh public share token.
pub fn generate_share_id() -> String {
    Uuid::new_v4().simple().to_string()[..SHARE_ID_LEN].to_string()
}

pub fn normalize_title(title: &str) -> Result<String, DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub fn validate_schedule(start: OffsetDateTime, end: OffsetDateTime) -> Result<(), DomainError> {
    if end < start {
        return Err(DomainError::validation(
            "end_at",
            "must not be earlier than start_at",
        ));
    }
    Ok(())
}

/// Collapse blank optional text to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Date printed on certificates: the end date, falling back to the start date.
pub fn certificate_date(start: OffsetDateTime, end: Option<OffsetDateTime>) -> Date {
    end.unwrap_or(start).date()
}

/// Render a certificate date as e.g. `Fri Oct 16 2026`.
pub fn format_certificate_date(date: Date) -> String {
    date.format(CERTIFICATE_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}
