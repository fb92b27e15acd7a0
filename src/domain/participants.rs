//! Participant invariants applied at registration time.

use crate::domain::error::DomainError;

pub fn normalize_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trim and lower-case an address; `(email, event)` uniqueness is checked on this form.
pub fn normalize_email(email: &str) -> Result<String, DomainError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(DomainError::validation("email", "must not be empty"));
    }

    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => {
            return Err(DomainError::validation(
                "email",
                "must look like an address",
            ));
        }
    }

    if normalized.chars().any(char::is_whitespace) {
        return Err(DomainError::validation(
            "email",
            "must not contain whitespace",
        ));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(
            normalize_email("  Ada@Example.ORG ").as_deref(),
            Ok("ada@example.org")
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "ada", "@example.org", "ada@", "a da@example.org"] {
            assert!(normalize_email(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn names_must_not_be_blank() {
        assert!(normalize_name(" \t").is_err());
        assert_eq!(normalize_name(" Ada ").as_deref(), Ok("Ada"));
    }
}
