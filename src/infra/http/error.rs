use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::certificates::IssueError;
use crate::application::error::ErrorReport;
use crate::application::events::EventServiceError;
use crate::application::registration::RegistrationError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const DUPLICATE: &str = "duplicate";
    pub const ALREADY_REGISTERED: &str = "already_registered";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const RENDER: &str = "render_error";
    pub const MAIL: &str = "mail_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: codes::RATE_LIMITED.to_string(),
                message: "Rate limit exceeded".to_string(),
                hint: Some(format!("Retry after {retry_after} seconds")),
            },
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message("infra::http::api", self.status, detail).attach(&mut response);
        response
    }
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::NotFound { .. } => ApiError::not_found("resource not found"),
        DomainError::Validation { .. } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Validation failed",
            Some(err.to_string()),
        ),
    }
}

pub(crate) fn event_to_api(err: EventServiceError) -> ApiError {
    match err {
        EventServiceError::NotFound => ApiError::not_found("Event not found"),
        EventServiceError::Domain(domain) => domain_to_api(domain),
        EventServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn issue_to_api(err: IssueError) -> ApiError {
    match err {
        IssueError::EventNotFound => ApiError::not_found("Event not found"),
        IssueError::ParticipantNotFound => ApiError::not_found("Participant not found"),
        IssueError::Render(render) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::RENDER,
            "Certificate rendering failed",
            Some(render.to_string()),
        ),
        IssueError::Dispatch(mail) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::MAIL,
            "Certificate email could not be sent",
            Some(mail.to_string()),
        ),
        IssueError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn registration_to_api(err: RegistrationError) -> ApiError {
    match err {
        RegistrationError::EventNotFound => ApiError::not_found("Event not found"),
        RegistrationError::AlreadyRegistered => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::ALREADY_REGISTERED,
            "You have already registered.",
            None,
        ),
        RegistrationError::Domain(domain) => domain_to_api(domain),
        RegistrationError::Repo(repo) => repo_to_api(repo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mailer::MailError;

    #[test]
    fn duplicate_registration_is_a_client_error() {
        let err = registration_to_api(RegistrationError::from(RepoError::Duplicate {
            constraint: "participants_event_email_key".into(),
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code, codes::ALREADY_REGISTERED);
    }

    #[test]
    fn single_send_mail_failures_map_to_bad_gateway() {
        let err = issue_to_api(IssueError::Dispatch(MailError::NotConfigured));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn error_responses_carry_a_report() {
        let response = ApiError::not_found("Event not found").into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.status, StatusCode::NOT_FOUND);
    }
}
