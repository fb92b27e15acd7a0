//! Resend-compatible transactional mail transport.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::mailer::{MailError, MailReceipt, MailTransport, OutgoingMail};
use crate::config::MailSettings;
use crate::infra::error::InfraError;

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct AttachmentPayload<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderError {
    message: Option<String>,
    name: Option<String>,
}

/// Posts messages to `{api_base}/emails` with a bearer API key.
#[derive(Debug, Clone)]
pub struct ResendTransport {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl ResendTransport {
    pub fn new(settings: &MailSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/emails", settings.api_base.as_str().trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            from: settings.from.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt, MailError> {
        let api_key = self.api_key.as_deref().ok_or(MailError::NotConfigured)?;

        let to = mail.to.trim();
        if to.is_empty() {
            return Err(MailError::InvalidRecipient(mail.to.clone()));
        }

        let payload = EmailPayload {
            from: &self.from,
            to: [to],
            subject: &mail.subject,
            html: &mail.html,
            attachments: mail
                .attachments
                .iter()
                .map(|attachment| AttachmentPayload {
                    filename: &attachment.filename,
                    content: STANDARD.encode(&attachment.content),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .ok()
                .and_then(|err| err.message.or(err.name))
                .unwrap_or(body);
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: SendResponse = response.json().await.unwrap_or_default();
        debug!(
            target = "eventhub::mail",
            to,
            id = receipt.id.as_deref().unwrap_or("-"),
            "mail accepted by provider"
        );

        Ok(MailReceipt { id: receipt.id })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    use super::*;

    fn settings(api_base: &str, api_key: Option<&str>) -> MailSettings {
        MailSettings {
            api_key: api_key.map(str::to_string),
            from: "certificates@example.org".into(),
            api_base: Url::parse(api_base).expect("api base"),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn posts_base64_attachments_with_bearer_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/emails")
                    .header("authorization", "Bearer re_test")
                    .json_body(json!({
                        "from": "certificates@example.org",
                        "to": ["ada@example.org"],
                        "subject": "Certificate - RustConf",
                        "html": "<p>hi</p>",
                        "attachments": [
                            { "filename": "certificate.pdf", "content": "JVBERg==" }
                        ]
                    }));
                then.status(200).json_body(json!({ "id": "msg_123" }));
            })
            .await;

        let transport =
            ResendTransport::new(&settings(&server.base_url(), Some("re_test"))).expect("client");
        let mail = OutgoingMail::new("ada@example.org", "Certificate - RustConf", "<p>hi</p>")
            .with_attachment("certificate.pdf", b"%PDF".to_vec());

        let receipt = transport.send(&mail).await.expect("accepted");

        mock.assert_async().await;
        assert_eq!(receipt.id.as_deref(), Some("msg_123"));
    }

    #[tokio::test]
    async fn provider_rejections_keep_status_and_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/emails");
                then.status(422).json_body(json!({
                    "name": "validation_error",
                    "message": "Invalid `to` field."
                }));
            })
            .await;

        let transport =
            ResendTransport::new(&settings(&server.base_url(), Some("re_test"))).expect("client");
        let err = transport
            .send(&OutgoingMail::new("ada@example.org", "s", "h"))
            .await
            .expect_err("rejected");

        match err {
            MailError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid `to` field.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let transport =
            ResendTransport::new(&settings("http://127.0.0.1:9", None)).expect("client");
        assert!(!transport.is_configured());

        let err = transport
            .send(&OutgoingMail::new("ada@example.org", "s", "h"))
            .await
            .expect_err("not configured");
        assert!(matches!(err, MailError::NotConfigured));
    }

    #[tokio::test]
    async fn blank_recipient_is_rejected_locally() {
        let transport =
            ResendTransport::new(&settings("http://127.0.0.1:9", Some("re_test"))).expect("client");
        let err = transport
            .send(&OutgoingMail::new("  ", "s", "h"))
            .await
            .expect_err("invalid recipient");
        assert!(matches!(err, MailError::InvalidRecipient(_)));
    }
}
