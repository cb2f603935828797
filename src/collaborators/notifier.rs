//! `Notifier`: deliver an alert batch over webhook or email (spec §6).
//! `ReqwestNotifier` reuses the pooled HTTP client; `LettreNotifier` sends
//! mail via `lettre`'s SMTP transport, configured from `kernel::config::SmtpConfig`.

use async_trait::async_trait;
use kernel::config::{SmtpConfig, WebhookConfig};
use kernel::error::ErrorKind;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_webhook(&self, payload: Value) -> Result<(), ErrorKind>;
    async fn send_email(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<(), ErrorKind>;
}

/// Posts the alert payload as JSON to a configured webhook URL (Slack-style
/// incoming webhook), reusing the pooled client from `kernel::client`.
pub struct ReqwestNotifier {
    webhook: Option<WebhookConfig>,
    client: reqwest::Client,
}

impl ReqwestNotifier {
    pub fn new(webhook: Option<WebhookConfig>) -> Self {
        let client = match &webhook {
            Some(cfg) => kernel::client::get_http_client(&cfg.url),
            None => reqwest::Client::new(),
        };
        Self { webhook, client }
    }
}

#[async_trait]
impl Notifier for ReqwestNotifier {
    async fn send_webhook(&self, payload: Value) -> Result<(), ErrorKind> {
        let webhook = self
            .webhook
            .as_ref()
            .ok_or_else(|| ErrorKind::Fatal("no webhook configured".into()))?;

        let response = self
            .client
            .post(&webhook.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ErrorKind::Transient(format!("send_webhook: {e}")))?;

        if response.status() == 429 || response.status().is_server_error() {
            return Err(ErrorKind::Transient(format!(
                "send_webhook: upstream responded {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(ErrorKind::Fatal(format!(
                "send_webhook: upstream responded {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn send_email(&self, _to: &str, _subject: &str, _html: &str, _text: &str) -> Result<(), ErrorKind> {
        Err(ErrorKind::Unsupported("send_email on ReqwestNotifier"))
    }
}

/// Sends alert emails over SMTP via `lettre`. HTML bodies are sent
/// alongside a plain-text alternative; the caller is responsible for
/// escaping any untrusted content before it reaches `html`.
pub struct LettreNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl LettreNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, ErrorKind> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ErrorKind::Fatal(format!("smtp relay setup: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

fn validate_recipient(to: &str) -> Result<(), ErrorKind> {
    if to.contains('@') && !to.trim().is_empty() {
        Ok(())
    } else {
        Err(ErrorKind::InvalidParams(format!("invalid recipient address: {to}")))
    }
}

#[async_trait]
impl Notifier for LettreNotifier {
    async fn send_webhook(&self, _payload: Value) -> Result<(), ErrorKind> {
        Err(ErrorKind::Unsupported("send_webhook on LettreNotifier"))
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<(), ErrorKind> {
        validate_recipient(to)?;

        let email = Message::builder()
            .from(self.from_address.parse().map_err(|e| ErrorKind::Fatal(format!("from address: {e}")))?)
            .to(to.parse().map_err(|e| ErrorKind::InvalidParams(format!("to address: {e}")))?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .map_err(|e| ErrorKind::Fatal(format!("building email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| ErrorKind::Transient(format!("send_email: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_address_without_at_sign() {
        assert!(validate_recipient("not-an-email").is_err());
    }

    #[test]
    fn accepts_well_formed_address() {
        assert!(validate_recipient("ops@example.com").is_ok());
    }

    #[tokio::test]
    async fn reqwest_notifier_without_webhook_fails_fast() {
        let notifier = ReqwestNotifier::new(None);
        let err = notifier.send_webhook(serde_json::json!({"text": "hi"})).await.unwrap_err();
        assert!(matches!(err, ErrorKind::Fatal(_)));
    }
}
