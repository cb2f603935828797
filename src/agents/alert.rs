//! Alert agent: `send_slack`, `send_email` (spec §4.7). Delivery is
//! per-channel and independent: Slack failing does not block email, and
//! vice versa (spec §4.6 step 6: partial delivery counts as `partial`).

use crate::collaborators::notifier::Notifier;
use async_trait::async_trait;
use kernel::error::ErrorKind;
use kernel::retry::with_retry;
use kernel::skill::Skill;
use serde_json::{json, Value};
use std::sync::Arc;
use store::alert_store::AlertStore;

fn parse_batch_ref(params: &Value) -> Result<i64, ErrorKind> {
    match params.get("batch_ref") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ErrorKind::InvalidParams("batch_ref out of range".into())),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ErrorKind::InvalidParams(format!("invalid batch_ref: {s}"))),
        _ => Err(ErrorKind::InvalidParams("missing `batch_ref`".into())),
    }
}

pub struct SendSlackSkill {
    pub notifier: Arc<dyn Notifier>,
    pub alerts: AlertStore,
    pub retry: kernel::config::RetryConfig,
}

#[async_trait]
impl Skill for SendSlackSkill {
    fn name(&self) -> &str {
        "send_slack"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let batch_id = parse_batch_ref(&params)?;
        let items = self.alerts.items_for_batch(batch_id).await.map_err(ErrorKind::from)?;

        let payload = json!({
            "text": format!("{} new relevant items summarised", items.len()),
            "attachments": items.iter().map(|s| json!({"text": s.summary_text})).collect::<Vec<_>>(),
        });

        let notifier = self.notifier.clone();
        let payload_for_call = payload.clone();
        let outcome = with_retry(&self.retry, || {
            let notifier = notifier.clone();
            let payload = payload_for_call.clone();
            async move { notifier.send_webhook(payload).await }
        })
        .await;

        match outcome {
            Ok(()) => {
                self.alerts
                    .record_delivery(batch_id, "slack", "sent", None)
                    .await
                    .map_err(ErrorKind::from)?;
                Ok(json!({"delivered": true}))
            }
            Err(err) => {
                self.alerts
                    .record_delivery(batch_id, "slack", "failed", Some(&err.to_string()))
                    .await
                    .map_err(ErrorKind::from)?;
                Ok(json!({"delivered": false, "error": err.to_string()}))
            }
        }
    }
}

pub struct SendEmailSkill {
    pub notifier: Arc<dyn Notifier>,
    pub alerts: AlertStore,
    pub retry: kernel::config::RetryConfig,
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl Skill for SendEmailSkill {
    fn name(&self) -> &str {
        "send_email"
    }

    async fn call(&self, params: Value) -> Result<Value, ErrorKind> {
        let batch_id = parse_batch_ref(&params)?;
        let recipients: Vec<String> = params
            .get("recipients")
            .and_then(Value::as_array)
            .ok_or_else(|| ErrorKind::InvalidParams("missing `recipients`".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        for recipient in &recipients {
            if !recipient.contains('@') {
                return Err(ErrorKind::InvalidParams(format!("invalid recipient: {recipient}")));
            }
        }

        let items = self.alerts.items_for_batch(batch_id).await.map_err(ErrorKind::from)?;
        let subject = format!("{} relevant items found", items.len());
        let text = items
            .iter()
            .map(|s| s.summary_text.clone())
            .collect::<Vec<_>>()
            .join("\n\n");
        let html = format!(
            "<ul>{}</ul>",
            items
                .iter()
                .map(|s| format!("<li>{}</li>", escape_html(&s.summary_text)))
                .collect::<Vec<_>>()
                .join("")
        );
        let to = recipients.join(",");

        let notifier = self.notifier.clone();
        let outcome = with_retry(&self.retry, || {
            let notifier = notifier.clone();
            let to = to.clone();
            let subject = subject.clone();
            let html = html.clone();
            let text = text.clone();
            async move { notifier.send_email(&to, &subject, &html, &text).await }
        })
        .await;

        match outcome {
            Ok(()) => {
                self.alerts
                    .record_delivery(batch_id, "email", "sent", None)
                    .await
                    .map_err(ErrorKind::from)?;
                Ok(json!({"delivered": true}))
            }
            Err(err) => {
                self.alerts
                    .record_delivery(batch_id, "email", "failed", Some(&err.to_string()))
                    .await
                    .map_err(ErrorKind::from)?;
                Ok(json!({"delivered": false, "error": err.to_string()}))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_entities() {
        assert_eq!(escape_html("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}
