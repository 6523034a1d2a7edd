use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AppError, AppResult};

const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> AppResult<()>;
}

/// Send without waiting; failures only reach the log.
pub fn send_in_background(mailer: Arc<dyn Mailer>, message: EmailMessage) {
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(err) = mailer.send(message).await {
            tracing::warn!(error = %err, to = %to, "email delivery failed");
        }
    });
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
}

impl ResendMailer {
    pub fn new(client: reqwest::Client, api_key: Option<String>, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(to = %message.to, subject = %message.subject, "email disabled, dropping message");
            return Ok(());
        };

        let payload = ResendPayload {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };
        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("email request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("email API returned {status}: {body}")));
        }
        tracing::debug!(to = %message.to, "email sent");
        Ok(())
    }
}

pub mod templates {
    use super::EmailMessage;
    use crate::order_status::OrderStatus;

    pub fn order_status_changed(
        to: &str,
        order_number: &str,
        status: OrderStatus,
        note: Option<&str>,
    ) -> EmailMessage {
        let note_html = note
            .map(|n| format!("<p>Note from your florist: {}</p>", escape(n)))
            .unwrap_or_default();
        EmailMessage {
            to: to.to_string(),
            subject: format!("Order {order_number}: {}", status.label()),
            html: format!(
                "<h2>Your order has been updated</h2>\
                 <p>Order <strong>{order_number}</strong> is now <strong>{}</strong>.</p>{note_html}",
                status.label()
            ),
        }
    }

    pub fn florist_welcome(to: &str, store_name: &str, temporary_password: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Your florist account is ready".to_string(),
            html: format!(
                "<h2>Welcome, {}!</h2>\
                 <p>Your store account has been created. Sign in with this email and the \
                 temporary password <code>{}</code>, then change it from your dashboard.</p>",
                escape(store_name),
                escape(temporary_password)
            ),
        }
    }

    pub fn application_rejected(to: &str, reason: Option<&str>, reapply_note: &str) -> EmailMessage {
        let reason_html = reason
            .map(|r| format!("<p>Reason: {}</p>", escape(r)))
            .unwrap_or_default();
        EmailMessage {
            to: to.to_string(),
            subject: "Update on your florist application".to_string(),
            html: format!(
                "<p>Thank you for applying. We are unable to approve your application at this time.</p>\
                 {reason_html}<p>{}</p>",
                escape(reapply_note)
            ),
        }
    }

    pub fn escape(input: &str) -> String {
        input
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }
}

#[cfg(test)]
mod tests {
    use super::templates;
    use crate::order_status::OrderStatus;

    #[test]
    fn status_email_uses_label_and_escapes_note() {
        let message = templates::order_status_changed(
            "a@b.test",
            "ORD-1",
            OrderStatus::OutForDelivery,
            Some("<b>soon</b>"),
        );
        assert_eq!(message.subject, "Order ORD-1: Out for delivery");
        assert!(message.html.contains("&lt;b&gt;soon&lt;/b&gt;"));
        assert!(!message.html.contains("<b>soon"));
    }
}
