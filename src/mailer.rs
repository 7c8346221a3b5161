// src/mailer.rs

use crate::config::Config;
use crate::domain::ServiceRequest;
use crate::feed::StatusChange;
use maud::{html, Markup};
use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("API error: {0}")]
    ApiError(String),
}

/// Tells a customer their request now reads differently.
pub trait Notifier {
    fn status_changed(
        &self,
        request: &ServiceRequest,
        change: &StatusChange,
    ) -> Result<(), MailerError>;
}

/// Used when no email provider is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn status_changed(
        &self,
        request: &ServiceRequest,
        change: &StatusChange,
    ) -> Result<(), MailerError> {
        tracing::info!(
            request_id = %request.id,
            to = %request.customer.email,
            status = change.display.label,
            "status notification (not sent, no mailer configured)"
        );
        Ok(())
    }
}

pub struct BrevoMailer {
    api_key: String,
    sender_email: String,
    sender_name: String,
    client: Client,
}

#[derive(Serialize)]
struct BrevoSender<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct BrevoRecipient<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoPayload<'a> {
    sender: BrevoSender<'a>,
    to: Vec<BrevoRecipient<'a>>,
    subject: String,
    html_content: String,
}

impl BrevoMailer {
    pub fn new(api_key: String, sender_email: String, sender_name: String) -> Self {
        Self {
            api_key,
            sender_email,
            sender_name,
            client: Client::new(),
        }
    }

    fn payload<'a>(
        &'a self,
        request: &'a ServiceRequest,
        change: &StatusChange,
    ) -> BrevoPayload<'a> {
        let html_content = status_email(request, change.display.label).into_string();

        BrevoPayload {
            sender: BrevoSender {
                name: &self.sender_name,
                email: &self.sender_email,
            },
            to: vec![BrevoRecipient {
                email: &request.customer.email,
                name: &request.customer.name,
            }],
            subject: format!("Service request {}: {}", request.id, change.display.label),
            html_content,
        }
    }
}

impl Notifier for BrevoMailer {
    fn status_changed(
        &self,
        request: &ServiceRequest,
        change: &StatusChange,
    ) -> Result<(), MailerError> {
        let payload = self.payload(request, change);

        let resp = self
            .client
            .post(BREVO_SEND_URL)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .map_err(|e| MailerError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_body = resp.text().unwrap_or_else(|_| "(no body)".to_string());
            return Err(MailerError::ApiError(format!("{status} - {error_body}")));
        }

        tracing::info!(request_id = %request.id, to = %request.customer.email, "status email sent");
        Ok(())
    }
}

/// Body of the status email. Customer-supplied text is escaped by `html!`.
fn status_email(request: &ServiceRequest, label: &str) -> Markup {
    html! {
        h2 { "Your service request is now " (label) }
        p { "Hi " (request.customer.name) "," }
        p {
            "Request " strong { (request.id) } " changed status to " strong { (label) } "."
        }
        ul {
            @for item in &request.items {
                li {
                    (item.name) " x" (item.quantity) " (" (format_cents(item.line_total_cents())) ")"
                }
            }
        }
        p { "Total: " (format_cents(request.total_amount_cents)) }
    }
}

/// Brevo when an API key is configured, otherwise log only.
pub fn notifier_from_config(cfg: &Config) -> Box<dyn Notifier + Send> {
    match &cfg.brevo_api_key {
        Some(key) => Box::new(BrevoMailer::new(
            key.clone(),
            cfg.sender_email.clone(),
            cfg.sender_name.clone(),
        )),
        None => Box::new(LogNotifier),
    }
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{status_display, Customer, DerivedStatus, OrderItem, OrderStatus};
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn request() -> ServiceRequest {
        let now = Utc::now();
        ServiceRequest {
            id: "req_abc".into(),
            customer: Customer {
                user_id: 7,
                email: "asha@example.com".into(),
                name: "Asha".into(),
                address: "12 Lake Rd".into(),
                pincode: "560001".into(),
            },
            status: OrderStatus::Pending,
            available_providers: BTreeSet::new(),
            provider_responses: BTreeMap::new(),
            items: vec![OrderItem {
                service_type: "plumbing".into(),
                name: "Tap repair".into(),
                unit_price_cents: 1250,
                quantity: 2,
            }],
            total_amount_cents: 2500,
            created_at: now,
            updated_at: now,
            revision: 3,
        }
    }

    #[test]
    fn payload_matches_brevo_shape() {
        let mailer = BrevoMailer::new("k".into(), "from@x.com".into(), "ServiceMart".into());
        let req = request();
        let change = StatusChange {
            request_id: req.id.clone(),
            previous: Some(DerivedStatus::Pending),
            current: DerivedStatus::Accepted,
            display: status_display(DerivedStatus::Accepted),
            revision: 3,
        };

        let json = serde_json::to_value(mailer.payload(&req, &change)).unwrap();
        assert_eq!(json["sender"]["email"], "from@x.com");
        assert_eq!(json["to"][0]["email"], "asha@example.com");
        assert_eq!(json["subject"], "Service request req_abc: Accepted");
        let html = json["htmlContent"].as_str().unwrap();
        assert!(html.contains("Tap repair x2 (25.00)"));
        assert!(html.contains("Total: 25.00"));
    }

    #[test]
    fn customer_text_is_escaped_in_email_body() {
        let mailer = BrevoMailer::new("k".into(), "from@x.com".into(), "ServiceMart".into());
        let mut req = request();
        req.customer.name = "<script>alert(1)</script>".into();
        req.items[0].name = r#"<a href="https://evil.test">Fix</a>"#.into();
        let change = StatusChange {
            request_id: req.id.clone(),
            previous: Some(DerivedStatus::Pending),
            current: DerivedStatus::Accepted,
            display: status_display(DerivedStatus::Accepted),
            revision: 3,
        };

        let json = serde_json::to_value(mailer.payload(&req, &change)).unwrap();
        let html = json["htmlContent"].as_str().unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<a href"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&lt;a href="));
    }

    #[test]
    fn cents_format() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(105), "1.05");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn log_notifier_never_fails() {
        let req = request();
        let change = StatusChange {
            request_id: req.id.clone(),
            previous: None,
            current: DerivedStatus::Pending,
            display: status_display(DerivedStatus::Pending),
            revision: 3,
        };
        assert!(LogNotifier.status_changed(&req, &change).is_ok());
    }
}
