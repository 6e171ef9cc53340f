// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::json;
use tracing::info;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Mail service rejected the message with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Mail service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Sends mail through a transactional mail service's HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
    from: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(
        endpoint: Url,
        from: String,
        api_key: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            from,
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let mut body = json!({
            "sender": { "email": self.from },
            "to": [{ "email": email.to }],
            "subject": email.subject,
            "htmlContent": email.html,
        });
        if let Some(reply_to) = &email.reply_to {
            body["replyTo"] = json!({ "email": reply_to });
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }

        info!(subject = %email.subject, "Sent email");
        Ok(())
    }
}

/// Used when no mail service is configured: messages are written to the log instead.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "Mail service not configured, dropping email:\n{}",
            email.html
        );
        Ok(())
    }
}

/// Keeps every message it is asked to send. Can be switched into a failing mode.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Unavailable("mailer switched off".to_owned()));
        }
        self.sent.lock().push(email);
        Ok(())
    }
}

pub fn welcome(to: &str, first_name: &str) -> Email {
    Email {
        to: to.to_owned(),
        subject: "Welcome to Alcodemy Blog".to_owned(),
        html: format!(
            "<h2>Alcodemy Blog</h2><p>Hi {first_name}, <br> Thanks for joining our team of \
             Great Bloggers.</p>"
        ),
        reply_to: None,
    }
}

pub fn reset_password(to: &str, link: &str) -> Email {
    Email {
        to: to.to_owned(),
        subject: "Reset Password".to_owned(),
        html: format!(
            "You can reset your password by clicking <a href={link} target=\"_blank\">Reset \
             your password</a>.<br/><br/>If the above link does not work for some reason then \
             copy paste this link in new tab {link}.<br/><br/> If you have not requested this, \
             kindly ignore."
        ),
        reply_to: None,
    }
}

pub fn verify_account(to: &str, first_name: &str, link: &str) -> Email {
    Email {
        to: to.to_owned(),
        subject: "Verify account in Alcodemy Blog".to_owned(),
        html: format!(
            "<p>Hi {first_name},</p><p>Please confirm your email address by clicking \
             <a href={link} target=\"_blank\">Verify account</a>. The link is valid for 15 \
             minutes.</p><p>If the link does not work, paste this into a new tab: {link}</p>"
        ),
        reply_to: None,
    }
}

pub fn account_closed(to: &str, first_name: &str, support: &str) -> Email {
    Email {
        to: to.to_owned(),
        subject: "Your Account has been closed.".to_owned(),
        html: format!(
            "<p>Dear {first_name},</p><p>Your account on Alcodemy Blog has been closed. Logging \
             in again will reopen it.</p><p>If you have any questions, contact us at \
             <a href=\"mailto:{support}\">{support}</a>.</p><p>The Alcodemy Blog Team</p>"
        ),
        reply_to: None,
    }
}

pub fn contact(support: &str, name: &str, email: &str, subject: &str, message: &str) -> Email {
    Email {
        to: support.to_owned(),
        subject: format!("[Contact] {subject}"),
        html: format!("<p>From: {name} &lt;{email}&gt;</p><p>{message}</p>"),
        reply_to: Some(email.to_owned()),
    }
}
