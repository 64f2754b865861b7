//! Outbound mail collaborator
//!
//! The service only composes messages and hands them to a [`Mailer`];
//! delivery is a black box with its own success/failure contract. The
//! default implementation logs the message instead of sending it, which
//! is what development and tests want.

use askama::Template;
use async_trait::async_trait;

use crate::config::MailConfig;
use crate::domain::User;
use crate::error::Result;

/// A fully-composed message ready for delivery
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivery collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs outbound mail instead of delivering it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "outbound email (log-only mailer)"
        );
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "emails/welcome.html")]
struct WelcomeTemplate<'a> {
    first_name: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/password_reset.html")]
struct PasswordResetTemplate<'a> {
    first_name: &'a str,
    url: &'a str,
}

/// Message composer bound to the configured from-address
#[derive(Debug, Clone)]
pub struct EmailComposer {
    from: String,
}

impl EmailComposer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            from: config.from.clone(),
        }
    }

    pub fn welcome(&self, user: &User, url: &str) -> Result<EmailMessage> {
        let html = WelcomeTemplate {
            first_name: first_name(&user.name),
            url,
        }
        .render()?;
        Ok(self.message(
            user,
            "Welcome to the Trailhead family".to_string(),
            html,
        ))
    }

    pub fn password_reset(&self, user: &User, url: &str) -> Result<EmailMessage> {
        let html = PasswordResetTemplate {
            first_name: first_name(&user.name),
            url,
        }
        .render()?;
        Ok(self.message(
            user,
            "Your password reset token (valid for 10 minutes)".to_string(),
            html,
        ))
    }

    fn message(&self, user: &User, subject: String, html: String) -> EmailMessage {
        EmailMessage {
            to: user.email.clone(),
            from: self.from.clone(),
            subject,
            text: html_to_text(&html),
            html,
        }
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

/// Strip markup for the plain-text alternative body.
fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
