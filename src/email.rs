use anyhow::Context;
use axum::async_trait;
use serde_json::json;
use tracing::{debug, error};

use crate::config::EmailConfig;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Mailer backed by the Resend HTTP API.
#[derive(Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let res = self
            .http
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .context("resend request")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(%status, body = %body, "resend rejected email");
            anyhow::bail!("email provider responded with {}", status);
        }

        debug!(%to, "verification email dispatched");
        Ok(())
    }
}

pub fn render_verification_email(username: &str, verify_code: &str) -> String {
    format!(
        r#"<html lang="en">
  <body style="background-color:#f6f9fc;font-family:Roboto,Verdana,sans-serif;margin:0;padding:0;">
    <div style="max-width:600px;margin:20px auto;padding:20px;background-color:#ffffff;border-radius:10px;">
      <h1 style="color:#333;font-size:24px;text-align:center;">Email Verification</h1>
      <p style="color:#666;font-size:16px;line-height:24px;">
        Hello <strong>{username}</strong>, please enter the following verification code to confirm your email address.
      </p>
      <div style="background:#f8f9fa;padding:20px;border-radius:6px;margin:20px 0;text-align:center;">
        <p style="font-size:14px;color:#666;margin-bottom:10px;">Your verification code is:</p>
        <p style="font-size:32px;font-weight:bold;letter-spacing:8px;color:#007bff;margin:10px 0;">{verify_code}</p>
        <p style="font-size:12px;color:#666;">This code will expire in 60 minutes</p>
      </div>
      <hr style="border-top:1px solid #eaeaea;margin:20px 0;" />
      <p style="text-align:center;color:#666;font-size:12px;">
        If you didn't request this verification code, please ignore this email.
      </p>
    </div>
  </body>
</html>"#
    )
}

pub async fn send_verification_email(
    mailer: &dyn Mailer,
    email: &str,
    username: &str,
    verify_code: &str,
) -> anyhow::Result<()> {
    let html = render_verification_email(username, verify_code);
    mailer
        .send(email, "Whisperbox: Verification Code", &html)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_email_contains_code_and_username() {
        let html = render_verification_email("alice", "482913");
        assert!(html.contains("482913"));
        assert!(html.contains("alice"));
        assert!(html.contains("expire in 60 minutes"));
    }

    #[test]
    fn rendered_email_is_html() {
        let html = render_verification_email("bob", "123456");
        assert!(html.starts_with("<html"));
        assert!(html.contains("</html>"));
    }
}
