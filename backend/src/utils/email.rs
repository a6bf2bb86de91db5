use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

impl OutgoingEmail {
    pub fn html(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            cc: None,
            subject: subject.into(),
            html_body: body.into(),
            attachment: None,
        }
    }
}

/// Outbound mail seam. Production uses SMTP; tests substitute a recorder.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    skip_send: bool,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = if config.username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
                .port(config.port)
                .credentials(creds)
                .build()
        };

        let from = config
            .from_address
            .parse()
            .with_context(|| format!("Invalid SMTP__FROM_ADDRESS '{}'", config.from_address))?;

        Ok(Self {
            transport,
            from,
            skip_send: config.skip_send,
        })
    }

    fn build_message(&self, email: OutgoingEmail) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject);
        if let Some(cc) = email.cc.as_deref().filter(|cc| !cc.trim().is_empty()) {
            builder = builder.cc(cc.parse()?);
        }

        let message = match email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::html(email.html_body))
                        .singlepart(
                            Attachment::new(attachment.filename)
                                .body(attachment.bytes, content_type),
                        ),
                )?
            }
            None => builder.header(ContentType::TEXT_HTML).body(email.html_body)?,
        };
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let to = email.to.clone();
        let subject = email.subject.clone();
        let message = self.build_message(email)?;
        if self.skip_send {
            tracing::info!(to = %to, subject = %subject, "SMTP sending disabled; email skipped");
            return Ok(());
        }
        self.transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send email to {}", to))?;
        tracing::debug!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

/// Minimal HTML escaping for user-provided values placed in email and view markup.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from_address: "Invoices <invoices@example.com>".into(),
            invoice_cc: None,
            skip_send: true,
        }
    }

    #[tokio::test]
    async fn skip_send_builds_but_does_not_deliver() {
        let mailer = SmtpMailer::new(&smtp_config()).expect("mailer");
        let mut email = OutgoingEmail::html("client@example.com", "Invoice 001", "<p>hi</p>");
        email.cc = Some("office@example.com".into());
        email.attachment = Some(EmailAttachment {
            filename: "001.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF-1.3".to_vec(),
        });
        mailer.send(email).await.expect("skipped send succeeds");
    }

    #[tokio::test]
    async fn invalid_recipient_is_an_error() {
        let mailer = SmtpMailer::new(&smtp_config()).expect("mailer");
        let email = OutgoingEmail::html("not an address", "s", "b");
        assert!(mailer.send(email).await.is_err());
    }

    #[test]
    fn escape_html_neutralises_markup() {
        assert_eq!(
            escape_html("<b>\"Tom & Jerry's\"</b>"),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;"
        );
    }
}
