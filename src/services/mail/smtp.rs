use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Email, Mailer};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers through an SMTP server, upgrading with STARTTLS when `use_tls`
/// is set.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(
        server: &str,
        port: u16,
        use_tls: bool,
        username: String,
        password: String,
    ) -> anyhow::Result<Self> {
        let builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
                .with_context(|| format!("invalid SMTP relay host: {server}"))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
        };
        let mut builder = builder.port(port).timeout(Some(SEND_TIMEOUT));

        if !username.is_empty() {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn build_message(email: &Email) -> anyhow::Result<Message> {
    let from: Mailbox = email
        .from
        .parse()
        .with_context(|| format!("invalid sender address: {:?}", email.from))?;

    let mut builder = Message::builder()
        .from(from)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN);
    for to in &email.to {
        let mailbox: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient address: {to:?}"))?;
        builder = builder.to(mailbox);
    }

    builder
        .body(email.text.clone())
        .context("failed to build email message")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let message = build_message(email)?;
        self.transport
            .send(message)
            .await
            .context("SMTP server rejected message")?;
        Ok(())
    }
}
