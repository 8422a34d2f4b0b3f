use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::validation::ContactMessage;
use crate::{RelayConfig, RelayError};

/// Delivers a validated contact message to the site owner.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, message: &ContactMessage) -> Result<(), RelayError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.user.parse()?,
            to: config.target.parse()?,
        })
    }
}

pub fn compose(message: &ContactMessage, from: Mailbox, to: Mailbox) -> Result<Message, RelayError> {
    Ok(Message::builder()
        .from(from)
        .reply_to(message.email.parse()?)
        .to(to)
        .subject(format!("New message from {}", message.name))
        .header(ContentType::TEXT_PLAIN)
        .body(message.message.clone())?)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &ContactMessage) -> Result<(), RelayError> {
        let email = compose(message, self.from.clone(), self.to.clone())?;
        self.transport.send(email).await?;
        log::info!("Relayed message from {}", message.email);
        Ok(())
    }
}
