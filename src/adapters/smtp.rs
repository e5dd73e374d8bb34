//! SMTP-over-SSL delivery via `lettre`.
//!
//! One implicit-TLS connection is opened and authenticated per run and
//! reused for every recipient until the server drops it.

use crate::domain::model::{OutboundMessage, SenderCredentials};
use crate::domain::ports::{MailConnector, MailTransport};
use crate::utils::error::{DeliveryError, MailerError, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use secrecy::ExposeSecret;
use std::time::{Duration, SystemTime};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const AUTH_MECHANISMS: [Mechanism; 2] = [Mechanism::Plain, Mechanism::Login];

fn parse_mailbox(field: &str, address: &str) -> std::result::Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::unexpected(format!("Invalid {} address '{}': {}", field, address, e)))
}

/// Converts an [`OutboundMessage`] into a plain-text RFC 5322 message.
pub fn build_email(message: &OutboundMessage) -> std::result::Result<Message, DeliveryError> {
    let from = parse_mailbox("from", &message.from)?;
    let to = parse_mailbox("to", &message.to)?;

    Message::builder()
        .from(from)
        .to(to)
        .date(SystemTime::from(message.date))
        .message_id(Some(message.message_id.clone()))
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| DeliveryError::unexpected(format!("Failed to build email: {}", e)))
}

#[derive(Debug, Clone)]
pub struct SmtpConnector {
    timeout: Duration,
    hello_name: ClientId,
    implicit_tls: bool,
}

impl SmtpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            hello_name: ClientId::default(),
            implicit_tls: true,
        }
    }

    /// 本機測試伺服器不支援 TLS
    #[cfg(test)]
    fn plaintext() -> Self {
        Self {
            implicit_tls: false,
            ..Self::default()
        }
    }

    /// Opens a connection and logs in. A rejected login is an
    /// `AuthenticationError`; the connection is closed before returning it.
    async fn open(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<AsyncSmtpConnection> {
        let tls_parameters = if self.implicit_tls {
            tracing::info!("🔌 Connecting to {}:{} over SSL …", host, port);
            let parameters =
                TlsParameters::new(host.to_string()).map_err(|e| MailerError::ConnectionError {
                    message: format!("TLS parameters error: {}", e),
                })?;
            Some(parameters)
        } else {
            tracing::info!("🔌 Connecting to {}:{} without TLS …", host, port);
            None
        };

        let mut connection = AsyncSmtpConnection::connect_tokio1(
            (host, port),
            Some(self.timeout),
            &self.hello_name,
            tls_parameters,
            None,
        )
        .await
        .map_err(|e| MailerError::ConnectionError {
            message: format!("{}:{}: {}", host, port, e),
        })?;

        tracing::info!("Connected. Logging in …");
        if let Err(e) = connection.auth(&AUTH_MECHANISMS, credentials).await {
            // 登入失敗仍需關閉已建立的連線
            if let Err(quit_error) = connection.quit().await {
                tracing::debug!("QUIT after failed login also failed: {}", quit_error);
            }
            return Err(MailerError::AuthenticationError {
                message: e.to_string(),
            });
        }

        tracing::info!("✅ Login OK.");
        Ok(connection)
    }
}

impl Default for SmtpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl MailConnector for SmtpConnector {
    type Transport = SmtpSession;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: &SenderCredentials,
    ) -> Result<SmtpSession> {
        let credentials = Credentials::new(
            credentials.address.clone(),
            credentials.secret.expose_secret().to_string(),
        );
        let connection = self.open(host, port, &credentials).await?;

        Ok(SmtpSession {
            connector: self.clone(),
            host: host.to_string(),
            port,
            credentials,
            connection: Some(connection),
        })
    }
}

/// One logical session for a send run.
///
/// lettre drops the connection after any failed command (a refused
/// recipient included). The next `send` then logs in again on a fresh
/// connection, so later recipients are unaffected.
pub struct SmtpSession {
    connector: SmtpConnector,
    host: String,
    port: u16,
    credentials: Credentials,
    connection: Option<AsyncSmtpConnection>,
}

impl SmtpSession {
    async fn live_connection(
        &mut self,
    ) -> std::result::Result<&mut AsyncSmtpConnection, DeliveryError> {
        let connection = match self.connection.take() {
            Some(connection) if !connection.has_broken() => connection,
            _ => {
                tracing::info!("🔁 Reopening SMTP session to {}:{}", self.host, self.port);
                self.connector
                    .open(&self.host, self.port, &self.credentials)
                    .await
                    .map_err(|e| DeliveryError::transport(format!("reconnect failed: {}", e)))?
            }
        };
        Ok(self.connection.insert(connection))
    }
}

#[async_trait]
impl MailTransport for SmtpSession {
    async fn send(&mut self, message: &OutboundMessage) -> std::result::Result<(), DeliveryError> {
        let email = build_email(message)?;
        let connection = self.live_connection().await?;

        let result = connection.send(email.envelope(), &email.formatted()).await;
        if connection.has_broken() {
            tracing::debug!("SMTP connection dropped after sending to {}", message.to);
            self.connection = None;
        }

        let response = result.map_err(|e| DeliveryError::transport(e.to_string()))?;
        tracing::debug!("Server response for {}: {:?}", message.to, response.code());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        connection
            .quit()
            .await
            .map(|_| ())
            .map_err(|e| MailerError::ConnectionError {
                message: format!("QUIT failed: {}", e),
            })
    }
}
