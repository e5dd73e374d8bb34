use crate::domain::model::{
    ApplicationRecord, OutboundMessage, RawRecord, SendReport, SenderCredentials,
};
use crate::utils::error::{DeliveryError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn smtp_host(&self) -> &str;
    fn smtp_port(&self) -> u16;
    fn rate_limit(&self) -> Duration;
    fn sender_name(&self) -> &str;
    fn dry_run(&self) -> bool;
}

/// An authenticated SMTP session, owned by one send run.
#[async_trait]
pub trait MailTransport: Send {
    async fn send(&mut self, message: &OutboundMessage) -> std::result::Result<(), DeliveryError>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens and authenticates a [`MailTransport`]. Authentication failure is an error.
#[async_trait]
pub trait MailConnector: Send + Sync {
    type Transport: MailTransport;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: &SenderCredentials,
    ) -> Result<Self::Transport>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawRecord>>;
    async fn transform(&self, data: Vec<RawRecord>) -> Result<Vec<ApplicationRecord>>;
    async fn load(&self, records: Vec<ApplicationRecord>) -> Result<SendReport>;
}
