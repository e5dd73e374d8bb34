use chrono::{DateTime, Local};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::utils::error::DeliveryError;

/// 輸入檔中的原始資料列，欄位可能缺漏或型別錯誤
pub type RawRecord = serde_json::Value;

/// A validated application: non-empty company and role, at least one
/// email-like recipient, recipients deduplicated and sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub company: String,
    pub role: String,
    pub emails: Vec<String>,
}

impl ApplicationRecord {
    pub fn recipient_count(&self) -> usize {
        self.emails.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub date: DateTime<Local>,
    pub message_id: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    /// RFC 2822 form of the local send time.
    pub fn date_header(&self) -> String {
        self.date.to_rfc2822()
    }
}

/// Sender address plus the credential used for SMTP AUTH.
#[derive(Debug, Clone)]
pub struct SenderCredentials {
    pub address: String,
    pub secret: SecretString,
}

impl SenderCredentials {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

/// 單次寄送的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Simulated,
    Failed(DeliveryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendFailure {
    pub recipient: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub total_targets: usize,
    pub success_count: usize,
    /// Dry-run sends. Kept apart from `success_count`, which only counts
    /// messages the server accepted.
    pub simulated_count: usize,
    pub failures: Vec<SendFailure>,
}

impl SendReport {
    pub fn new(total_targets: usize) -> Self {
        Self {
            total_targets,
            ..Self::default()
        }
    }

    pub fn record(&mut self, recipient: &str, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Delivered => self.success_count += 1,
            SendOutcome::Simulated => self.simulated_count += 1,
            SendOutcome::Failed(error) => self.failures.push(SendFailure {
                recipient: recipient.to_string(),
                error: error.to_string(),
            }),
        }
    }

    pub fn attempted(&self) -> usize {
        self.success_count + self.simulated_count + self.failures.len()
    }

    pub fn log_summary(&self) {
        tracing::info!("=== SEND SUMMARY ===");
        tracing::info!("Total intended recipients: {}", self.total_targets);
        tracing::info!("Successful sends:          {}", self.success_count);
        if self.simulated_count > 0 {
            tracing::info!("Simulated sends (dry run): {}", self.simulated_count);
        }
        tracing::info!("Failures:                  {}", self.failures.len());
        for failure in &self.failures {
            tracing::info!(" - {}: {}", failure.recipient, failure.error);
        }
    }
}
