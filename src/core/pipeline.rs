use crate::core::message::create_message;
use crate::core::normalize::{normalize_applications, revalidate};
use crate::domain::model::{
    ApplicationRecord, RawRecord, SendOutcome, SendReport, SenderCredentials,
};
use crate::domain::ports::{ConfigProvider, MailConnector, MailTransport, Pipeline, Storage};
use crate::utils::error::{MailerError, Result};
use serde_json::Value;

/// Input location, relative to the storage root.
pub const APPLICATIONS_FILE: &str = "metadata/applications.json";

/// Parses the applications document and returns its `applications` array.
pub fn parse_applications(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let mut document: Value = serde_json::from_slice(bytes)?;

    let applications = document
        .get_mut("applications")
        .map(Value::take)
        .ok_or_else(|| MailerError::LoadError {
            message: "missing \"applications\" key".to_string(),
        })?;

    match applications {
        Value::Array(items) => Ok(items),
        other => Err(MailerError::LoadError {
            message: format!("\"applications\" must be an array, found {}", other),
        }),
    }
}

pub struct FollowUpPipeline<S: Storage, C: ConfigProvider, M: MailConnector> {
    storage: S,
    config: C,
    connector: M,
    credentials: SenderCredentials,
}

impl<S: Storage, C: ConfigProvider, M: MailConnector> FollowUpPipeline<S, C, M> {
    pub fn new(storage: S, config: C, connector: M, credentials: SenderCredentials) -> Self {
        Self {
            storage,
            config,
            connector,
            credentials,
        }
    }

    /// Sends one message per recipient over a single session.
    ///
    /// Only connection and authentication failures are returned as errors.
    /// Per-recipient failures are recorded in the report and the run
    /// continues. An opened session is closed exactly once.
    pub async fn send_all(
        &self,
        records: Vec<ApplicationRecord>,
        credentials: &SenderCredentials,
    ) -> Result<SendReport> {
        let records = revalidate(records);
        let total_targets = records.iter().map(ApplicationRecord::recipient_count).sum();
        let mut report = SendReport::new(total_targets);

        if self.config.dry_run() {
            tracing::warn!("🧪 DRY_RUN is ON: no emails will actually be sent.");
            self.send_each(&records, None, credentials, &mut report).await;
            report.log_summary();
            return Ok(report);
        }

        let mut transport = self
            .connector
            .connect(self.config.smtp_host(), self.config.smtp_port(), credentials)
            .await?;

        self.send_each(&records, Some(&mut transport), credentials, &mut report)
            .await;
        report.log_summary();

        tracing::info!("Closing SMTP connection …");
        match transport.close().await {
            Ok(()) => tracing::info!("SMTP connection closed."),
            Err(e) => tracing::warn!("Error while closing SMTP connection (ignored): {}", e),
        }

        Ok(report)
    }

    async fn send_each(
        &self,
        records: &[ApplicationRecord],
        mut transport: Option<&mut M::Transport>,
        credentials: &SenderCredentials,
        report: &mut SendReport,
    ) {
        let delay = self.config.rate_limit();
        let mut first = true;

        for record in records {
            tracing::info!(
                "=== Processing {} | Role: {} | {} recipient(s) ===",
                record.company,
                record.role,
                record.recipient_count()
            );

            for recipient in &record.emails {
                // 固定間隔限速，第一封之前不等待
                if !first && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                first = false;

                let outcome = self
                    .send_one(transport.as_deref_mut(), credentials, record, recipient)
                    .await;
                report.record(recipient, outcome);
            }
        }
    }

    async fn send_one(
        &self,
        transport: Option<&mut M::Transport>,
        credentials: &SenderCredentials,
        record: &ApplicationRecord,
        recipient: &str,
    ) -> SendOutcome {
        let message = create_message(
            &credentials.address,
            recipient,
            &record.company,
            &record.role,
            self.config.sender_name(),
        );

        tracing::info!(
            "Prepared message -> To: {} | Subject: {}",
            message.to,
            message.subject
        );
        tracing::info!(
            "Message-ID: {} | Date: {}",
            message.message_id,
            message.date_header()
        );
        tracing::debug!("Body preview:\n{:?}", message.body);

        let Some(transport) = transport else {
            tracing::info!("[DRY_RUN] Skipping actual send to {}", recipient);
            return SendOutcome::Simulated;
        };

        match transport.send(&message).await {
            Ok(()) => {
                tracing::info!("SENT ✅ -> {}", recipient);
                SendOutcome::Delivered
            }
            Err(error) => {
                if error.is_transport() {
                    tracing::error!("❌ SMTP error sending to {}: {}", recipient, error);
                } else {
                    tracing::error!("❌ Unexpected error sending to {}: {}", recipient, error);
                }
                SendOutcome::Failed(error)
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, M: MailConnector> Pipeline for FollowUpPipeline<S, C, M> {
    async fn extract(&self) -> Result<Vec<RawRecord>> {
        tracing::info!("📥 Loading applications from {}", APPLICATIONS_FILE);
        let bytes = self.storage.read_file(APPLICATIONS_FILE).await?;
        let raw = parse_applications(&bytes)?;
        tracing::info!("📊 Loaded {} raw application entries", raw.len());
        Ok(raw)
    }

    async fn transform(&self, data: Vec<RawRecord>) -> Result<Vec<ApplicationRecord>> {
        let records = normalize_applications(data);
        tracing::info!("🔧 {} valid application(s) after validation", records.len());
        Ok(records)
    }

    async fn load(&self, records: Vec<ApplicationRecord>) -> Result<SendReport> {
        self.send_all(records, &self.credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OutboundMessage;
    use crate::utils::error::DeliveryError;
    use crate::utils::logger::capture;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn with_applications(document: serde_json::Value) -> Self {
            let mut files = HashMap::new();
            files.insert(
                APPLICATIONS_FILE.to_string(),
                serde_json::to_vec(&document).unwrap(),
            );
            Self {
                files: Arc::new(Mutex::new(files)),
            }
        }

        fn with_raw(bytes: &[u8]) -> Self {
            let mut files = HashMap::new();
            files.insert(APPLICATIONS_FILE.to_string(), bytes.to_vec());
            Self {
                files: Arc::new(Mutex::new(files)),
            }
        }

        fn empty() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().unwrap();
            files.get(path).cloned().ok_or_else(|| {
                MailerError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }
    }

    struct MockConfig {
        dry_run: bool,
        rate_limit: Duration,
    }

    impl MockConfig {
        fn new(dry_run: bool) -> Self {
            Self {
                dry_run,
                rate_limit: Duration::ZERO,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn smtp_host(&self) -> &str {
            "smtp.test.invalid"
        }

        fn smtp_port(&self) -> u16 {
            465
        }

        fn rate_limit(&self) -> Duration {
            self.rate_limit
        }

        fn sender_name(&self) -> &str {
            "Test Sender"
        }

        fn dry_run(&self) -> bool {
            self.dry_run
        }
    }

    #[derive(Default)]
    struct Calls {
        connects: usize,
        closes: usize,
        sent: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct MockConnector {
        calls: Arc<Mutex<Calls>>,
        failures: HashMap<String, DeliveryError>,
        reject_login: bool,
        fail_close: bool,
    }

    impl MockConnector {
        fn failing_on(recipient: &str, error: DeliveryError) -> Self {
            let mut connector = Self::default();
            connector.failures.insert(recipient.to_string(), error);
            connector
        }

        fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
            self.calls.lock().unwrap()
        }
    }

    struct MockTransport {
        calls: Arc<Mutex<Calls>>,
        failures: HashMap<String, DeliveryError>,
        fail_close: bool,
    }

    #[async_trait]
    impl MailTransport for MockTransport {
        async fn send(
            &mut self,
            message: &OutboundMessage,
        ) -> std::result::Result<(), DeliveryError> {
            self.calls.lock().unwrap().sent.push(message.to.clone());
            match self.failures.get(&message.to) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().closes += 1;
            if self.fail_close {
                return Err(MailerError::ConnectionError {
                    message: "connection reset".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MailConnector for MockConnector {
        type Transport = MockTransport;

        async fn connect(
            &self,
            _host: &str,
            _port: u16,
            _credentials: &SenderCredentials,
        ) -> Result<MockTransport> {
            self.calls.lock().unwrap().connects += 1;
            if self.reject_login {
                return Err(MailerError::AuthenticationError {
                    message: "535 authentication failed".to_string(),
                });
            }
            Ok(MockTransport {
                calls: Arc::clone(&self.calls),
                failures: self.failures.clone(),
                fail_close: self.fail_close,
            })
        }
    }

    fn credentials() -> SenderCredentials {
        SenderCredentials::new("me@example.com", "app-password")
    }

    fn record(company: &str, emails: &[&str]) -> ApplicationRecord {
        ApplicationRecord {
            company: company.to_string(),
            role: "Engineer".to_string(),
            emails: emails.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn pipeline(
        config: MockConfig,
        connector: MockConnector,
    ) -> FollowUpPipeline<MockStorage, MockConfig, MockConnector> {
        FollowUpPipeline::new(MockStorage::empty(), config, connector, credentials())
    }

    #[tokio::test]
    async fn test_dry_run_simulates_every_recipient_without_connecting() {
        let connector = MockConnector::default();
        let pipeline = pipeline(MockConfig::new(true), connector.clone());

        let records = vec![
            record("Acme", &["a@acme.com", "b@acme.com"]),
            record("Globex", &["a@globex.com", "b@globex.com", "c@globex.com"]),
        ];
        let report = pipeline.send_all(records, &credentials()).await.unwrap();

        assert_eq!(report.total_targets, 5);
        assert_eq!(report.simulated_count, 5);
        assert_eq!(report.success_count, 0);
        assert!(report.failures.is_empty());

        let calls = connector.calls();
        assert_eq!(calls.connects, 0);
        assert_eq!(calls.closes, 0);
        assert!(calls.sent.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_logs_one_skip_line_per_recipient() {
        let (logs, _guard) = capture::capture();
        let pipeline = pipeline(MockConfig::new(true), MockConnector::default());

        let records = vec![
            record("Acme", &["a@acme.com", "b@acme.com"]),
            record("Globex", &["a@globex.com", "b@globex.com", "c@globex.com"]),
        ];
        pipeline.send_all(records, &credentials()).await.unwrap();

        let skipped = logs.matching("[DRY_RUN] Skipping actual send to");
        assert_eq!(skipped.len(), 5);
        assert!(skipped[0].ends_with("a@acme.com"));
        assert!(skipped[4].ends_with("c@globex.com"));
        assert_eq!(logs.matching("DRY_RUN is ON").len(), 1);
        assert_eq!(logs.matching("Total intended recipients: 5").len(), 1);
        assert_eq!(logs.matching("Simulated sends (dry run): 5").len(), 1);
        assert!(logs.matching("SENT").is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded_and_run_continues() {
        let connector =
            MockConnector::failing_on("b@acme.com", DeliveryError::transport("timed out"));
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let records = vec![record("Acme", &["a@acme.com", "b@acme.com", "c@acme.com"])];
        let report = pipeline.send_all(records, &credentials()).await.unwrap();

        assert_eq!(report.total_targets, 3);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].recipient, "b@acme.com");
        assert_eq!(report.failures[0].error, "SMTP error: timed out");

        let calls = connector.calls();
        assert_eq!(calls.connects, 1);
        assert_eq!(calls.sent.len(), 3);
        assert_eq!(calls.closes, 1);
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_recorded_like_transport_failure() {
        let connector = MockConnector::failing_on(
            "a@acme.com",
            DeliveryError::unexpected("Invalid to address"),
        );
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let records = vec![
            record("Acme", &["a@acme.com"]),
            record("Globex", &["ops@globex.com"]),
        ];
        let report = pipeline.send_all(records, &credentials()).await.unwrap();

        assert_eq!(report.success_count, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.starts_with("Unexpected error"));
        assert_eq!(connector.calls().closes, 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_aborts_run() {
        let connector = MockConnector {
            reject_login: true,
            ..MockConnector::default()
        };
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let result = pipeline
            .send_all(vec![record("Acme", &["a@acme.com"])], &credentials())
            .await;

        assert!(matches!(
            result,
            Err(MailerError::AuthenticationError { .. })
        ));
        let calls = connector.calls();
        assert_eq!(calls.connects, 1);
        assert!(calls.sent.is_empty());
    }

    #[tokio::test]
    async fn test_close_error_is_swallowed() {
        let connector = MockConnector {
            fail_close: true,
            ..MockConnector::default()
        };
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let report = pipeline
            .send_all(vec![record("Acme", &["a@acme.com"])], &credentials())
            .await
            .unwrap();

        assert_eq!(report.success_count, 1);
        assert_eq!(connector.calls().closes, 1);
    }

    #[tokio::test]
    async fn test_close_runs_once_even_when_every_send_fails() {
        let mut connector = MockConnector::default();
        for to in ["a@acme.com", "b@acme.com"] {
            connector
                .failures
                .insert(to.to_string(), DeliveryError::transport("connection reset"));
        }
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let report = pipeline
            .send_all(vec![record("Acme", &["a@acme.com", "b@acme.com"])], &credentials())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 2);
        assert_eq!(connector.calls().closes, 1);
    }

    #[tokio::test]
    async fn test_send_order_follows_records_then_sorted_recipients() {
        let connector = MockConnector::default();
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let records = vec![
            record("Zeta", &["z2@zeta.com", "z1@zeta.com"]),
            record("Alpha", &["a@alpha.com"]),
        ];
        pipeline.send_all(records, &credentials()).await.unwrap();

        assert_eq!(
            connector.calls().sent,
            vec!["z1@zeta.com", "z2@zeta.com", "a@alpha.com"]
        );
    }

    #[tokio::test]
    async fn test_invalid_records_are_revalidated_away() {
        let connector = MockConnector::default();
        let pipeline = pipeline(MockConfig::new(false), connector.clone());

        let records = vec![
            record("", &["a@acme.com"]),
            record("Globex", &["not-an-email", "ops@globex.com"]),
        ];
        let report = pipeline.send_all(records, &credentials()).await.unwrap();

        assert_eq!(report.total_targets, 1);
        assert_eq!(connector.calls().sent, vec!["ops@globex.com"]);
    }

    #[tokio::test]
    async fn test_rate_limit_between_sends() {
        let connector = MockConnector::default();
        let config = MockConfig {
            dry_run: true,
            rate_limit: Duration::from_millis(20),
        };
        let pipeline = pipeline(config, connector);

        let started = Instant::now();
        pipeline
            .send_all(
                vec![record("Acme", &["a@acme.com", "b@acme.com", "c@acme.com"])],
                &credentials(),
            )
            .await
            .unwrap();

        // 三封信之間有兩段間隔
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_extract_returns_applications_array() {
        let storage = MockStorage::with_applications(serde_json::json!({
            "applications": [
                {"company": "Acme", "role": "Engineer", "emails": "a@acme.com"},
                [{"company": "Globex", "role": "SRE", "emails": ["ops@globex.com"]}]
            ]
        }));
        let pipeline = FollowUpPipeline::new(
            storage,
            MockConfig::new(true),
            MockConnector::default(),
            credentials(),
        );

        let raw = pipeline.extract().await.unwrap();
        assert_eq!(raw.len(), 2);

        let records = pipeline.transform(raw).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].company, "Globex");
    }

    #[tokio::test]
    async fn test_extract_missing_key_is_load_error() {
        let storage = MockStorage::with_applications(serde_json::json!({"apps": []}));
        let pipeline = FollowUpPipeline::new(
            storage,
            MockConfig::new(true),
            MockConnector::default(),
            credentials(),
        );

        let result = pipeline.extract().await;
        assert!(matches!(result, Err(MailerError::LoadError { .. })));
    }

    #[tokio::test]
    async fn test_extract_malformed_json_is_serialization_error() {
        let storage = MockStorage::with_raw(b"{\"applications\": [");
        let pipeline = FollowUpPipeline::new(
            storage,
            MockConfig::new(true),
            MockConnector::default(),
            credentials(),
        );

        let result = pipeline.extract().await;
        assert!(matches!(result, Err(MailerError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_io_error() {
        let pipeline = pipeline(MockConfig::new(true), MockConnector::default());

        let result = pipeline.extract().await;
        assert!(matches!(result, Err(MailerError::IoError(_))));
    }

    #[test]
    fn test_parse_applications_rejects_non_array() {
        let result = parse_applications(br#"{"applications": {"company": "Acme"}}"#);
        assert!(matches!(result, Err(MailerError::LoadError { .. })));

        let result = parse_applications(b"[1, 2, 3]");
        assert!(matches!(result, Err(MailerError::LoadError { .. })));
    }
}
