use crate::domain::model::SenderCredentials;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_required_field, Validate,
};
use clap::builder::FalseyValueParser;
use clap::Parser;
use std::time::Duration;

pub const MAX_RATE_LIMIT_SECONDS: f64 = 3600.0;

#[derive(Clone, Parser)]
#[command(name = "follow-up-mailer")]
#[command(about = "Send follow-up emails for job applications over SMTP/SSL")]
pub struct CliConfig {
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.mail.yahoo.com")]
    pub smtp_host: String,

    #[arg(long, env = "SMTP_PORT_SSL", default_value = "465")]
    pub smtp_port: u16,

    /// Fixed delay between consecutive sends
    #[arg(long, env = "RATE_LIMIT_SECONDS", default_value = "5.0")]
    pub rate_limit_seconds: f64,

    /// Display name used to sign the message body
    #[arg(long, env = "SENDER_NAME", default_value = "")]
    pub sender_name: String,

    #[arg(long, env = "EMAIL")]
    pub sender_email: Option<String>,

    #[arg(long, env = "APP_PASSWORD", hide_env_values = true)]
    pub app_password: Option<String>,

    /// Log the raw SMTP conversation
    #[arg(long, env = "SMTP_DEBUG", value_parser = FalseyValueParser::new())]
    pub smtp_debug: bool,

    /// Simulate sends without connecting to the server
    #[arg(long, env = "DRY_RUN", value_parser = FalseyValueParser::new())]
    pub dry_run: bool,

    /// Directory containing metadata/applications.json
    #[arg(long, env = "MAILER_BASE_DIR", default_value = ".")]
    pub base_dir: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

// 手動實作以避免密碼出現在日誌中
impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("rate_limit_seconds", &self.rate_limit_seconds)
            .field("sender_name", &self.sender_name)
            .field("sender_email", &self.sender_email)
            .field("app_password", &self.app_password.as_ref().map(|_| "[REDACTED]"))
            .field("smtp_debug", &self.smtp_debug)
            .field("dry_run", &self.dry_run)
            .field("base_dir", &self.base_dir)
            .field("verbose", &self.verbose)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl CliConfig {
    /// Sender address and credential. Both are required, even in dry run.
    pub fn credentials(&self) -> Result<SenderCredentials> {
        let address = validate_required_field("EMAIL", &self.sender_email)?;
        let password = validate_required_field("APP_PASSWORD", &self.app_password)?;
        validate_non_empty_string("EMAIL", address)?;
        validate_non_empty_string("APP_PASSWORD", password)?;

        Ok(SenderCredentials::new(address.trim(), password.as_str()))
    }
}

impl ConfigProvider for CliConfig {
    fn smtp_host(&self) -> &str {
        &self.smtp_host
    }

    fn smtp_port(&self) -> u16 {
        self.smtp_port
    }

    fn rate_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_seconds).unwrap_or(Duration::ZERO)
    }

    fn sender_name(&self) -> &str {
        &self.sender_name
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("smtp_host", &self.smtp_host)?;
        validate_range("smtp_port", self.smtp_port, 1, u16::MAX)?;
        validate_range(
            "rate_limit_seconds",
            self.rate_limit_seconds,
            0.0,
            MAX_RATE_LIMIT_SECONDS,
        )?;
        validate_path("base_dir", &self.base_dir)?;
        Ok(())
    }
}
