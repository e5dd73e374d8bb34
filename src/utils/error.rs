use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Failed to load applications: {message}")]
    LoadError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("SMTP authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("SMTP connection failed: {message}")]
    ConnectionError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Authentication,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl MailerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IoError(_) | Self::SerializationError(_) | Self::LoadError { .. } => {
                ErrorCategory::Input
            }
            Self::MissingConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            Self::AuthenticationError { .. } => ErrorCategory::Authentication,
            Self::ConnectionError { .. } => ErrorCategory::Network,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Input => ErrorSeverity::Critical,
        }
    }

    /// Process exit status for a fatal error. Never zero.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::IoError(_) => "Check that metadata/applications.json exists and is readable",
            Self::SerializationError(_) => "Fix the JSON syntax in metadata/applications.json",
            Self::LoadError { .. } => {
                "The input file must be an object with an \"applications\" array"
            }
            Self::MissingConfigError { .. } => {
                "Set EMAIL and APP_PASSWORD in the environment (or pass --sender-email/--app-password)"
            }
            Self::InvalidConfigValueError { .. } => "Correct the configuration value and retry",
            Self::AuthenticationError { .. } => {
                "Verify the sender address and app password; most providers require an app-specific password"
            }
            Self::ConnectionError { .. } => {
                "Check SMTP_HOST/SMTP_PORT_SSL and network connectivity, then retry"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::IoError(e) => format!("Could not read the applications file: {}", e),
            Self::SerializationError(e) => format!("The applications file is not valid JSON: {}", e),
            Self::LoadError { message } => format!("The applications file is unusable: {}", message),
            Self::MissingConfigError { field } => format!("Missing required setting: {}", field),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            Self::AuthenticationError { .. } => "Login to the mail server was rejected".to_string(),
            Self::ConnectionError { message } => {
                format!("Could not reach the mail server: {}", message)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MailerError>;

/// 單一收件人寄送失敗，不會中斷整批作業
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// SMTP 協定錯誤、逾時或連線中斷
    #[error("SMTP error: {message}")]
    Transport { message: String },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl DeliveryError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
