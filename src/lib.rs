pub mod adapters;
#[cfg(feature = "cli")]
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{smtp::SmtpConnector, storage::LocalStorage};
pub use core::{engine::MailerEngine, pipeline::FollowUpPipeline};
pub use utils::error::{DeliveryError, MailerError, Result};
