pub mod engine;
pub mod message;
pub mod normalize;
pub mod pipeline;

pub use crate::domain::model::{ApplicationRecord, OutboundMessage, RawRecord, SendReport};
pub use crate::domain::ports::{ConfigProvider, MailConnector, MailTransport, Pipeline, Storage};
pub use crate::utils::error::Result;
