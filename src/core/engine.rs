use crate::domain::model::SendReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

/// Runs a pipeline once: load, validate, send.
pub struct MailerEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> MailerEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<SendReport> {
        tracing::info!("🚀 Starting follow-up run");

        let raw_data = self.pipeline.extract().await?;
        let records = self.pipeline.transform(raw_data).await?;

        if records.is_empty() {
            tracing::warn!("No valid applications to process");
        }

        let report = self.pipeline.load(records).await?;
        tracing::debug!("Attempted {} of {} sends", report.attempted(), report.total_targets);

        Ok(report)
    }
}
