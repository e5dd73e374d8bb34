use clap::Parser;
use follow_up_mailer::utils::error::MailerError;
use follow_up_mailer::utils::{logger, validation::Validate};
use follow_up_mailer::{CliConfig, FollowUpPipeline, LocalStorage, MailerEngine, SmtpConnector};

fn fail(e: &MailerError) -> ! {
    tracing::error!(
        "❌ Run aborted: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.smtp_debug);
    } else {
        logger::init_cli_logger(config.verbose, config.smtp_debug);
    }

    tracing::info!("Starting follow-up-mailer");
    tracing::debug!("CLI config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        fail(&e);
    }

    let credentials = match config.credentials() {
        Ok(credentials) => credentials,
        Err(e) => fail(&e),
    };

    let storage = LocalStorage::new(config.base_dir.clone());
    let pipeline = FollowUpPipeline::new(storage, config, SmtpConnector::default(), credentials);
    let engine = MailerEngine::new(pipeline);

    match engine.run().await {
        Ok(report) => {
            tracing::info!(
                "✅ Run finished: {} sent, {} simulated, {} failed",
                report.success_count,
                report.simulated_count,
                report.failures.len()
            );
            Ok(())
        }
        Err(e) => fail(&e),
    }
}
