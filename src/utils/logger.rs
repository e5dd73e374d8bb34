use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directives(verbose: bool, smtp_debug: bool) -> String {
    let mut directives = if verbose {
        "follow_up_mailer=debug,info".to_string()
    } else {
        "follow_up_mailer=info".to_string()
    };

    // lettre 的 tracing feature 會在 trace 等級輸出完整 SMTP 對話
    if smtp_debug {
        directives.push_str(",lettre=trace");
    }

    directives
}

pub fn init_cli_logger(verbose: bool, smtp_debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, smtp_debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON lines, for running under a log collector.
pub fn init_json_logger(smtp_debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(false, smtp_debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}
