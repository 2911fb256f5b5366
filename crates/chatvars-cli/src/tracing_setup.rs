use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_tracing() {
    // Stdout carries command results, so console logs go to stderr
    let filter = EnvFilter::try_from_env("CHATVARS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(console);

    // Check if file logging is enabled via environment variable
    let file_logging = std::env::var("CHATVARS_LOG_FILE").ok();
    let file = file_logging.as_ref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    if let (Some(file), Some(log_path)) = (file, file_logging) {
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        if registry.with(file_layer).try_init().is_ok() {
            eprintln!("File logging enabled: {}", log_path);
        }
    } else {
        let _ = registry.try_init();
    }
}
