use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when `ASSUBOT_LOG` is unset
const DEFAULT_FILTER: &str = "info,assubot_core=debug";

pub fn init_tracing() {
    init_tracing_with_filter(DEFAULT_FILTER);
}

/// Install the global subscriber.
///
/// `ASSUBOT_LOG` overrides `default_filter` with any `EnvFilter` directive.
/// When `ASSUBOT_LOG_FILE` names a path, output goes there instead of stderr.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_env("ASSUBOT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_logging = std::env::var("ASSUBOT_LOG_FILE").ok();

    if let Some(log_path) = file_logging {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(filter);
                let _ = tracing_subscriber::registry().with(file_layer).try_init();
                return;
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
            }
        }
    }

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter);
    let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
}
