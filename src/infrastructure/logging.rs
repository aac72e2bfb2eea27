use anyhow::Context;
use std::fs;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Configuration for console and file logging
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub file_name: String,
    pub enable_console: bool,
    pub enable_file: bool,
    pub log_level: Level,
    pub enable_json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            file_name: "bank-events.log".to_string(),
            enable_console: true,
            enable_file: true,
            log_level: Level::INFO,
            enable_json: false,
        }
    }
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: Level) -> String {
    format!(
        "bank_events={level},projection_consumer={level},rdkafka=warn,sqlx=warn,tower_http=info",
        level = level
    )
}

/// Installs the global subscriber. Keep the returned guard alive for the life
/// of the process, otherwise buffered file output is lost.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.log_level)));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut guard = None;

    if config.enable_console {
        let console = fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true);
        if config.enable_json {
            layers.push(console.json().boxed());
        } else {
            layers.push(console.boxed());
        }
    }

    if config.enable_file {
        fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("creating log directory {}", config.log_dir))?;
        let appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &config.file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);

        let file = fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);
        if config.enable_json {
            layers.push(file.json().boxed());
        } else {
            layers.push(file.boxed());
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}
