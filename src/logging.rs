use std::path::PathBuf;
#[cfg(feature = "advanced_logging")]
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use anyhow::Result;
#[cfg(feature = "advanced_logging")]
use anyhow::Context;

/// Logging configuration for the extractor
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
        }
    }
}

/// Keeps the non-blocking file writer flushing; hold it until exit
pub struct LoggingGuard {
    #[cfg(feature = "advanced_logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize the logging system
///
/// `RUST_LOG` wins over `config.level`. Output goes to stderr so that
/// extracted tables can be piped from stdout.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("html_tables={},{}", config.level, config.level)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .boxed();

    let registry = Registry::default().with(env_filter).with(console_layer);

    #[cfg(feature = "advanced_logging")]
    {
        if config.enable_file_logging {
            prepare_log_dir(&config.log_dir)?;

            let file_appender = tracing_appender::rolling::daily(&config.log_dir, "html_tables.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = if config.enable_json_format {
                fmt::layer().json().with_writer(file_writer).boxed()
            } else {
                fmt::layer().with_writer(file_writer).with_ansi(false).boxed()
            };

            registry.with(file_layer).init();
            info!("File logging enabled: {}", config.log_dir.display());
            return Ok(LoggingGuard {
                _file_guard: Some(guard),
            });
        }
    }

    registry.init();
    info!("Log level: {}", config.level);

    Ok(LoggingGuard {
        #[cfg(feature = "advanced_logging")]
        _file_guard: None,
    })
}

#[cfg(feature = "advanced_logging")]
fn prepare_log_dir(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))
}

/// Performance logging utilities
pub struct PerformanceTimer {
    start: Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        debug!("Starting: {}", operation);
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn checkpoint(&self, checkpoint: &str) {
        debug!(
            "{} - {}: {:.2}ms",
            self.operation,
            checkpoint,
            self.start.elapsed().as_secs_f64() * 1000.0
        );
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        debug!(
            "Completed {}: {:.2}ms",
            self.operation,
            self.start.elapsed().as_secs_f64() * 1000.0
        );
    }
}
