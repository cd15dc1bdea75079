//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Console output in pretty or JSON format
//! - Optional daily-rotated JSON log file
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when set
//! - File output goes through a non-blocking writer; the returned guard must
//!   live until shutdown or buffered lines are lost

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
    Registry,
};

use crate::config::ObservabilityConfig;

const LOG_FILE_PREFIX: &str = "integration-gateway.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "integration_gateway={level},gateway_cli={level},tower_http={level},warn"
        ))
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<Option<WorkerGuard>, TryInitError> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(env_filter(&config.log_level).boxed());

    let console = match config.log_format.as_str() {
        "json" => fmt::layer().json().with_current_span(true).boxed(),
        _ => fmt::layer().with_target(true).boxed(),
    };
    layers.push(console);

    let guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        level = %config.log_level,
        format = %config.log_format,
        log_dir = ?config.log_dir,
        "Logging initialized"
    );
    Ok(guard)
}
