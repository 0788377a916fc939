//! Process-wide logging initialisation.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
    /// Optional daily-rotated log file, relative to the home dir unless absolute.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
            ansi: true,
            file: None,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber and bridge `log` records into `tracing`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
///
/// # Errors
/// Fails if a global subscriber is already installed or the filter is invalid.
pub fn init_logging(cfg: &LoggingConfig, home_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .with_context(|| format!("invalid log level '{}'", cfg.level))?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match cfg.format {
        LogFormat::Text => fmt::layer().with_ansi(cfg.ansi).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    });

    let mut guard = None;
    if let Some(file) = &cfg.file {
        let path = crate::paths::resolve_under(home_dir, file)?;
        let dir = path.parent().unwrap_or(home_dir);
        let name = path
            .file_name()
            .map_or_else(|| "apphost.log".into(), |n| n.to_string_lossy().into_owned());
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
        layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
        guard = Some(file_guard);
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .context("global tracing subscriber already installed")?;
    tracing_log::LogTracer::init().context("log bridge already installed")?;

    Ok(guard)
}
