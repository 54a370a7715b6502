//! Logging initialization for hosts of the search engine
//!
//! Console output goes to stderr, human-readable or JSON, so that hosts can
//! keep stdout for results. An optional rolling log file receives plain text.
//! `RUST_LOG` overrides the configured level.

use crate::settings::LoggingSettings;
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the non-blocking file writer alive. Hold it for the program duration.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber from settings.
pub fn init_logging(config: &LoggingSettings) -> anyhow::Result<LoggingGuard> {
    let console = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, file_guard) = match search_log_file(config)? {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(build_env_filter(config))
        .try_init()?;

    tracing::debug!(
        level = %config.level,
        json = config.json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn build_env_filter(config: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "booru_search={level},booru_cli={level}",
            level = config.level
        ))
    })
}

fn search_log_file(
    config: &LoggingSettings,
) -> anyhow::Result<Option<(NonBlocking, WorkerGuard)>> {
    if !config.file_enabled {
        return Ok(None);
    }
    fs::create_dir_all(&config.file_directory)?;

    let dir = &config.file_directory;
    let prefix = &config.file_prefix;
    let appender: RollingFileAppender = match config.file_rotation.as_str() {
        "hourly" => rolling::hourly(dir, prefix),
        "minutely" => rolling::minutely(dir, prefix),
        "never" => rolling::never(dir, format!("{prefix}.log")),
        _ => rolling::daily(dir, prefix),
    };

    Ok(Some(tracing_appender::non_blocking(appender)))
}

/// Initialize logging from `RUST_LOG` only, defaulting to `info`.
pub fn init_simple_logging() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booru_search=info,booru_cli=info".into()),
        )
        .try_init();
}
