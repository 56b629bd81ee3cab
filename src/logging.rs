//! Structured logging and tracing for Helios
//!
//! Console and daily-rotated file output built on `tracing-subscriber` and
//! `tracing-appender`, plus lightweight component loggers that tag every
//! event with `component` and `vin` fields.

use crate::config::LoggingConfig;
use crate::error::{HeliosError, Result};
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

mod level;
mod state;
mod structured;

pub use level::{min_level, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

use state::{INIT_ERROR, INIT_ONCE, LOG_GUARD};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber once; later calls report the first outcome
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        if let Err(e) = install(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    match INIT_ERROR.get() {
        Some(err) => Err(HeliosError::config(err.clone())),
        None => Ok(()),
    }
}

fn install(config: &LoggingConfig) -> Result<()> {
    let base = parse_log_level(&config.level)?;
    let console_level = override_level(config.console_level.as_deref(), base);
    let file_level = override_level(config.file_level.as_deref(), base);
    let to_file = !console_only();

    let mut layers: Vec<BoxedLayer> = vec![env_filter(min_level(console_level, file_level)).boxed()];
    if to_file {
        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(file_prefix(&config.file))
            .filename_suffix("log")
            .max_log_files(config.backup_count.max(1) as usize)
            .build(log_directory(&config.file))
            .map_err(|e| HeliosError::io(format!("Failed to create log file appender: {}", e)))?;
        let (writer, guard) = non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        layers.push(output_layer(writer, false, config.json_format, file_level));
    }
    if config.console_output || !to_file {
        layers.push(output_layer(
            std::io::stdout,
            true,
            config.json_format,
            console_level,
        ));
    }

    match tracing_subscriber::registry().with(layers).try_init() {
        Ok(()) => {
            let file = if to_file { config.file.as_str() } else { "-" };
            info!(
                console_level = %console_level,
                file_level = %file_level,
                file,
                "Logging initialized"
            );
            Ok(())
        }
        // Test binaries may already own the global slot
        Err(_) if !to_file => Ok(()),
        Err(e) => Err(HeliosError::config(format!(
            "Failed to install subscriber: {}",
            e
        ))),
    }
}

fn override_level(name: Option<&str>, fallback: Level) -> Level {
    name.and_then(|s| parse_log_level(s).ok()).unwrap_or(fallback)
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("helios={},reqwest=warn,hyper=warn", level).into())
}

fn console_only() -> bool {
    cfg!(test) || std::env::var_os("HELIOS_DISABLE_FILE_LOG").is_some()
}

fn output_layer<W>(writer: W, ansi: bool, json: bool, level: Level) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);
    let filter = LevelFilter::from_level(level);
    if json {
        layer.json().with_filter(filter).boxed()
    } else {
        layer.with_filter(filter).boxed()
    }
}

/// `logs/helios.log` rotates inside `logs/`; a bare directory is used as-is
fn log_directory(file: &str) -> &Path {
    let path = Path::new(file);
    match (path.extension(), path.parent()) {
        (Some(_), Some(parent)) => parent,
        _ => path,
    }
}

fn file_prefix(file: &str) -> String {
    let path = Path::new(file);
    path.extension()
        .and(path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "helios".to_string())
}
