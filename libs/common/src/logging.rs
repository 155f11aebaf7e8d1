//! Unified logging module for the forge tools
//!
//! Console output with bracketed levels and optional daily-rolling file
//! output, filtered by `RUST_LOG` or the configured level.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-10-18T09:12:44.809311Z [INFO] Rule line added`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// File writer guard, kept alive for the whole process
static FILE_GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the file prefix and the default debug target
    pub service_name: String,
    /// Base filter level when `RUST_LOG` is not set
    pub level: String,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// Write log files in addition to the console
    pub enable_file: bool,
    /// Enable JSON format for the file layer
    pub enable_json: bool,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "forge".to_string(),
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file: false,
            enable_json: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Filter used when `RUST_LOG` is absent: `<level>,<service>=debug`
    ///
    /// Crate targets use underscores, so the service name is normalized.
    pub fn default_filter(&self) -> String {
        let target = self.service_name.replace('-', "_");
        if self.level.eq_ignore_ascii_case("info") {
            format!("{},{}=debug", self.level, target)
        } else {
            self.level.clone()
        }
    }
}

/// Initialize logging system with configuration
///
/// `RUST_LOG` takes priority over the configured level.
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| config.default_filter());
    let env_filter = EnvFilter::try_new(&filter_str)?;

    // Console goes to stderr so command output on stdout stays machine-readable
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(
            &config.log_dir,
            format!("{}.log", config.service_name),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        let slot = FILE_GUARD.get_or_init(|| Mutex::new(None));
        match slot.lock() {
            Ok(mut slot) => *slot = Some(guard),
            Err(poisoned) => {
                eprintln!("Warning: FILE_GUARD lock was poisoned, recovering...");
                *poisoned.into_inner() = Some(guard);
            },
        }

        let layer = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_level(true)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
