//! Minimal stderr logger.
//!
//! Prints `[elapsed LEVEL crate] message`. Install once at startup with
//! [`init_with_level`], or [`init_from_env`] to read the level from
//! `PANTILT_LOG`. Later calls only change the level. With the `tracing`
//! feature, [`init_tracing`] installs a `tracing-subscriber` registry instead.

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable consulted by [`init_from_env`] and [`init_tracing`].
pub const LOG_ENV: &str = "PANTILT_LOG";

/// Filtering is left to `log::max_level`, so the level can be changed after install.
struct StderrLogger {
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let krate = record
            .module_path()
            .unwrap_or_else(|| record.target())
            .split("::")
            .next()
            .unwrap_or_default();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{:8.3}s {:<5} {krate}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the stderr logger (first call) and set the global level (every call).
///
/// Fails only when a different logger was installed before the first call.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if !INSTALLED.swap(true, Ordering::AcqRel) {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            started: Instant::now(),
        });
        if let Err(e) = log::set_logger(logger) {
            INSTALLED.store(false, Ordering::Release);
            return Err(e);
        }
    }
    log::set_max_level(level);
    Ok(())
}

/// Parse a level name (`"warn"`, `"debug"`, ...), falling back to `default`.
pub fn parse_level(raw: Option<&str>, default: LevelFilter) -> LevelFilter {
    raw.and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(default)
}

/// Install the stderr logger with the level named in `PANTILT_LOG` (default `info`).
pub fn init_from_env() -> Result<(), log::SetLoggerError> {
    let raw = std::env::var(LOG_ENV).ok();
    init_with_level(parse_level(raw.as_deref(), LevelFilter::Info))
}

/// Install a `tracing` registry filtered by `PANTILT_LOG` (directive syntax,
/// default `info`), writing span timings to stderr as text or flattened JSON.
///
/// A second call is ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter as TraceLevel};
    use tracing_subscriber::fmt::{self, format::FmtSpan};
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::builder()
        .with_default_directive(TraceLevel::INFO.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let registry = tracing_subscriber::registry().with(filter);

    let _ = if json {
        registry.with(layer.json().flatten_event(true)).try_init()
    } else {
        registry
            .with(layer.with_timer(fmt::time::Uptime::default()))
            .try_init()
    };
}
