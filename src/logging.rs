use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, ensure};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

pub const LOG_FILE_PREFIX: &str = "resolutions.log";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Flushes buffered log lines when dropped. Hold it for the life of `main`.
#[must_use = "dropping the guard stops the log writer"]
pub struct LoggingGuard(WorkerGuard);

/// The directory rolled `resolutions.log*` files are written to.
#[derive(Debug, Clone)]
struct LogDirectory {
    path: PathBuf,
}

impl LogDirectory {
    /// Resolves `dir` against the working directory and creates it.
    fn prepare(dir: &Path) -> Result<Self> {
        ensure!(!dir.as_os_str().is_empty(), "logging.dir cannot be empty");
        let path = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .context("failed to read current working directory")?
                .join(dir)
        };
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create logging directory {}", path.display()))?;
        Ok(Self { path })
    }

    fn appender(&self, rotation: &LoggingRotation) -> rolling::RollingFileAppender {
        let rotation = match rotation {
            LoggingRotation::Daily => rolling::Rotation::DAILY,
            LoggingRotation::Hourly => rolling::Rotation::HOURLY,
        };
        rolling::RollingFileAppender::new(rotation, &self.path, LOG_FILE_PREFIX)
    }

    /// Log files last written at or before `cutoff`.
    fn expired_files(&self, cutoff: SystemTime) -> io::Result<Vec<PathBuf>> {
        let mut expired = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_file() && meta.modified()? <= cutoff {
                expired.push(entry.path());
            }
        }
        Ok(expired)
    }

    /// Deletes expired log files. Returns how many went and a message per
    /// failure; none of them stop startup.
    fn sweep(&self, retention_days: usize, now: SystemTime) -> (usize, Vec<String>) {
        let cutoff = retention_cutoff(retention_days, now);
        let expired = match self.expired_files(cutoff) {
            Ok(expired) => expired,
            Err(err) => return (0, vec![format!("failed to scan {}: {err}", self.path.display())]),
        };

        let mut failures = Vec::new();
        let mut removed = 0;
        for path in expired {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => failures.push(format!("failed to remove {}: {err}", path.display())),
            }
        }
        (removed, failures)
    }
}

fn retention_cutoff(retention_days: usize, now: SystemTime) -> SystemTime {
    let days = u64::try_from(retention_days).unwrap_or(u64::MAX);
    now.checked_sub(Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY)))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn env_filter(filter: &str) -> Result<EnvFilter> {
    let filter = filter.trim();
    ensure!(!filter.is_empty(), "logging.filter cannot be empty");
    EnvFilter::try_new(filter).with_context(|| format!("invalid logging.filter '{filter}'"))
}

/// Installs the global subscriber: JSON lines to the rolling file, plus WARN
/// and above on stderr when enabled.
pub fn init_tracing(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = env_filter(&config.filter)?;
    let log_dir = LogDirectory::prepare(&config.dir)?;
    let (removed, failures) = log_dir.sweep(config.retention_days, SystemTime::now());

    let (writer, guard) = tracing_appender::non_blocking(log_dir.appender(&config.rotation));
    let json_lines = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter);
    let warnings = config
        .stderr_warn_enabled
        .then(|| fmt::layer().with_writer(io::stderr).with_filter(LevelFilter::WARN));

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(json_lines)
        .with(warnings)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    tracing::info!(
        target: "logging",
        run_id = %Uuid::now_v7(),
        dir = %log_dir.path.display(),
        rotation = ?config.rotation,
        retention_days = config.retention_days,
        expired_files_removed = removed,
        "logging_initialized"
    );
    for failure in failures {
        tracing::warn!(target: "logging", failure = %failure, "logging_retention_failed");
    }

    Ok(LoggingGuard(guard))
}
