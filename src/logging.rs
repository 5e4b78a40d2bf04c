use crate::{LogSettings, ProtectError, ProtectResult};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const KEPT_LOG_FILES: usize = 7;

/// Installs the process-wide subscriber: console on stderr plus a daily
/// rotating log file. `PROTECT_LOG` takes precedence over the configured
/// level when set.
pub fn init_logging(settings: &LogSettings) -> ProtectResult<()> {
    let filter = EnvFilter::try_from_env("PROTECT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_filter()));
    let appender = file_appender(&settings.file)?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(appender),
        )
        .with(filter)
        .try_init()
        .map_err(|error| ProtectError::Logging(error.to_string()))
}

fn file_appender(path: &Path) -> ProtectResult<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            ProtectError::Logging(format!("invalid log file path: {}", path.display()))
        })?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(KEPT_LOG_FILES)
        .build(directory)
        .map_err(|error| ProtectError::Logging(error.to_string()))
}
