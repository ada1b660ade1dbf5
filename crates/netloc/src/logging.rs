//! Tracing setup.
//!
//! Everything goes to stderr; the daemon also appends to a log file.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

/// Install the global subscriber. `debug_floor` (from `settings.debug`)
/// raises quiet verbosities to `debug`. Hold the returned guard until
/// exit so buffered file output is flushed.
pub fn init(verbosity: u8, debug_floor: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>, CliError> {
    let filter = match verbosity {
        0 | 1 if debug_floor => "debug",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path.file_name().map_or_else(|| "netloc.log".into(), ToOwned::to_owned);
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A second init (tests, re-entry) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init();

    Ok(guard)
}

/// `~/Library/Logs/netloc.log` on macOS, the local data dir elsewhere.
pub fn default_log_file() -> Option<PathBuf> {
    let dirs = BaseDirs::new()?;
    if cfg!(target_os = "macos") {
        Some(dirs.home_dir().join("Library/Logs/netloc.log"))
    } else {
        Some(dirs.data_local_dir().join("netloc/netloc.log"))
    }
}
