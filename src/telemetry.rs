//! Log file setup shared by the controller and the supervisor.

use anyhow::{anyhow, Context, Result};
use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io,
    panic,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};
use tracing_subscriber::{fmt::time::UtcTime, EnvFilter};

/// Env var that overrides the configured level with a full filter directive.
pub const LOG_FILTER_ENV: &str = "PIHOLE_DISPLAY_LOG";

/// Controller logs roll over once they pass this size at startup.
pub const CONTROLLER_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// When the previous log file is moved aside to `<file>.old`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    EveryRun,
    LargerThan(u64),
}

/// Where log lines go and how verbose they are.
#[derive(Debug, Clone)]
pub struct LogTarget {
    /// `None` writes to stderr.
    pub file: Option<PathBuf>,
    pub level: String,
    pub rotation: LogRotation,
}

/// `<file>.old`, keeping the original extension.
pub fn rotated_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".old");
    PathBuf::from(name)
}

/// Move the current log aside if the rotation policy asks for it.
pub fn rotate_log(path: &Path, rotation: LogRotation) -> io::Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    let due = match rotation {
        LogRotation::EveryRun => true,
        LogRotation::LargerThan(limit) => size > limit,
    };
    if !due {
        return Ok(false);
    }
    fs::rename(path, rotated_path(path))?;
    Ok(true)
}

/// Install the global `tracing` subscriber. Later calls are no-ops.
pub fn init_tracing(target: &LogTarget) -> Result<()> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(&target.level))
        .context("invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    let installed = match &target.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create log directory '{}'", parent.display())
                    })?;
                }
            }
            rotate_log(path, target.rotation)
                .with_context(|| format!("failed to rotate '{}'", path.display()))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{}'", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;
    let _ = TRACING_INIT.set(());
    Ok(())
}

/// Record panics in the log before the default hook prints them.
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let payload = if let Some(text) = info.payload().downcast_ref::<&str>() {
                (*text).to_string()
            } else if let Some(text) = info.payload().downcast_ref::<String>() {
                text.clone()
            } else {
                "non-string panic payload".to_string()
            };
            tracing::error!(
                "panic at {location}: {payload} (v{})",
                env!("CARGO_PKG_VERSION")
            );
            previous(info);
        }));
    });
}
