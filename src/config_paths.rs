//! Where brace keeps its files
//!
//! Everything lives under one directory:
//! - Unix/macOS: `$XDG_CONFIG_HOME/brace/` or `~/.config/brace/`
//! - Windows: `%APPDATA%\brace\`
//!
//! `config.yaml` sits at the top, daily log files under `logs/`.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "brace";

/// Base name of the daily-rotated log file
pub const LOG_FILE_NAME: &str = "brace.log";

/// Pick the brace directory from the platform's config base
///
/// `base` is `%APPDATA%` on Windows and `$XDG_CONFIG_HOME` elsewhere; an
/// unset or empty value falls back to `~/.config` outside Windows.
fn resolve_dir(base: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    let base = base.filter(|b| !b.is_empty()).map(PathBuf::from);
    let base = if cfg!(target_os = "windows") {
        base
    } else {
        base.or_else(|| home.map(|h| h.join(".config")))
    };
    base.map(|b| b.join(APP_DIR))
}

pub fn config_dir() -> Option<PathBuf> {
    let var = if cfg!(target_os = "windows") {
        "APPDATA"
    } else {
        "XDG_CONFIG_HOME"
    };
    resolve_dir(std::env::var_os(var), dirs::home_dir())
}

/// `<config dir>/config.yaml`
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.yaml"))
}

fn logs_dir_in(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

/// Create `<config dir>/logs/` if needed and return it
pub fn ensure_logs_dir() -> io::Result<PathBuf> {
    let dir = config_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no home or config directory")
    })?;
    let logs = logs_dir_in(&dir);
    std::fs::create_dir_all(&logs)?;
    Ok(logs)
}
