use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;

use crate::config::default_log_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn level(debug: bool) -> Level {
    if debug { Level::DEBUG } else { Level::WARN }
}

/// Picks the log destination. A full-screen command never logs to stderr,
/// since anything written there lands on top of the view.
pub fn target(log_path: Option<&Path>, fullscreen: bool) -> LogTarget {
    match log_path {
        Some(path) => LogTarget::File(path.to_path_buf()),
        None if fullscreen => LogTarget::File(default_log_path()),
        None => LogTarget::Stderr,
    }
}

/// Installs the global subscriber.
pub fn init(debug: bool, target: &LogTarget) -> io::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level(debug))
        .with_target(false);

    let installed = match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        LogTarget::Stderr => builder.with_writer(io::stderr).try_init(),
    };
    installed.map_err(io::Error::other)
}
