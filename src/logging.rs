//! Append-only update log.
//!
//! Every significant step of a settings update (mount, copy, delete,
//! error) is recorded here. Writes are best-effort: a failing log must
//! never abort the update itself.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File-backed log sink, gated by the manifest `Log` flag.
#[derive(Debug, Clone)]
pub struct UpdateLog {
    enabled: bool,
    path: PathBuf,
}

impl UpdateLog {
    pub fn new(enabled: bool, path: impl AsRef<Path>) -> Self {
        Self {
            enabled,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// A log that swallows everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    /// Append one line. Errors are ignored on purpose.
    pub fn line(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{}", msg);
        }
    }

    /// Append a section separator.
    pub fn separator(&self) {
        self.line("--------------------");
    }

    /// Append an empty line.
    pub fn blank(&self) {
        self.line("");
    }

    /// Append an error line.
    pub fn error(&self, msg: &str) {
        self.line(&format!("ERROR: {}", msg));
    }
}
