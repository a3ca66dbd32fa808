//! Backup/restore manifest.
//!
//! The manifest is a line-oriented rule file controlling which paths are
//! preserved, deleted or blacklisted while the firmware image is mounted:
//!
//! ```text
//! #:Log=1                    config directive
//! # plain comment
//! /etc/passwd                copy entry (optional leading '+')
//! /var/tuxbox/config/*.conf  copy entry with wildcards
//! -/etc/secret.conf          blacklist entry (copied as *.save)
//! ~/var/cache/*              delete entry (removed inside the image)
//! ```
//!
//! Parsing only classifies lines and builds the lists; applying them is
//! the transfer engine's job. List order is preserved because the rules
//! execute in file order.

use std::fs;
use std::path::Path;

use crate::config;
use crate::error::{Result, UpdateError};
use crate::logging::UpdateLog;
use crate::paths;
use crate::ui::Notifier;

/// Parsed manifest: rule lists plus log settings.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Copy entries in file order, as written (absolute firmware paths).
    pub copy_list: Vec<String>,
    /// Delete entries in file order, already prefixed with the mount root.
    pub delete_list: Vec<String>,
    /// Paths whose backup copy gets a `.save` suffix.
    pub black_list: Vec<String>,
    /// `#:Log=` directive; update logging on/off.
    pub log_enabled: bool,
    /// `#:LogFile=` directive.
    pub log_file: String,
}

impl Manifest {
    fn with_defaults() -> Self {
        Self {
            copy_list: Vec::new(),
            delete_list: Vec::new(),
            black_list: Vec::new(),
            log_enabled: true,
            log_file: config::DEFAULT_LOG_FILE.to_string(),
        }
    }

    /// True if `path` (as written in the manifest) is blacklisted.
    pub fn is_blacklisted(&self, path: &str) -> bool {
        self.black_list.iter().any(|b| b == path)
    }
}

/// Paths the manifest must never touch, no matter what the operator
/// wrote. Wiping `/dev` or `/proc` through a typo would brick the box.
pub fn is_protected(path: &str) -> bool {
    path == "/"
        || path == "/*"
        || path == "/*.*"
        || path.starts_with("/dev")
        || path.starts_with("/proc")
        || path.starts_with("/sys")
        || path.starts_with("/mnt")
        || path.starts_with("/tmp")
}

/// Extract the value of a `#:<key>=` config directive, if `line` is one.
fn config_entry<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix("#:")
        .and_then(|rest| rest.strip_prefix(key))
        .and_then(|rest| rest.strip_prefix('='))
        .map(str::trim)
}

/// Parse the manifest at `manifest_path`.
///
/// A missing manifest is created with a default header and one
/// backup-root entry first. Copy and blacklist paths are checked against
/// `source_root` (the live system; `/` on the box); delete entries are
/// stored prefixed with `mount_root` because they operate on the mounted
/// image. Guard-rejected entries are reported through `notifier` and
/// skipped; they are not errors.
pub fn parse(
    manifest_path: &Path,
    mount_root: &Path,
    source_root: &Path,
    backup_root: &str,
    notifier: &dyn Notifier,
    log: &UpdateLog,
) -> Result<Manifest> {
    if !manifest_path.exists() {
        let defaults = format!(
            "#:Log=1\n#:LogFile={}\n\n{}\n",
            config::DEFAULT_LOG_FILE,
            backup_root
        );
        fs::write(manifest_path, defaults)
            .map_err(|_| UpdateError::ManifestUnreadable(manifest_path.to_path_buf()))?;
    }

    let content = fs::read_to_string(manifest_path)
        .map_err(|_| UpdateError::ManifestUnreadable(manifest_path.to_path_buf()))?;
    if content.is_empty() {
        return Err(UpdateError::ManifestEmpty(manifest_path.to_path_buf()));
    }

    let mut manifest = Manifest::with_defaults();

    for raw in content.lines() {
        let mut line = raw.trim();

        if line.starts_with('#') {
            if let Some(value) = config_entry(line, "Log") {
                if !value.is_empty() {
                    manifest.log_enabled = value.parse::<i32>().unwrap_or(0) != 0;
                }
            } else if let Some(value) = config_entry(line, "LogFile") {
                if !value.is_empty() {
                    manifest.log_file = value.to_string();
                }
            }
            // Unknown #: keys and plain comments are skipped.
            continue;
        }

        // Strip inline trailing comments.
        if let Some(pos) = line.find('#') {
            line = line[..pos].trim();
        }
        if line.is_empty() {
            continue;
        }

        if let Some(path) = line.strip_prefix('-') {
            // Blacklist entry: only kept if it stats as a regular file.
            if path.len() > 1 {
                let on_disk = paths::rebase(source_root, path);
                if let Ok(meta) = fs::symlink_metadata(&on_disk) {
                    if meta.is_file() {
                        manifest.black_list.push(path.to_string());
                    }
                }
            }
        } else if let Some(path) = line.strip_prefix('~') {
            if check_special(path, false, notifier, log) {
                continue;
            }
            if line.len() > 2 {
                let target = paths::rebase(mount_root, path);
                manifest
                    .delete_list
                    .push(target.to_string_lossy().into_owned());
            }
        } else {
            // '+' is the explicit "add" marker and the default.
            let path = line.strip_prefix('+').unwrap_or(line);
            if check_special(path, true, notifier, log) {
                continue;
            }
            if path.len() > 1 {
                manifest.copy_list.push(path.to_string());
            }
        }
    }

    Ok(manifest)
}

/// Guard check with user-visible skip notice. Returns true when the
/// entry must be skipped.
fn check_special(path: &str, copy: bool, notifier: &dyn Notifier, log: &UpdateLog) -> bool {
    if !is_protected(path) {
        return false;
    }
    let msg = if copy {
        format!("Skipped copy of protected path: {}", path)
    } else {
        format!("Skipped delete of protected path: {}", path)
    };
    log.line(&msg);
    notifier.show_info(&msg);
    true
}
