//! File transfer engine.
//!
//! Applies a parsed manifest against the mounted firmware image: copies
//! current settings from the live system into the image and deletes
//! stale paths inside it. Copy failures abort the update; deletes are
//! best-effort cleanup and only logged.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, UpdateError};
use crate::logging::UpdateLog;
use crate::manifest::Manifest;
use crate::paths;

/// Permission bits preserved on copied files (lower 12 mode bits).
const MODE_MASK: u32 = 0o7777;

/// Shell-style filename matching with `*` and `?`.
///
/// Matches whole names only, the way `fnmatch` does for directory
/// entries; there are never path separators in the input.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            // Backtrack: let the last '*' swallow one more character.
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// True if the manifest entry needs directory-scan expansion.
pub fn has_wildcards(entry: &str) -> bool {
    entry.contains('*') || entry.contains('?')
}

pub struct TransferEngine<'a> {
    /// Root the manifest's source paths live under (`/` on the box).
    source_root: &'a Path,
    /// Mounted image the backup is written into.
    mount_root: &'a Path,
    manifest: &'a Manifest,
    log: &'a UpdateLog,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        source_root: &'a Path,
        mount_root: &'a Path,
        manifest: &'a Manifest,
        log: &'a UpdateLog,
    ) -> Self {
        Self {
            source_root,
            mount_root,
            manifest,
            log,
        }
    }

    /// Apply the whole manifest: copy phase first, then delete phase.
    pub fn apply(&self) -> Result<()> {
        for entry in &self.manifest.copy_list {
            let entry = paths::strip_trailing_slash(entry.trim());
            if has_wildcards(entry) {
                self.log.blank();
                self.log.separator();
                self.log.line(&format!("Wildcards: {}", entry));
                self.copy_wildcard(entry)?;
            } else {
                self.copy_path(entry)?;
            }
        }

        for entry in &self.manifest.delete_list {
            if has_wildcards(entry) {
                self.log.line(&format!("delete file list: {}", entry));
                self.delete_wildcard(Path::new(entry));
            } else {
                self.delete_path(Path::new(entry));
            }
        }
        Ok(())
    }

    /// Copy one manifest entry (no wildcards) into the image.
    ///
    /// Nonexistent sources are skipped silently; the manifest routinely
    /// lists paths that only exist on some boxes.
    pub fn copy_path(&self, entry: &str) -> Result<()> {
        let src = paths::rebase(self.source_root, entry);
        let Ok(meta) = fs::symlink_metadata(&src) else {
            return Ok(());
        };
        let dst = paths::rebase(self.mount_root, entry);

        if meta.file_type().is_symlink() {
            self.copy_symlink(&src, &dst)?;
        } else if meta.is_file() {
            if let Some(dir) = dst.parent() {
                create_dir_0755(dir)?;
            }
            self.log.blank();
            self.log
                .line(&format!("file: {} => {}", src.display(), dst.display()));
            self.log.separator();
            let dst = self.saved_name(entry, &dst);
            self.copy_file(&src, &dst, meta.permissions().mode())?;
        } else if meta.is_dir() {
            self.log.blank();
            self.log.line(&format!(
                "directory: {} => {}",
                src.display(),
                dst.display()
            ));
            self.log.separator();
            self.copy_dir(&src, &dst)?;
        }
        Ok(())
    }

    /// Copy a `<dir>/<glob>` manifest entry: scan the directory and copy
    /// every matching file or symlink. Subdirectories are not descended
    /// into; a directory wanting full backup is listed without wildcards.
    pub fn copy_wildcard(&self, entry: &str) -> Result<()> {
        let Some((dir, glob)) = entry.rsplit_once('/') else {
            return Ok(());
        };
        let src_dir = paths::rebase(self.source_root, dir);
        let matches = scan_dir(&src_dir, glob);
        if matches.is_empty() {
            return Ok(());
        }

        let dst_dir = paths::rebase(self.mount_root, dir);
        create_dir_0755(&dst_dir)?;

        for name in matches {
            let src = src_dir.join(&name);
            let Ok(meta) = fs::symlink_metadata(&src) else {
                continue;
            };
            if meta.file_type().is_symlink() {
                self.copy_symlink(&src, &dst_dir.join(&name))?;
            } else if meta.is_file() {
                self.log
                    .line(&format!("copy {} => {}", src.display(), dst_dir.join(&name).display()));
                let manifest_path = format!("{}/{}", dir, name);
                let dst = self.saved_name(&manifest_path, &dst_dir.join(&name));
                self.copy_file(&src, &dst, meta.permissions().mode())?;
            }
        }
        Ok(())
    }

    /// Delete a `<dir>/<glob>` entry inside the image. Best-effort.
    pub fn delete_wildcard(&self, pattern: &Path) {
        let Some(glob) = pattern.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let Some(dir) = pattern.parent() else {
            return;
        };
        for name in scan_dir(dir, glob) {
            self.delete_path(&dir.join(name));
        }
    }

    /// Delete one path inside the image. Best-effort: failures are
    /// logged but never abort the update.
    pub fn delete_path(&self, path: &Path) {
        let Ok(meta) = fs::symlink_metadata(path) else {
            return;
        };
        let result = if meta.is_dir() {
            self.log.line(&format!("delete directory: {}", path.display()));
            fs::remove_dir_all(path)
        } else {
            // Regular files and symlinks: remove the entry itself.
            self.log.line(&format!("delete file: {}", path.display()));
            fs::remove_file(path)
        };
        if let Err(e) = result {
            self.log
                .error(&format!("delete failed: {}: {}", path.display(), e));
        }
    }

    /// Destination path, with `.save` appended when the source is
    /// blacklisted so the backup never clobbers the preserved file.
    fn saved_name(&self, manifest_path: &str, dst: &Path) -> PathBuf {
        if self.manifest.is_blacklisted(manifest_path) {
            self.log.line(&format!("BlacklistEntry: {}", manifest_path));
            let mut s = dst.as_os_str().to_owned();
            s.push(".save");
            PathBuf::from(s)
        } else {
            dst.to_path_buf()
        }
    }

    /// Copy file bytes plus the lower 12 permission bits.
    fn copy_file(&self, src: &Path, dst: &Path, mode: u32) -> Result<()> {
        let copy = || -> std::io::Result<()> {
            fs::copy(src, dst)?;
            fs::set_permissions(dst, fs::Permissions::from_mode(mode & MODE_MASK))
        };
        copy().map_err(|e| {
            self.log
                .error(&format!("copy failed: {} => {}: {}", src.display(), dst.display(), e));
            UpdateError::CopyFailed {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
            }
        })
    }

    /// Recreate a symlink with the same target; never follows it.
    fn copy_symlink(&self, src: &Path, dst: &Path) -> Result<()> {
        let target = fs::read_link(src)?;
        self.log.line(&format!(
            "symlink: {} => {}",
            dst.display(),
            target.display()
        ));
        if let Some(dir) = dst.parent() {
            create_dir_0755(dir)?;
        }
        // Replace a stale link rather than failing on EEXIST.
        if fs::symlink_metadata(dst).is_ok() {
            let _ = fs::remove_file(dst);
        }
        std::os::unix::fs::symlink(&target, dst)?;
        Ok(())
    }

    /// Recursive directory copy preserving file modes and symlinks.
    fn copy_dir(&self, src: &Path, dst: &Path) -> Result<()> {
        create_dir_0755(dst)?;
        for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|_| UpdateError::CopyFailed {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
            })?;
            let rel = entry
                .path()
                .strip_prefix(src)
                .map_err(|_| UpdateError::CopyFailed {
                    src: src.to_path_buf(),
                    dst: dst.to_path_buf(),
                })?;
            let target = dst.join(rel);
            let file_type = entry.file_type();
            if file_type.is_dir() {
                create_dir_0755(&target)?;
            } else if file_type.is_symlink() {
                self.copy_symlink(entry.path(), &target)?;
            } else if file_type.is_file() {
                let mode = entry
                    .metadata()
                    .map(|m| m.permissions().mode())
                    .unwrap_or(0o644);
                self.copy_file(entry.path(), &target, mode)?;
            }
        }
        Ok(())
    }
}

/// List directory entries matching `glob`, excluding `.` and `..`.
///
/// The glob predicate is applied right here instead of through shared
/// filter state; each scan owns its pattern.
fn scan_dir(dir: &Path, glob: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| glob.is_empty() || wildcard_match(glob, name))
        .collect();
    names.sort();
    names
}

fn create_dir_0755(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
    Ok(())
}
