//! Configuration management for flashset.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file.
//!
//! Every external path the updater touches is configurable so the whole
//! pipeline can be pointed at a scratch tree for testing.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the backup/restore manifest.
pub const DEFAULT_MANIFEST: &str = "/var/tuxbox/config/settingsupdate.conf";

/// Default backup-root entry written into a freshly created manifest.
pub const DEFAULT_BACKUP_ROOT: &str = "/var/tuxbox/config";

/// Default update log file; the manifest `LogFile` directive overrides it.
pub const DEFAULT_LOG_FILE: &str = "/tmp/update.log";

/// Flashset configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the backup/restore manifest.
    pub manifest: PathBuf,
    /// Backup-root entry written when the manifest has to be created.
    pub backup_root: String,
    /// Where the firmware image is mounted while it is edited.
    pub mount_dir: PathBuf,
    /// Kernel module tree (contains `<release>/mtdram.ko`).
    pub module_dir: PathBuf,
    /// MTD device registry (normally /proc/mtd).
    pub proc_mtd: PathBuf,
    /// Loaded-module listing (normally /proc/modules).
    pub proc_modules: PathBuf,
    /// Directory holding the mtd device nodes (normally /dev).
    pub dev_dir: PathBuf,
    /// Root the manifest's copy/blacklist paths are resolved against.
    pub source_root: PathBuf,
    /// Name of the target flash partition in the MTD table.
    pub system_partition: String,
    /// Filesystem type of the firmware image.
    pub filesystem: String,
    /// Update log file used before the manifest has been parsed.
    pub log_file: String,
    /// Kernel release override; `uname -r` is asked when unset.
    pub kernel_release: Option<String>,
}

impl Config {
    /// Load configuration from a .env file and the environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut env_vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if env_path.exists() {
            if let Ok(content) = fs::read_to_string(&env_path) {
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((key, value)) = line.split_once('=') {
                        let value = value.trim().trim_matches('"').trim_matches('\'');
                        env_vars.insert(key.trim().to_string(), value.to_string());
                    }
                }
            }
        }

        // Environment variables override the .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        let path_var = |key: &str, default: &str| -> PathBuf {
            env_vars
                .get(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        let string_var = |key: &str, default: &str| -> String {
            env_vars
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            manifest: path_var("FLASHSET_MANIFEST", DEFAULT_MANIFEST),
            backup_root: string_var("FLASHSET_BACKUP_ROOT", DEFAULT_BACKUP_ROOT),
            mount_dir: path_var("FLASHSET_MOUNT_DIR", "/tmp/image_mount"),
            module_dir: path_var("FLASHSET_MODULE_DIR", "/lib/modules"),
            proc_mtd: path_var("FLASHSET_PROC_MTD", "/proc/mtd"),
            proc_modules: path_var("FLASHSET_PROC_MODULES", "/proc/modules"),
            dev_dir: path_var("FLASHSET_DEV_DIR", "/dev"),
            source_root: path_var("FLASHSET_SOURCE_ROOT", "/"),
            system_partition: string_var("FLASHSET_SYSTEM_PARTITION", "systemFS"),
            filesystem: string_var("FLASHSET_FILESYSTEM", "jffs2"),
            log_file: string_var("FLASHSET_LOG_FILE", DEFAULT_LOG_FILE),
            kernel_release: env_vars.get("FLASHSET_KERNEL_RELEASE").cloned(),
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  FLASHSET_MANIFEST: {}", self.manifest.display());
        println!("  FLASHSET_BACKUP_ROOT: {}", self.backup_root);
        println!("  FLASHSET_MOUNT_DIR: {}", self.mount_dir.display());
        println!("  FLASHSET_MODULE_DIR: {}", self.module_dir.display());
        println!("  FLASHSET_PROC_MTD: {}", self.proc_mtd.display());
        println!("  FLASHSET_PROC_MODULES: {}", self.proc_modules.display());
        println!("  FLASHSET_DEV_DIR: {}", self.dev_dir.display());
        println!("  FLASHSET_SOURCE_ROOT: {}", self.source_root.display());
        println!("  FLASHSET_SYSTEM_PARTITION: {}", self.system_partition);
        println!("  FLASHSET_FILESYSTEM: {}", self.filesystem);
        println!("  FLASHSET_LOG_FILE: {}", self.log_file);
        match &self.kernel_release {
            Some(r) => println!("  FLASHSET_KERNEL_RELEASE: {}", r),
            None => println!("  FLASHSET_KERNEL_RELEASE: (from uname)"),
        }
    }
}
