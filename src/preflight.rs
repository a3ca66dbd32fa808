//! Preflight checks for a settings update.
//!
//! Validates host tools and kernel prerequisites before an image is
//! touched. Run with `flashset preflight` to check everything is ready.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::opkg::{OpkgManager, OPKG_BIN};
use crate::process::Cmd;

/// Tools the update sequence shells out to.
const REQUIRED_TOOLS: &[&str] = &["insmod", "rmmod", "mount", "umount", "sync"];

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - an apply would fail.
    Fail,
    /// Check passed but with a warning.
    Warn,
}

impl CheckResult {
    fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: None,
        }
    }

    fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    fn warn(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: Some(details.to_string()),
        }
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    pub fn print(&self) {
        for check in &self.checks {
            let marker = match check.status {
                CheckStatus::Pass => "ok",
                CheckStatus::Warn => "warn",
                CheckStatus::Fail => "FAIL",
            };
            match &check.details {
                Some(details) => println!("  [{}] {} - {}", marker, check.name, details),
                None => println!("  [{}] {}", marker, check.name),
            }
        }
    }
}

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    for tool in REQUIRED_TOOLS {
        match which::which(tool) {
            Ok(path) => checks.push(CheckResult::pass_with(tool, &path.to_string_lossy())),
            Err(_) => checks.push(CheckResult::fail(tool, "not found in PATH")),
        }
    }

    match kernel_release(config) {
        Some(release) => {
            checks.push(CheckResult::pass_with("kernel release", &release));
            let driver = config.module_dir.join(&release).join("mtdram.ko");
            if driver.exists() {
                checks.push(CheckResult::pass("mtdram driver"));
            } else {
                checks.push(CheckResult::fail(
                    "mtdram driver",
                    &format!("{} not found", driver.display()),
                ));
            }
        }
        None => checks.push(CheckResult::fail("kernel release", "uname gave nothing usable")),
    }

    if config.proc_mtd.exists() {
        checks.push(CheckResult::pass("MTD table"));
    } else {
        checks.push(CheckResult::fail(
            "MTD table",
            &format!("{} not readable", config.proc_mtd.display()),
        ));
    }

    match config.manifest.parent() {
        Some(parent) if parent.exists() => checks.push(CheckResult::pass("manifest directory")),
        Some(parent) => checks.push(CheckResult::warn(
            "manifest directory",
            &format!("{} missing, will be created", parent.display()),
        )),
        None => checks.push(CheckResult::warn("manifest directory", "no parent directory")),
    }

    if OpkgManager::new().has_support() {
        checks.push(CheckResult::pass(OPKG_BIN));
    } else {
        checks.push(CheckResult::warn(
            OPKG_BIN,
            "no opkg support, package commands unavailable",
        ));
    }

    PreflightReport { checks }
}

/// Run preflight and fail hard if anything required is missing.
pub fn run_preflight_or_fail(config: &Config) -> Result<()> {
    let report = run_preflight(config);
    report.print();
    if !report.all_passed() {
        bail!("preflight failed");
    }
    Ok(())
}

fn kernel_release(config: &Config) -> Option<String> {
    if let Some(release) = &config.kernel_release {
        return Some(release.clone());
    }
    let result = Cmd::new("uname").arg("-r").run().ok()?;
    let release = result.stdout_trimmed().split_whitespace().next()?;
    if release.is_empty() {
        None
    } else {
        Some(release.to_string())
    }
}
