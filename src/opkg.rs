//! opkg front-end.
//!
//! Thin wrapper over the external `opkg-cl` tool: builds its command
//! lines, parses the streaming list output into package records and
//! classifies success/failure from free-form log lines. Package format
//! handling stays inside opkg itself.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::process::Cmd;

/// The opkg binary. Kept as one knob for when plain `opkg` lands.
pub const OPKG_BIN: &str = "opkg-cl";

/// Extra options for operations that download or unpack packages.
const CACHE_OPTIONS: &[&str] = &["-V2", "--tmp-dir=/tmp", "--cache=/tmp/.opkg"];

/// Support files opkg needs besides the binary itself.
const SUPPORT_PATHS: &[&str] = &[
    "/bin/opkg-check-config",
    "/bin/update-alternatives",
    "/var/lib/opkg",
    "/share/opkg/intercept",
];

/// One package as reported by the list commands.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub name: String,
    /// The raw list line; keeps version and summary for display.
    pub summary: String,
    pub installed: bool,
    pub upgradable: bool,
}

/// Anchored pattern matching for package-name filters.
///
/// Deliberately not a regex: the filter list only ever needs these
/// three anchors.
#[derive(Debug, Clone, Copy)]
pub enum PatternRule {
    Prefix(&'static str),
    Suffix(&'static str),
    Contains(&'static str),
}

impl PatternRule {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            PatternRule::Prefix(p) => name.starts_with(p),
            PatternRule::Suffix(s) => name.ends_with(s),
            PatternRule::Contains(c) => name.contains(c),
        }
    }
}

/// Development/diagnostic packages hidden from the default listing.
pub const DEV_PACKAGE_RULES: &[PatternRule] = &[
    PatternRule::Suffix("-dev"),
    PatternRule::Suffix("-doc"),
    PatternRule::Suffix("-dbg"),
    PatternRule::Suffix("-ptest"),
    PatternRule::Suffix("-staticdev"),
    PatternRule::Contains("-locale-"),
    PatternRule::Contains("-charmap-"),
    PatternRule::Contains("-gconv-"),
    PatternRule::Contains("-localedata-"),
    PatternRule::Prefix("locale-base-"),
    PatternRule::Prefix("perl-module-"),
];

/// True for packages the default listing hides.
pub fn is_dev_package(name: &str) -> bool {
    DEV_PACKAGE_RULES.iter().any(|rule| rule.matches(name))
}

/// Extract the package name from one list line.
///
/// Error chatter (`Collected errors:`, ` * `) and description
/// continuation lines never yield a name.
pub fn package_name(line: &str) -> Option<String> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let line = line.trim();
    if line.is_empty() || line.contains("Collected errors:") || line.contains(" * ") {
        return None;
    }
    line.split_whitespace().next().map(str::to_string)
}

/// Classification state for opkg's free-form output.
///
/// opkg reports most failures as prose after a `Collected errors:`
/// marker while still exiting zero, so the lines themselves decide
/// success or failure.
#[derive(Debug, Default)]
pub struct OutputScan {
    in_errors: bool,
    /// Human-readable error messages collected so far.
    pub errors: Vec<String>,
    /// Non-error output, for `info`/`status` queries.
    pub text: String,
}

impl OutputScan {
    pub fn feed(&mut self, line: &str) {
        if line.contains("Collected errors:") {
            self.in_errors = true;
            return;
        }
        if self.in_errors {
            // Known benign: a duplicate cache option in opkg.conf wins
            // over ours and is not a failure.
            if line.contains("Duplicate option cache") {
                self.in_errors = false;
                return;
            }
            if line.contains("opkg_download:") {
                self.errors
                    .push("Network error! Please check your network connection!".to_string());
                return;
            }
            if line.contains("opkg_install_pkg") {
                self.errors.push("Update not possible!".to_string());
                return;
            }
            if line.contains("opkg_install_cmd") {
                self.errors.push("Cannot install package!".to_string());
                return;
            }
            if line.contains("No space left on device") {
                self.errors.push("Not enough space available!".to_string());
                return;
            }
            if let Some(pos) = line.find(" * ") {
                let msg = line[pos + 3..].trim();
                if !msg.is_empty() {
                    self.errors.push(msg.to_string());
                }
                return;
            }
            return;
        }
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Front-end over the external opkg binary.
pub struct OpkgManager;

impl OpkgManager {
    pub fn new() -> Self {
        Self
    }

    /// True if the box has a usable opkg installation.
    pub fn has_support(&self) -> bool {
        if which::which(OPKG_BIN).is_err() {
            return false;
        }
        SUPPORT_PATHS
            .iter()
            .all(|p| std::path::Path::new(p).exists())
    }

    /// Full package list with installed/upgradable markers merged in.
    pub fn list(&self) -> Result<Vec<Package>> {
        let mut packages: BTreeMap<String, Package> = BTreeMap::new();

        for (name, line) in self.list_lines("list")? {
            packages.insert(
                name.clone(),
                Package {
                    name,
                    summary: line,
                    ..Package::default()
                },
            );
        }
        for (name, _) in self.list_lines("list-installed")? {
            if let Some(p) = packages.get_mut(&name) {
                p.installed = true;
            }
        }
        for (name, _) in self.list_lines("list-upgradable")? {
            if let Some(p) = packages.get_mut(&name) {
                p.upgradable = true;
            }
        }

        Ok(packages.into_values().collect())
    }

    /// Refresh the package feeds.
    pub fn update(&self) -> Result<()> {
        self.exec(&["-A", "update"]).map(|_| ())
    }

    /// Upgrade everything that is upgradable.
    pub fn upgrade(&self) -> Result<()> {
        self.exec_cached(&["upgrade"]).map(|_| ())
    }

    pub fn install(&self, package: &str, force_reinstall: bool) -> Result<()> {
        let mut args = vec!["install"];
        if force_reinstall {
            args.push("--force-reinstall");
        }
        args.push(package);
        self.exec_cached(&args).map(|_| ())
    }

    pub fn remove(&self, package: &str) -> Result<()> {
        self.exec_cached(&["remove", package]).map(|_| ())
    }

    /// Package metadata as reported by `opkg-cl info`.
    pub fn info(&self, package: &str) -> Result<String> {
        self.exec(&["info", package])
    }

    fn list_lines(&self, command: &str) -> Result<Vec<(String, String)>> {
        let result = Cmd::new(OPKG_BIN)
            .arg(command)
            .allow_fail()
            .run()?;
        let mut lines = Vec::new();
        for line in result.stdout.lines() {
            if let Some(name) = package_name(line) {
                lines.push((name, line.trim().to_string()));
            }
        }
        Ok(lines)
    }

    fn exec_cached(&self, args: &[&str]) -> Result<String> {
        let mut full: Vec<&str> = CACHE_OPTIONS.to_vec();
        full.extend_from_slice(args);
        self.exec(&full)
    }

    /// Run opkg and classify its output; collected error lines are a
    /// failure regardless of the exit code.
    fn exec(&self, args: &[&str]) -> Result<String> {
        let result = Cmd::new(OPKG_BIN)
            .args(args.iter().copied())
            .allow_fail()
            .run()?;

        let mut scan = OutputScan::default();
        for line in result.stdout.lines().chain(result.stderr.lines()) {
            scan.feed(line);
        }

        if scan.failed() || !result.success() {
            let mut msg = scan.errors.join("\n");
            if msg.is_empty() {
                msg = format!("{} failed (exit code {})", OPKG_BIN, result.code());
            }
            bail!("{}", msg);
        }
        Ok(scan.text)
    }
}

impl Default for OpkgManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_rules_anchor_correctly() {
        assert!(PatternRule::Suffix("-dev").matches("openssl-dev"));
        assert!(!PatternRule::Suffix("-dev").matches("openssl-devel"));
        assert!(PatternRule::Prefix("perl-module-").matches("perl-module-strict"));
        assert!(!PatternRule::Prefix("perl-module-").matches("xperl-module-strict"));
        assert!(PatternRule::Contains("-locale-").matches("busybox-locale-de"));
    }

    #[test]
    fn dev_package_filter() {
        assert!(is_dev_package("neutrino-dbg"));
        assert!(is_dev_package("locale-base-en-gb"));
        assert!(!is_dev_package("neutrino"));
    }

    #[test]
    fn package_name_extraction() {
        assert_eq!(
            package_name("dropbear - 2022.83-r0 - lightweight ssh"),
            Some("dropbear".to_string())
        );
        assert_eq!(package_name("   continuation of a description"), None);
        assert_eq!(package_name("Collected errors:"), None);
        assert_eq!(package_name(" * opkg_install_cmd: Cannot install package"), None);
        assert_eq!(package_name(""), None);
    }

    #[test]
    fn scan_classifies_known_errors() {
        let mut scan = OutputScan::default();
        scan.feed("Downloading http://feed/Packages.gz.");
        scan.feed("Collected errors:");
        scan.feed(" * opkg_download: Failed to download feed.");
        assert!(scan.failed());
        assert_eq!(scan.errors, vec!["Network error! Please check your network connection!"]);
    }

    #[test]
    fn scan_reports_out_of_space() {
        let mut scan = OutputScan::default();
        scan.feed("Collected errors:");
        scan.feed(" * write: No space left on device.");
        assert!(scan.failed());
        assert_eq!(scan.errors, vec!["Not enough space available!"]);
    }

    #[test]
    fn duplicate_cache_option_is_benign() {
        let mut scan = OutputScan::default();
        scan.feed("Collected errors:");
        scan.feed("Duplicate option cache in /etc/opkg/opkg.conf.");
        scan.feed("Installing dropbear.");
        assert!(!scan.failed());
        assert!(scan.text.contains("Installing dropbear."));
    }

    #[test]
    fn unknown_error_lines_are_collected() {
        let mut scan = OutputScan::default();
        scan.feed("Collected errors:");
        scan.feed(" * something nobody anticipated went wrong.");
        assert!(scan.failed());
        assert_eq!(scan.errors, vec!["something nobody anticipated went wrong."]);
    }

    #[test]
    fn plain_output_accumulates() {
        let mut scan = OutputScan::default();
        scan.feed("Package: dropbear");
        scan.feed("Version: 2022.83-r0");
        assert!(!scan.failed());
        assert_eq!(scan.text, "Package: dropbear\nVersion: 2022.83-r0\n");
    }
}
