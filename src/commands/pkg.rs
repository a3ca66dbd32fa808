//! Pkg command - package management through the external opkg tool.

use anyhow::{bail, Result};

use crate::opkg::{is_dev_package, OpkgManager};

pub enum PkgAction {
    List { all: bool },
    Update,
    Upgrade,
    Install { package: String, reinstall: bool },
    Remove { package: String },
    Info { package: String },
}

/// Execute the pkg command.
pub fn cmd_pkg(action: PkgAction) -> Result<()> {
    let manager = OpkgManager::new();
    if !manager.has_support() {
        bail!("no opkg support on this system");
    }

    match action {
        PkgAction::List { all } => {
            let packages = manager.list()?;
            for package in &packages {
                if !all && is_dev_package(&package.name) {
                    continue;
                }
                let marker = if package.upgradable {
                    "u"
                } else if package.installed {
                    "i"
                } else {
                    " "
                };
                println!("[{}] {}", marker, package.summary);
            }
        }
        PkgAction::Update => {
            manager.update()?;
            println!("Package feeds updated.");
        }
        PkgAction::Upgrade => {
            manager.update()?;
            manager.upgrade()?;
            println!("Upgrade finished.");
        }
        PkgAction::Install { package, reinstall } => {
            manager.install(&package, reinstall)?;
            println!("Installed {}.", package);
        }
        PkgAction::Remove { package } => {
            manager.remove(&package)?;
            println!("Removed {}.", package);
        }
        PkgAction::Info { package } => {
            print!("{}", manager.info(&package)?);
        }
    }
    Ok(())
}
