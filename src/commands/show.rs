//! Show command - display configuration and the parsed manifest.

use anyhow::Result;

use crate::config::Config;
use crate::logging::UpdateLog;
use crate::manifest;
use crate::ui::SilentNotifier;

pub enum ShowTarget {
    Config,
    Manifest,
}

/// Execute the show command.
pub fn cmd_show(config: &Config, target: ShowTarget) -> Result<()> {
    match target {
        ShowTarget::Config => {
            config.print();
        }
        ShowTarget::Manifest => {
            let parsed = manifest::parse(
                &config.manifest,
                &config.mount_dir,
                &config.source_root,
                &config.backup_root,
                &SilentNotifier,
                &UpdateLog::disabled(),
            )?;
            println!("Manifest: {}", config.manifest.display());
            println!("  Log: {} ({})", parsed.log_enabled, parsed.log_file);
            println!("  Copy entries:");
            for entry in &parsed.copy_list {
                println!("    {}", entry);
            }
            println!("  Delete entries:");
            for entry in &parsed.delete_list {
                println!("    {}", entry);
            }
            println!("  Blacklist entries:");
            for entry in &parsed.black_list {
                println!("    {}", entry);
            }
        }
    }
    Ok(())
}
