//! Apply command - update a firmware image with the current settings.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::process::SystemRunner;
use crate::ui::{ConsoleNotifier, Notifier, SilentNotifier};
use crate::update::Updater;

/// Execute the apply command.
pub fn cmd_apply(config: &Config, image: &Path, yes: bool) -> Result<()> {
    if !image.exists() {
        bail!("image file not found: {}", image.display());
    }

    let runner = SystemRunner;
    let console = ConsoleNotifier;
    let silent = SilentNotifier;
    let notifier: &dyn Notifier = if yes { &silent } else { &console };

    if !yes
        && !console.confirm(&format!(
            "Update {} with the current settings?",
            image.display()
        ))
    {
        println!("Aborted.");
        return Ok(());
    }

    let mut updater = Updater::new(config, &runner, notifier);
    if !updater.apply_settings(image) {
        bail!(
            "settings update failed: {}",
            updater.last_error().unwrap_or("unknown error")
        );
    }
    Ok(())
}
