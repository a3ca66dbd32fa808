//! Settings-update orchestrator.
//!
//! Sequences the whole apply operation: validate the image, bring up the
//! mtdram scratch device, pump the image into it, mount it, apply the
//! backup manifest, unmount, pump the device back into the image and
//! verify the result.
//!
//! Cleanup is driven by an undo stack: each acquired resource pushes its
//! undo step, and a failure pops them in reverse, so only what was
//! actually acquired gets torn down.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{Result, UpdateError};
use crate::logging::UpdateLog;
use crate::manifest;
use crate::mtd;
use crate::mtdram::{RamController, RamSession};
use crate::process::Runner;
use crate::pump;
use crate::transfer::TransferEngine;
use crate::ui::Notifier;

/// Undo steps, pushed as resources are acquired and popped in reverse
/// on failure.
#[derive(Debug)]
enum UndoStep {
    UnloadDriver,
    Unmount(PathBuf),
    RemoveOutput(PathBuf),
}

/// Lifecycle of an [`Updater`]. `Done` and `Failed` are terminal until
/// an explicit [`Updater::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    Idle,
    Done,
    Failed,
}

/// Owns one settings-update sequence end to end.
///
/// The mtdram driver is a kernel-wide singleton, so there must be at
/// most one updater applying at a time; construct one per process and
/// keep it.
pub struct Updater<'a> {
    config: &'a Config,
    runner: &'a dyn Runner,
    notifier: &'a dyn Notifier,
    state: UpdaterState,
    last_error: Option<String>,
}

impl<'a> Updater<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn Runner, notifier: &'a dyn Notifier) -> Self {
        Self {
            config,
            runner,
            notifier,
            state: UpdaterState::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> UpdaterState {
        self.state
    }

    /// Message of the last failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Make the updater usable for another apply.
    pub fn reset(&mut self) {
        self.state = UpdaterState::Idle;
        self.last_error = None;
    }

    /// Apply the current settings to `image`.
    ///
    /// Returns plain success/failure; the detailed message is kept in
    /// [`Updater::last_error`] and has already been surfaced through the
    /// notifier and the update log.
    pub fn apply_settings(&mut self, image: &Path) -> bool {
        if self.state != UpdaterState::Idle {
            let err = UpdateError::UpdateInProgress;
            self.last_error = Some(err.to_string());
            self.notifier.show_error(&err.to_string());
            return false;
        }

        self.notifier.show_info("Updating image with current settings...");
        let started = Instant::now();
        let mut undo: Vec<UndoStep> = Vec::new();
        let result = self.run_apply(image, &mut undo);
        println!("  [{:.1}s] image editing", started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                self.state = UpdaterState::Done;
                self.last_error = None;
                self.notifier.show_info("Settings were taken over successfully.");
                true
            }
            Err(e) => {
                let msg = e.to_string();
                UpdateLog::new(true, &self.config.log_file).error(&msg);
                self.unwind(undo);
                self.notifier.show_error(&msg);
                self.last_error = Some(msg);
                self.state = UpdaterState::Failed;
                false
            }
        }
    }

    fn run_apply(&self, image: &Path, undo: &mut Vec<UndoStep>) -> Result<()> {
        let image_size = fs::metadata(image)?.len();
        if image_size == 0 {
            return Err(UpdateError::ImageEmpty(image.to_path_buf()));
        }

        let entries = mtd::read_table(&self.config.proc_mtd)?;
        let partition = mtd::find_system_partition(&entries, &self.config.system_partition)?;
        if image_size > partition.size as u64 {
            return Err(UpdateError::ImageTooLarge {
                size: image_size,
                limit: partition.size as u64,
            });
        }

        let controller = RamController::new(self.config, self.runner);
        let session = controller.prepare(partition.size, partition.erase_size)?;
        undo.push(UndoStep::UnloadDriver);

        // Image into the RAM device.
        {
            let mut src = File::open(image)?;
            let mut dst = controller.open_block_device(&session)?;
            pump::pump(&mut src, &mut dst, image_size)?;
        }

        self.mount(&session)?;
        undo.push(UndoStep::Unmount(session.mount_point.clone()));

        // The early log runs with the configured defaults; the manifest
        // may redirect or disable logging for everything after parse.
        let early_log = UpdateLog::new(true, &self.config.log_file);
        let parsed = manifest::parse(
            &self.config.manifest,
            &self.config.mount_dir,
            &self.config.source_root,
            &self.config.backup_root,
            self.notifier,
            &early_log,
        )?;
        let log = UpdateLog::new(parsed.log_enabled, &parsed.log_file);

        TransferEngine::new(&self.config.source_root, &self.config.mount_dir, &parsed, &log)
            .apply()?;

        let mount_arg = session.mount_point.to_string_lossy();
        if self.runner.run("umount", &[mount_arg.as_ref()]) != 0 {
            return Err(UpdateError::UnmountFailed(session.mount_point.clone()));
        }
        undo.pop(); // Unmount

        // RAM device back into the image file.
        fs::remove_file(image)?;
        {
            let mut src = File::open(&session.block_device)?;
            let mut dst = File::create(image)?;
            undo.push(UndoStep::RemoveOutput(image.to_path_buf()));
            pump::pump(&mut src, &mut dst, session.size as u64)?;
        }

        let written = fs::metadata(image)?.len();
        if written != session.size as u64 {
            return Err(UpdateError::SizeVerificationFailed {
                path: image.to_path_buf(),
                want: session.size as u64,
                got: written,
            });
        }
        undo.pop(); // RemoveOutput

        undo.pop(); // UnloadDriver
        controller.teardown(&session);

        log.blank();
        log.line("##### Settings taken. #####");
        match sha256_file(image) {
            Ok(digest) => log.line(&format!("sha256: {}  {}", digest, image.display())),
            Err(e) => log.error(&format!("cannot hash output image: {}", e)),
        }

        self.runner.run("sync", &[]);
        Ok(())
    }

    fn mount(&self, session: &RamSession) -> Result<()> {
        fs::create_dir_all(&session.mount_point)?;
        fs::set_permissions(&session.mount_point, fs::Permissions::from_mode(0o755))?;

        let device = session.block_device.to_string_lossy();
        let mount_point = session.mount_point.to_string_lossy();
        let rc = self.runner.run(
            "mount",
            &[
                "-t",
                self.config.filesystem.as_str(),
                device.as_ref(),
                mount_point.as_ref(),
            ],
        );
        if rc != 0 {
            return Err(UpdateError::MountFailed(session.mount_point.clone()));
        }
        Ok(())
    }

    /// Tear down whatever was acquired, newest first, then force
    /// durability before the failure is reported.
    fn unwind(&self, undo: Vec<UndoStep>) {
        let controller = RamController::new(self.config, self.runner);
        for step in undo.into_iter().rev() {
            match step {
                UndoStep::Unmount(mount_point) => {
                    let arg = mount_point.to_string_lossy();
                    self.runner.run("umount", &[arg.as_ref()]);
                }
                UndoStep::UnloadDriver => controller.unload(),
                UndoStep::RemoveOutput(path) => {
                    let _ = fs::remove_file(path);
                }
            }
        }
        self.runner.run("sync", &[]);
    }
}

/// SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
