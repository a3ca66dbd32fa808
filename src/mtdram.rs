//! RAM-block-device controller.
//!
//! Loads the mtdram kernel module to get a RAM-backed MTD device sized
//! exactly like the target flash partition, so the firmware image can be
//! edited through a real filesystem mount instead of in place. The
//! driver is a kernel-wide singleton; at most one session exists at a
//! time and the driver must be unloaded again on every exit path.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, UpdateError};
use crate::mtd;
use crate::process::{Cmd, Runner};

/// Name the mtdram driver registers its device under.
pub const RAM_DEVICE_NAME: &str = "mtdram test device";

/// Module name used for load checks and rmmod.
const DRIVER_NAME: &str = "mtdram";

/// Attempts to open the freshly created block device node; creation can
/// race the module load.
const OPEN_ATTEMPTS: u32 = 4;
const OPEN_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// An active mtdram session: driver loaded, device nodes known.
#[derive(Debug, Clone)]
pub struct RamSession {
    pub driver_path: PathBuf,
    pub mount_point: PathBuf,
    pub block_device: PathBuf,
    pub char_device: PathBuf,
    pub size: u32,
    pub erase_size: u32,
    pub index: u32,
}

pub struct RamController<'a> {
    config: &'a Config,
    runner: &'a dyn Runner,
}

impl<'a> RamController<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn Runner) -> Self {
        Self { config, runner }
    }

    /// Load the driver (if needed) and locate the RAM device.
    ///
    /// The device's size and erase size must exactly equal the request;
    /// anything else means the driver was loaded with foreign parameters
    /// and the image transfer would corrupt data. All failure paths that
    /// reached the module load leave the driver unloaded.
    pub fn prepare(&self, size: u32, erase_size: u32) -> Result<RamSession> {
        let release = self.kernel_release()?;
        let driver_path = self
            .config
            .module_dir
            .join(&release)
            .join(format!("{}.ko", DRIVER_NAME));

        if !self.driver_loaded() {
            if !driver_path.exists() {
                return Err(UpdateError::DriverMissing(driver_path));
            }
            let path_arg = driver_path.to_string_lossy();
            let total_kib = format!("total_size={}", size / 1024);
            let erase_kib = format!("erase_size={}", erase_size / 1024);
            self.runner.run(
                "insmod",
                &[path_arg.as_ref(), total_kib.as_str(), erase_kib.as_str()],
            );
            if !self.driver_loaded() {
                return Err(UpdateError::DriverLoadFailed);
            }
        } else {
            println!("mtdram driver is already loaded");
        }

        let entries = match mtd::read_table(&self.config.proc_mtd) {
            Ok(entries) => entries,
            Err(e) => {
                self.unload();
                return Err(e);
            }
        };
        let Some(ram) = mtd::find_by_name(&entries, RAM_DEVICE_NAME) else {
            self.unload();
            return Err(UpdateError::RamDeviceNotFound);
        };
        if ram.size != size || ram.erase_size != erase_size {
            let err = UpdateError::SizeMismatch {
                want_size: size,
                got_size: ram.size,
                want_erase: erase_size,
                got_erase: ram.erase_size,
            };
            self.unload();
            return Err(err);
        }

        Ok(RamSession {
            driver_path,
            mount_point: self.config.mount_dir.clone(),
            block_device: ram.block_device(&self.config.dev_dir),
            char_device: ram.char_device(&self.config.dev_dir),
            size: ram.size,
            erase_size: ram.erase_size,
            index: ram.index,
        })
    }

    /// Open the session's block device for writing, retrying while the
    /// kernel finishes creating the device node.
    pub fn open_block_device(&self, session: &RamSession) -> Result<File> {
        for attempt in 1..=OPEN_ATTEMPTS {
            match OpenOptions::new().write(true).open(&session.block_device) {
                Ok(f) => return Ok(f),
                Err(_) if attempt < OPEN_ATTEMPTS => thread::sleep(OPEN_RETRY_PAUSE),
                Err(_) => break,
            }
        }
        Err(UpdateError::DeviceOpenFailed(session.block_device.clone()))
    }

    /// Unmount the mount point and unload the driver. Idempotent and
    /// best-effort: called on success and on every unwind path, and not
    /// allowed to raise errors that would mask the original failure.
    pub fn teardown(&self, session: &RamSession) {
        let mount_arg = session.mount_point.to_string_lossy();
        self.runner.run("umount", &[mount_arg.as_ref()]);
        self.unload();
    }

    /// rmmod only; used before the mount point exists.
    pub fn unload(&self) {
        self.runner.run("rmmod", &[DRIVER_NAME]);
    }

    /// Running kernel release, truncated at the first space.
    fn kernel_release(&self) -> Result<String> {
        if let Some(release) = &self.config.kernel_release {
            return Ok(release.clone());
        }
        let result = Cmd::new("uname")
            .arg("-r")
            .run()
            .map_err(|_| UpdateError::KernelReleaseUnknown)?;
        let release = result
            .stdout_trimmed()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();
        if release.is_empty() {
            return Err(UpdateError::KernelReleaseUnknown);
        }
        Ok(release)
    }

    fn driver_loaded(&self) -> bool {
        fs::read_to_string(&self.config.proc_modules)
            .map(|content| {
                content
                    .lines()
                    .any(|l| l.split_whitespace().next() == Some(DRIVER_NAME))
            })
            .unwrap_or(false)
    }
}
