//! Error taxonomy for the settings-update pipeline.
//!
//! Every fatal condition the updater can hit has its own variant so the
//! orchestrator can log it, surface it to the user and decide how much
//! unwinding is required.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("no mtdram driver available: {0}")]
    DriverMissing(PathBuf),

    #[error("error loading mtdram driver")]
    DriverLoadFailed,

    #[error("no mtdram test device found")]
    RamDeviceNotFound,

    #[error(
        "MTD size mismatch: size {want_size:#010x}/{got_size:#010x} erase size {want_erase:#010x}/{got_erase:#010x}"
    )]
    SizeMismatch {
        want_size: u32,
        got_size: u32,
        want_erase: u32,
        got_erase: u32,
    },

    #[error("cannot open block device: {0}")]
    DeviceOpenFailed(PathBuf),

    #[error("image file size is 0: {0}")]
    ImageEmpty(PathBuf),

    #[error("image file too large: {size} bytes, partition holds {limit}")]
    ImageTooLarge { size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mount error on {0}")]
    MountFailed(PathBuf),

    #[error("unmount error on {0}")]
    UnmountFailed(PathBuf),

    #[error("cannot read backup manifest: {0}")]
    ManifestUnreadable(PathBuf),

    #[error("backup manifest is empty: {0}")]
    ManifestEmpty(PathBuf),

    #[error("copy error: {src} => {dst}")]
    CopyFailed { src: PathBuf, dst: PathBuf },

    #[error("output image size {got} does not match device size {want}: {path}")]
    SizeVerificationFailed { path: PathBuf, want: u64, got: u64 },

    #[error("no \"{0}\" partition in MTD table")]
    SystemPartitionNotFound(String),

    #[error("cannot determine running kernel release")]
    KernelReleaseUnknown,

    #[error("a settings update is already in progress")]
    UpdateInProgress,
}

pub type Result<T> = std::result::Result<T, UpdateError>;
