//! Flashset library exports.
//!
//! The binary is a thin CLI over these modules; integration tests drive
//! the same components directly.

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod mtd;
pub mod mtdram;
pub mod opkg;
pub mod paths;
pub mod preflight;
pub mod process;
pub mod pump;
pub mod transfer;
pub mod ui;
pub mod update;
