//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `apply` - Apply current settings to a firmware image
//! - `preflight` - Check host prerequisites
//! - `show` - Display configuration and manifest
//! - `pkg` - Package management through opkg

pub mod apply;
pub mod pkg;
pub mod preflight;
pub mod show;

pub use apply::cmd_apply;
pub use pkg::cmd_pkg;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
