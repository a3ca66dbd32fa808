//! flashset - set-top-box firmware settings updater.
//!
//! Edits a firmware image through a mtdram scratch device so the box
//! keeps its settings across a flash update, and fronts the external
//! opkg package tool.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;

use flashset::commands::{self, pkg::PkgAction, show::ShowTarget};
use flashset::config::Config;

#[derive(Parser)]
#[command(name = "flashset")]
#[command(about = "Firmware settings updater")]
#[command(
    after_help = "QUICK START:\n  flashset preflight         Check host prerequisites\n  flashset apply image.img   Carry current settings into an image\n  flashset show manifest     Inspect the backup manifest\n  flashset pkg list          List packages via opkg"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the current settings to a firmware image
    Apply {
        /// Firmware image to edit in place
        image: PathBuf,

        /// Don't ask for confirmation and stay quiet
        #[arg(long)]
        yes: bool,
    },

    /// Run preflight checks (verify tools and drivers before an apply)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowWhat,
    },

    /// Package management through opkg
    Pkg {
        #[command(subcommand)]
        action: PkgCommand,
    },
}

#[derive(Subcommand)]
enum ShowWhat {
    /// Show current configuration
    Config,
    /// Show the parsed backup manifest
    Manifest,
}

#[derive(Subcommand)]
enum PkgCommand {
    /// List available packages
    List {
        /// Include development and diagnostic packages
        #[arg(long)]
        all: bool,
    },
    /// Refresh the package feeds
    Update,
    /// Upgrade all upgradable packages
    Upgrade,
    /// Install a package
    Install {
        package: String,
        /// Reinstall even if already installed
        #[arg(long)]
        reinstall: bool,
    },
    /// Remove a package
    Remove { package: String },
    /// Show package details
    Info { package: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load(&base_dir);

    match cli.command {
        Commands::Apply { image, yes } => {
            commands::cmd_apply(&config, &image, yes)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Show { what } => {
            let target = match what {
                ShowWhat::Config => ShowTarget::Config,
                ShowWhat::Manifest => ShowTarget::Manifest,
            };
            commands::cmd_show(&config, target)?;
        }

        Commands::Pkg { action } => {
            let action = match action {
                PkgCommand::List { all } => PkgAction::List { all },
                PkgCommand::Update => PkgAction::Update,
                PkgCommand::Upgrade => PkgAction::Upgrade,
                PkgCommand::Install { package, reinstall } => {
                    PkgAction::Install { package, reinstall }
                }
                PkgCommand::Remove { package } => PkgAction::Remove { package },
                PkgCommand::Info { package } => PkgAction::Info { package },
            };
            commands::cmd_pkg(action)?;
        }
    }

    Ok(())
}
