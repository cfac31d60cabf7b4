//! prebuilt - verified installer for pre-built release artifacts
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Installs one executable from a release catalog: the artifact for the
//! running platform is downloaded, checked against its SHA256 digest,
//! unpacked, and the binary is placed in the install prefix.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.prebuilt/
//! ├── bin/           # Installed executables
//! ├── tmp/           # Scratch space, emptied after every run
//! └── catalog.toml   # Default release catalog
//! ```
//!
//! # Configuration
//!
//! Every path setting resolves as flag, then environment variable, then
//! default under `PREBUILT_HOME`.

pub mod cmd;
pub mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use prebuilt_core::io::fetch::DEFAULT_TIMEOUT;
use prebuilt_schema::PlatformKey;
use std::path::PathBuf;

pub use prebuilt_core::paths::*;

/// Version string baked in by `build.rs`.
pub const VERSION: &str = env!("PREBUILT_VERSION");

#[derive(Debug, Parser)]
#[command(name = "prebuilt")]
#[command(
    author,
    version = VERSION,
    about = "prebuilt - verified installer for pre-built release artifacts"
)]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// State directory (default ~/.prebuilt)
    #[arg(long, global = true, env = HOME_ENV, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the catalog is read from.
#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Release catalog (default $PREBUILT_HOME/catalog.toml)
    #[arg(long, env = "PREBUILT_CATALOG", value_name = "PATH")]
    pub catalog: Option<PathBuf>,
}

/// Where the executable is installed.
#[derive(Debug, Clone, Args)]
pub struct PrefixArgs {
    /// Install directory (default $PREBUILT_HOME/bin)
    #[arg(long, env = "PREBUILT_PREFIX", value_name = "DIR")]
    pub prefix: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install the executable for this platform
    #[command(disable_version_flag = true)]
    Install {
        /// Release to install (default: the catalog's default_version)
        #[arg(long = "version", value_name = "VERSION")]
        release: Option<String>,
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        prefix: PrefixArgs,
        /// Install for another platform, e.g. linux/arm64
        #[arg(long, value_name = "OS/ARCH")]
        platform: Option<PlatformKey>,
        /// Download timeout in seconds
        #[arg(
            long,
            env = "PREBUILT_TIMEOUT",
            default_value_t = DEFAULT_TIMEOUT.as_secs(),
            value_name = "SECS",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        timeout: u64,
    },
    /// Show package metadata and available artifacts
    Info {
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Remove the installed executable
    Remove {
        #[command(flatten)]
        catalog: CatalogArgs,
        #[command(flatten)]
        prefix: PrefixArgs,
    },
    /// Compute SHA256 hash of a file (for catalog authoring)
    #[command(hide = true)]
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Paths resolved from flags, environment and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// State directory.
    pub home: PathBuf,
    /// Catalog file.
    pub catalog: PathBuf,
    /// Install directory.
    pub prefix: PathBuf,
}

impl Settings {
    /// Resolve settings, filling unset values from `home`.
    pub fn resolve(
        home: Option<PathBuf>,
        catalog: Option<PathBuf>,
        prefix: Option<PathBuf>,
    ) -> Result<Self> {
        let home = home
            .or_else(try_prebuilt_home)
            .context("Could not determine home directory; set PREBUILT_HOME")?;
        Ok(Self {
            catalog: catalog.unwrap_or_else(|| default_catalog_path(&home)),
            prefix: prefix.unwrap_or_else(|| bin_path(&home)),
            home,
        })
    }

    /// Scratch directory for downloads.
    pub fn tmp_dir(&self) -> PathBuf {
        tmp_path(&self.home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn settings_default_under_home() {
        let settings = Settings::resolve(Some(PathBuf::from("/h")), None, None).unwrap();
        assert_eq!(settings.catalog, PathBuf::from("/h/catalog.toml"));
        assert_eq!(settings.prefix, PathBuf::from("/h/bin"));
        assert_eq!(settings.tmp_dir(), PathBuf::from("/h/tmp"));
    }

    #[test]
    fn explicit_paths_win() {
        let settings = Settings::resolve(
            Some(PathBuf::from("/h")),
            Some(PathBuf::from("/etc/tool.toml")),
            Some(PathBuf::from("/usr/local/bin")),
        )
        .unwrap();
        assert_eq!(settings.catalog, PathBuf::from("/etc/tool.toml"));
        assert_eq!(settings.prefix, PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn install_flags_parse() {
        let cli = Cli::try_parse_from([
            "prebuilt",
            "install",
            "--version",
            "v0.1.28",
            "--platform",
            "linux/arm64",
            "--timeout",
            "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Install {
                release,
                platform,
                timeout,
                ..
            } => {
                assert_eq!(release.as_deref(), Some("v0.1.28"));
                assert_eq!(platform.unwrap().to_string(), "linux/arm64");
                assert_eq!(timeout, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["prebuilt", "install", "--timeout", "0"]).is_err());

        let cli = Cli::try_parse_from(["prebuilt", "install"]).unwrap();
        match cli.command {
            Commands::Install { timeout, .. } => assert_eq!(timeout, DEFAULT_TIMEOUT.as_secs()),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["prebuilt", "install", "--platform", "linux"]).is_err());
    }
}
