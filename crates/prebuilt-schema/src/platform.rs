//! Host platform detection.
//!
//! A [`PlatformKey`] is the composite `(os_family, arch)` value that keys a
//! release catalog. It is derived once per run from the running host and is
//! never persisted.

use crate::Arch;
use thiserror::Error;

/// Operating-system family of a host or of a release artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Apple macOS
    Macos,
    /// Linux (any distribution)
    Linux,
    /// Microsoft Windows
    Windows,
    /// FreeBSD
    Freebsd,
}

impl OsFamily {
    /// Map a Rust target OS name (`std::env::consts::OS`).
    pub fn from_rust_name(name: &str) -> Option<Self> {
        match name {
            "macos" => Some(Self::Macos),
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            "freebsd" => Some(Self::Freebsd),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Freebsd => "freebsd",
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" | "macosx" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            "windows" | "win" => Ok(Self::Windows),
            "freebsd" => Ok(Self::Freebsd),
            _ => Err(format!("Unknown operating system: {s}")),
        }
    }
}

/// Errors raised while determining the host platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// `std::env::consts` reported an OS or architecture we have no mapping for.
    #[error("Unsupported host: os={os}, arch={arch}")]
    UnknownHost {
        /// Raw OS name reported by the host.
        os: String,
        /// Raw architecture name reported by the host.
        arch: String,
    },

    /// A `os/arch` string could not be parsed.
    #[error("Invalid platform '{input}': {reason}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Composite `(os_family, arch)` key used to select a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformKey {
    /// Operating-system family.
    pub os: OsFamily,
    /// CPU architecture.
    pub arch: Arch,
}

impl PlatformKey {
    /// Build a key from its parts.
    pub const fn new(os: OsFamily, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Inspect the running host.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownHost`] when the OS or architecture has
    /// no mapping. This is a configuration error and must be reported before
    /// any network activity.
    pub fn detect() -> Result<Self, PlatformError> {
        Self::from_rust_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Build a key from Rust target names (`linux`, `aarch64`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownHost`] if either name is unknown.
    pub fn from_rust_names(os: &str, arch: &str) -> Result<Self, PlatformError> {
        match (OsFamily::from_rust_name(os), Arch::from_rust_name(arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(PlatformError::UnknownHost {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl std::str::FromStr for PlatformKey {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| PlatformError::Invalid {
            input: s.to_string(),
            reason,
        };

        let (os, arch) = s
            .split_once('/')
            .ok_or_else(|| invalid("expected <os>/<arch>".to_string()))?;

        Ok(Self {
            os: os.trim().parse().map_err(invalid)?,
            arch: arch.trim().parse().map_err(invalid)?,
        })
    }
}
