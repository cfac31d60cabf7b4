//! CPU architecture.
//!
//! Release artifacts are published per architecture. The architecture is one
//! half of the [`PlatformKey`](crate::PlatformKey) used to select the correct
//! pre-built archive from a catalog.
//!
//! # Example
//!
//! ```
//! use prebuilt_schema::Arch;
//!
//! let arch: Arch = "aarch64".parse().unwrap();
//! assert_eq!(arch, Arch::Arm64);
//! assert_eq!(arch.to_string(), "arm64");
//! ```

/// CPU architecture of a host or of a release artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (Apple Silicon, Graviton, Raspberry Pi 4+)
    Arm64,
    /// `x86_64` / AMD64
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    /// Map a Rust target architecture name (`std::env::consts::ARCH`).
    pub fn from_rust_name(name: &str) -> Option<Self> {
        match name {
            "aarch64" => Some(Self::Arm64),
            "x86_64" => Some(Self::X86_64),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}
