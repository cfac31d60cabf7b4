//! Release catalog: the declarative `(os, arch) -> (location, digest)` table.
//!
//! A [`ReleaseCatalog`] covers exactly one release version. Its invariants
//! are checked once, in [`ReleaseCatalog::new`]; lookups never have to pick
//! between conflicting entries.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArtifactFormat, ArtifactLocation, PlatformKey, Sha256Digest};

/// Errors raised when a catalog violates its invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The release version string was empty.
    #[error("Release version must not be empty")]
    EmptyVersion,

    /// The catalog declared no artifacts.
    #[error("Release {version} declares no artifacts")]
    NoEntries {
        /// Release version.
        version: String,
    },

    /// Two entries target the same platform.
    #[error("Release {version} has more than one artifact for {platform}")]
    DuplicatePlatform {
        /// Release version.
        version: String,
        /// The duplicated key.
        platform: PlatformKey,
    },

    /// Two entries for different platforms carry the same digest.
    ///
    /// Distinct per-platform binaries cannot hash to the same value, so this
    /// is a data error in the catalog.
    #[error("Release {version}: {first} and {second} share digest {digest}")]
    SharedDigest {
        /// Release version.
        version: String,
        /// Platform of the first entry with this digest.
        first: PlatformKey,
        /// Platform of the later entry with this digest.
        second: PlatformKey,
        /// The shared digest.
        digest: Sha256Digest,
    },

    /// The package name or binary name was empty.
    #[error("Package {0} must not be empty")]
    EmptyField(&'static str),
}

/// Static package metadata carried alongside the artifact table.
///
/// Only `binary` and `smoke_args` influence behaviour; the rest is display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMeta {
    /// Package name (e.g. `vi-mongo`).
    pub name: String,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// Project homepage.
    #[serde(default)]
    pub homepage: String,
    /// File name of the executable inside the archive. Defaults to `name`.
    #[serde(default)]
    pub binary: Option<String>,
    /// Arguments for the post-install smoke test. Defaults to `--version`.
    #[serde(default = "default_smoke_args")]
    pub smoke_args: Vec<String>,
}

fn default_smoke_args() -> Vec<String> {
    vec!["--version".to_string()]
}

impl PackageMeta {
    /// Metadata with only a name; every other field takes its default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            homepage: String::new(),
            binary: None,
            smoke_args: default_smoke_args(),
        }
    }

    /// Name of the executable to extract and install.
    pub fn binary_name(&self) -> &str {
        self.binary.as_deref().unwrap_or(&self.name)
    }
}

/// One downloadable artifact for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Platform this artifact runs on.
    pub platform: PlatformKey,
    /// Where to fetch it from.
    pub location: ArtifactLocation,
    /// Expected SHA256 of the fetched bytes.
    pub expected_digest: Sha256Digest,
    /// Archive format.
    pub format: ArtifactFormat,
}

impl ArtifactEntry {
    /// Create an entry, inferring the format from the location's file name.
    pub fn new(
        platform: PlatformKey,
        location: ArtifactLocation,
        expected_digest: Sha256Digest,
    ) -> Self {
        let format = ArtifactFormat::detect(location.file_name());
        Self {
            platform,
            location,
            expected_digest,
            format,
        }
    }

    /// Override the inferred format.
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }
}

/// All artifacts of one release version, keyed by platform.
#[derive(Debug, Clone)]
pub struct ReleaseCatalog {
    package: PackageMeta,
    version: String,
    entries: Vec<ArtifactEntry>,
    by_platform: HashMap<PlatformKey, usize>,
}

impl ReleaseCatalog {
    /// Build a catalog, enforcing its invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for an empty version or package name, an
    /// empty entry list, a platform listed twice, or two platforms sharing a
    /// digest.
    pub fn new(
        package: PackageMeta,
        version: impl Into<String>,
        entries: Vec<ArtifactEntry>,
    ) -> Result<Self, CatalogError> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(CatalogError::EmptyVersion);
        }
        if package.name.trim().is_empty() {
            return Err(CatalogError::EmptyField("name"));
        }
        if package.binary_name().trim().is_empty() {
            return Err(CatalogError::EmptyField("binary"));
        }
        if entries.is_empty() {
            return Err(CatalogError::NoEntries { version });
        }

        let mut by_platform = HashMap::with_capacity(entries.len());
        let mut by_digest: BTreeMap<&Sha256Digest, PlatformKey> = BTreeMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if by_platform.insert(entry.platform, idx).is_some() {
                return Err(CatalogError::DuplicatePlatform {
                    version,
                    platform: entry.platform,
                });
            }
            if let Some(first) = by_digest.insert(&entry.expected_digest, entry.platform) {
                return Err(CatalogError::SharedDigest {
                    version,
                    first,
                    second: entry.platform,
                    digest: entry.expected_digest.clone(),
                });
            }
        }

        Ok(Self {
            package,
            version,
            entries,
            by_platform,
        })
    }

    /// Package metadata.
    pub fn package(&self) -> &PackageMeta {
        &self.package
    }

    /// Release version this catalog describes.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    /// Exact-match lookup by platform.
    pub fn get(&self, platform: &PlatformKey) -> Option<&ArtifactEntry> {
        self.by_platform.get(platform).map(|&idx| &self.entries[idx])
    }

    /// Platforms covered by this release, in declaration order.
    pub fn platforms(&self) -> Vec<PlatformKey> {
        self.entries.iter().map(|e| e.platform).collect()
    }
}
