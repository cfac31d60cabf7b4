//! Catalog file parsing.
//!
//! A catalog file is a TOML document describing one package and one or more
//! of its releases. Every release is validated into a
//! [`ReleaseCatalog`] when the file is loaded, so a malformed table is
//! rejected before anything is resolved or fetched.
//!
//! ```toml
//! default_version = "v0.1.29"
//!
//! [package]
//! name = "vi-mongo"
//! description = "Terminal User Interface for MongoDB"
//!
//! [[release]]
//! version = "v0.1.29"
//!
//! [[release.artifact]]
//! os = "macos"
//! arch = "arm64"
//! url = "https://github.com/kopecmaciej/vi-mongo/releases/download/v0.1.29/vi-mongo_Darwin_arm64.tar.gz"
//! sha256 = "39579534da44bd67f52509dfa1ec9132d7774a95ab3303c81260bc160696ab90"
//! ```

use std::path::{Path, PathBuf};

use prebuilt_schema::{
    Arch, ArtifactEntry, ArtifactFormat, ArtifactLocation, CatalogError, OsFamily, PackageMeta,
    PlatformKey, ReleaseCatalog, Sha256Digest,
};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a catalog file.
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    /// The file could not be read.
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or does not match the schema.
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    /// An artifact row names an unknown OS or architecture.
    #[error("Release {version}, artifact #{index}: {reason}")]
    InvalidArtifact {
        /// Release version.
        version: String,
        /// 1-based position of the artifact within the release.
        index: usize,
        /// What was wrong.
        reason: String,
    },

    /// A release violates a catalog invariant.
    #[error(transparent)]
    Invalid(#[from] CatalogError),

    /// The file declares no releases.
    #[error("Catalog for {0} declares no releases")]
    NoReleases(String),

    /// The same version appears twice.
    #[error("Release {0} is declared more than once")]
    DuplicateVersion(String),

    /// `default_version` is missing and more than one release is declared.
    #[error("Catalog declares several releases but no default_version")]
    NoDefaultVersion,

    /// A requested version is not in the file.
    #[error("Release {requested} not found (available: {})", .available.join(", "))]
    UnknownVersion {
        /// Requested version.
        requested: String,
        /// Versions declared in the file.
        available: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDoc {
    default_version: Option<String>,
    package: PackageMeta,
    #[serde(default, rename = "release")]
    releases: Vec<ReleaseDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReleaseDoc {
    version: String,
    #[serde(default, rename = "artifact")]
    artifacts: Vec<ArtifactDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactDoc {
    os: String,
    arch: String,
    url: ArtifactLocation,
    sha256: Sha256Digest,
    format: Option<ArtifactFormat>,
}

impl ArtifactDoc {
    fn into_entry(self, version: &str, index: usize) -> Result<ArtifactEntry, CatalogLoadError> {
        let invalid = |reason: String| CatalogLoadError::InvalidArtifact {
            version: version.to_string(),
            index,
            reason,
        };
        let os: OsFamily = self.os.parse().map_err(invalid)?;
        let arch: Arch = self.arch.parse().map_err(invalid)?;

        let entry = ArtifactEntry::new(PlatformKey::new(os, arch), self.url, self.sha256);
        Ok(match self.format {
            Some(format) => entry.with_format(format),
            None => entry,
        })
    }
}

/// A parsed and validated catalog file.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    default_version: String,
    releases: Vec<ReleaseCatalog>,
}

impl CatalogFile {
    /// Read and validate a catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError`] if the file cannot be read, parsed, or
    /// any release in it violates a catalog invariant.
    pub async fn load(path: &Path) -> Result<Self, CatalogLoadError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| CatalogLoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

        tracing::debug!(path = %path.display(), "loaded catalog");
        Self::from_toml_str(&content)
    }

    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// See [`CatalogFile::load`].
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogLoadError> {
        let doc: CatalogDoc = toml::from_str(content)?;

        if doc.releases.is_empty() {
            return Err(CatalogLoadError::NoReleases(doc.package.name));
        }

        let mut releases: Vec<ReleaseCatalog> = Vec::with_capacity(doc.releases.len());
        for release in doc.releases {
            if releases.iter().any(|r| r.version() == release.version) {
                return Err(CatalogLoadError::DuplicateVersion(release.version));
            }

            let entries = release
                .artifacts
                .into_iter()
                .enumerate()
                .map(|(i, a)| a.into_entry(&release.version, i + 1))
                .collect::<Result<Vec<_>, _>>()?;

            releases.push(ReleaseCatalog::new(
                doc.package.clone(),
                release.version,
                entries,
            )?);
        }

        let default_version = match doc.default_version {
            Some(v) => v,
            None if releases.len() == 1 => releases[0].version().to_string(),
            None => return Err(CatalogLoadError::NoDefaultVersion),
        };

        let file = Self {
            default_version,
            releases,
        };
        // A default that names a missing release is a load error, not a
        // lookup error later on.
        file.release(None)?;
        Ok(file)
    }

    /// Version installed when none is requested.
    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// All declared versions, in file order.
    pub fn versions(&self) -> Vec<&str> {
        self.releases.iter().map(ReleaseCatalog::version).collect()
    }

    /// All releases, in file order.
    pub fn releases(&self) -> &[ReleaseCatalog] {
        &self.releases
    }

    /// Select a release by exact version, or the default when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError::UnknownVersion`] if no release matches.
    pub fn release(&self, version: Option<&str>) -> Result<&ReleaseCatalog, CatalogLoadError> {
        let requested = version.unwrap_or(&self.default_version);
        self.releases
            .iter()
            .find(|r| r.version() == requested)
            .ok_or_else(|| CatalogLoadError::UnknownVersion {
                requested: requested.to_string(),
                available: self.versions().into_iter().map(String::from).collect(),
            })
    }
}
