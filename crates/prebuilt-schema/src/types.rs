//! Artifact location and archive format.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Archive or binary format of a downloadable artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Gzip-compressed tar archive (`.tar.gz` / `.tgz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zstandard-compressed tar archive (`.tar.zst`).
    #[serde(rename = "tar.zst")]
    TarZst,
    /// Uncompressed tar archive (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
    /// Standalone executable with no archive wrapper.
    Binary,
}

impl ArtifactFormat {
    /// Detect the format from a file name or URL path.
    pub fn detect(name: &str) -> Self {
        let name = name.to_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Self::TarZst
        } else if name.ends_with(".tar") {
            Self::Tar
        } else if name.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Binary
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::Tar => "tar",
            Self::Zip => "zip",
            Self::Binary => "binary",
        })
    }
}

/// Errors produced when parsing an artifact location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// Not a URL at all.
    #[error("Invalid artifact URL '{input}': {reason}")]
    Parse {
        /// The rejected input.
        input: String,
        /// Parser message.
        reason: String,
    },

    /// A URL with a scheme we cannot fetch from.
    #[error("Unsupported URL scheme '{scheme}' in '{input}' (expected https, http or file)")]
    Scheme {
        /// The rejected input.
        input: String,
        /// The offending scheme.
        scheme: String,
    },

    /// An `http(s)` URL without a host.
    #[error("Artifact URL '{0}' has no host")]
    NoHost(String),
}

/// Where an artifact can be retrieved from.
///
/// Only `https`, `http` and `file` URLs are accepted, so every location held
/// by a catalog is resolvable by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactLocation(Url);

impl ArtifactLocation {
    /// Parse and validate a location.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if the string is not a URL, uses an
    /// unsupported scheme, or is a remote URL without a host.
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let url = Url::parse(input.trim()).map_err(|e| LocationError::Parse {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "https" | "http" => {
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(LocationError::NoHost(input.to_string()));
                }
            }
            "file" => {}
            other => {
                return Err(LocationError::Scheme {
                    input: input.to_string(),
                    scheme: other.to_string(),
                });
            }
        }

        Ok(Self(url))
    }

    /// Location of a file on the local filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Parse`] if `path` is not absolute.
    pub fn from_file_path(path: &Path) -> Result<Self, LocationError> {
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| LocationError::Parse {
                input: path.display().to_string(),
                reason: "path must be absolute".to_string(),
            })
    }

    /// The URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether this is a `file://` location.
    pub fn is_local(&self) -> bool {
        self.0.scheme() == "file"
    }

    /// Filesystem path for `file://` locations.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_local() {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    /// Last path segment, e.g. `vi-mongo_Linux_x86_64.tar.gz`.
    pub fn file_name(&self) -> &str {
        self.0
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
    }
}

impl<'de> Deserialize<'de> for ArtifactLocation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_format() {
        assert_eq!(
            ArtifactFormat::detect("vi-mongo_Darwin_arm64.tar.gz"),
            ArtifactFormat::TarGz
        );
        assert_eq!(ArtifactFormat::detect("tool.TZST"), ArtifactFormat::TarZst);
        assert_eq!(ArtifactFormat::detect("tool.zip"), ArtifactFormat::Zip);
        assert_eq!(ArtifactFormat::detect("tool"), ArtifactFormat::Binary);
    }

    #[test]
    fn location_schemes() {
        let loc = ArtifactLocation::parse(
            "https://github.com/kopecmaciej/vi-mongo/releases/download/v0.1.29/vi-mongo_Linux_x86_64.tar.gz",
        )
        .unwrap();
        assert!(!loc.is_local());
        assert_eq!(loc.file_name(), "vi-mongo_Linux_x86_64.tar.gz");

        assert!(ArtifactLocation::parse("file:///tmp/a.tar.gz").unwrap().is_local());
        assert!(matches!(
            ArtifactLocation::parse("ftp://example.com/a.tar.gz"),
            Err(LocationError::Scheme { .. })
        ));
        assert!(matches!(
            ArtifactLocation::parse("not a url"),
            Err(LocationError::Parse { .. })
        ));
    }
}
