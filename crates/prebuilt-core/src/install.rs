//! Placing a verified executable on disk.
//!
//! The executable is staged in a [`NamedTempFile`] inside the target
//! directory, marked executable, synced, then renamed over the target. A
//! failure at any step leaves whatever was there before.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use prebuilt_schema::{ArtifactFormat, Sha256Digest};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::io::extract::{self, ExtractError, ExtractedFile};

/// Errors raised while installing or removing the executable.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The archive could not be unpacked.
    #[error("Failed to extract artifact: {0}")]
    Extract(#[from] ExtractError),

    /// No extracted file has the expected name.
    #[error("Archive does not contain '{binary}' (found: {})", .found.join(", "))]
    MissingExecutable {
        /// Expected executable name.
        binary: String,
        /// Relative paths of every extracted file.
        found: Vec<String>,
    },

    /// More than one extracted file has the expected name.
    #[error("Archive contains several files named '{binary}': {}", .candidates.join(", "))]
    AmbiguousExecutable {
        /// Expected executable name.
        binary: String,
        /// Relative paths of the matches.
        candidates: Vec<String>,
    },

    /// The selected executable is empty.
    #[error("Executable '{0}' in archive is empty")]
    EmptyExecutable(String),

    /// `remove` found nothing at the target.
    #[error("{} is not installed", .0.display())]
    NotInstalled(PathBuf),

    /// Filesystem failure (permissions, disk space).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The executable as it sits on disk after installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary {
    /// Final location.
    pub path: PathBuf,
    /// Digest of the artifact it came from.
    pub digest_of_archive: Sha256Digest,
    /// Size of the executable in bytes.
    pub size: u64,
}

/// Installs one named executable into one directory.
#[derive(Debug, Clone)]
pub struct Installer {
    bin_dir: PathBuf,
    binary: String,
}

impl Installer {
    /// An installer that places `binary` in `bin_dir`.
    pub fn new(bin_dir: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            binary: binary.into(),
        }
    }

    /// Directory the executable is installed into.
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Name of the executable.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Full path of the installed executable.
    pub fn target(&self) -> PathBuf {
        self.bin_dir.join(&self.binary)
    }

    /// Whether something is already installed at [`Installer::target`].
    pub fn is_installed(&self) -> bool {
        self.target().is_file()
    }

    /// Unpack `artifact` into `work_dir` and install the executable.
    ///
    /// This is blocking; run it on a blocking thread from async code.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] if extraction fails, the executable cannot
    /// be identified, or it cannot be written to the target directory.
    pub fn install(
        &self,
        artifact: &Path,
        format: ArtifactFormat,
        digest: &Sha256Digest,
        work_dir: &Path,
    ) -> Result<InstalledBinary, InstallError> {
        let extract_dir = work_dir.join("extract");
        let files = extract::extract(artifact, format, &extract_dir, &self.binary)?;
        tracing::debug!(count = files.len(), dir = %extract_dir.display(), "extracted artifact");

        let source = self.select(&files)?;
        if fs::metadata(&source.absolute_path)?.len() == 0 {
            return Err(InstallError::EmptyExecutable(
                source.relative_path.display().to_string(),
            ));
        }

        let path = self.place(&source.absolute_path)?;
        let size = fs::metadata(&path)?.len();
        tracing::debug!(path = %path.display(), size, "installed executable");

        Ok(InstalledBinary {
            path,
            digest_of_archive: digest.clone(),
            size,
        })
    }

    fn select<'a>(&self, files: &'a [ExtractedFile]) -> Result<&'a ExtractedFile, InstallError> {
        let matches: Vec<&ExtractedFile> = files
            .iter()
            .filter(|f| f.file_name() == Some(self.binary.as_str()))
            .collect();

        match matches.as_slice() {
            [one] => Ok(*one),
            [] => Err(InstallError::MissingExecutable {
                binary: self.binary.clone(),
                found: files
                    .iter()
                    .map(|f| f.relative_path.display().to_string())
                    .collect(),
            }),
            many => Err(InstallError::AmbiguousExecutable {
                binary: self.binary.clone(),
                candidates: many
                    .iter()
                    .map(|f| f.relative_path.display().to_string())
                    .collect(),
            }),
        }
    }

    /// Copy `source` to the target through a synced temp file and rename.
    fn place(&self, source: &Path) -> Result<PathBuf, InstallError> {
        fs::create_dir_all(&self.bin_dir)?;

        let mut staged = tempfile::Builder::new()
            .prefix(&format!(".{}-", self.binary))
            .tempfile_in(&self.bin_dir)?;
        copy_into(source, &mut staged)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o755))?;
        }

        staged.as_file().sync_all()?;

        let target = self.target();
        staged.persist(&target).map_err(|e| InstallError::Io(e.error))?;
        Ok(target)
    }

    /// Delete the installed executable.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::NotInstalled`] if there is nothing at the
    /// target.
    pub fn remove(&self) -> Result<PathBuf, InstallError> {
        let target = self.target();
        match fs::remove_file(&target) {
            Ok(()) => {
                tracing::debug!(path = %target.display(), "removed executable");
                Ok(target)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(InstallError::NotInstalled(target)),
            Err(e) => Err(e.into()),
        }
    }
}

fn copy_into(source: &Path, staged: &mut NamedTempFile) -> io::Result<()> {
    let mut reader = fs::File::open(source)?;
    io::copy(&mut reader, staged)?;
    staged.flush()
}
