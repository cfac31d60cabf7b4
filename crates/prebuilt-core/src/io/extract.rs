//! Archive extraction module
//!
//! Handles tar.gz, tar.zst, tar and zip archives. Entries whose path would
//! land outside the extraction root are rejected.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use prebuilt_schema::ArtifactFormat;
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

/// Errors raised while unpacking an archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Read or write failure (includes corrupt compressed streams).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An entry path escapes the extraction root.
    #[error("Unsafe path in archive: {0}")]
    UnsafePath(String),

    /// Structural archive error.
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

impl ExtractedFile {
    /// Final path component as a string.
    pub fn file_name(&self) -> Option<&str> {
        self.relative_path.file_name().and_then(|n| n.to_str())
    }
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// Extract a tar.zst archive to a destination directory
pub fn extract_tar_zst(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let zstd_decoder = ZstdDecoder::new(reader)?;

    extract_tar(zstd_decoder, dest_dir)
}

/// Reject absolute paths and `..` components.
fn sanitize(path: &Path) -> Result<PathBuf, ExtractError> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::UnsafePath(path.display().to_string()));
            }
        }
    }
    Ok(clean)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = sanitize(&entry.path()?)?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        // Links and special files are never install candidates.
        if !entry_type.is_file() {
            tracing::debug!(path = %relative_path.display(), "skipping non-regular tar entry");
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        entry.unpack(&absolute_path)?;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let relative_path = file
            .enclosed_name()
            .ok_or_else(|| ExtractError::UnsafePath(file.name().to_string()))?;

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        if file.is_symlink() {
            tracing::debug!(path = %relative_path.display(), "skipping zip symlink");
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

/// Extract an archive of the given format.
///
/// A [`ArtifactFormat::Binary`] artifact is copied into `dest_dir` under
/// `binary_name`.
pub fn extract(
    archive_path: &Path,
    format: ArtifactFormat,
    dest_dir: &Path,
    binary_name: &str,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    match format {
        ArtifactFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
        ArtifactFormat::TarZst => extract_tar_zst(archive_path, dest_dir),
        ArtifactFormat::Tar => {
            let file = File::open(archive_path)?;
            extract_tar(BufReader::new(file), dest_dir)
        }
        ArtifactFormat::Zip => extract_zip(archive_path, dest_dir),
        ArtifactFormat::Binary => {
            fs::create_dir_all(dest_dir)?;
            let relative_path = sanitize(Path::new(binary_name))?;
            let dest_path = dest_dir.join(&relative_path);
            fs::copy(archive_path, &dest_path)?;

            Ok(vec![ExtractedFile {
                relative_path,
                absolute_path: dest_path,
            }])
        }
    }
}
