//! Install pipeline typestate.
//!
//! Each stage consumes the previous stage's output, so nothing can be
//! extracted before it has been verified:
//!
//! ```text
//! Pipeline --[resolve()]--> ResolvedArtifact --[fetch()]--> FetchedArtifact
//!          --[verify()]--> VerifiedArtifact --[install()]--> InstalledBinary
//! ```
//!
//! The scratch directory lives in a [`TempDir`] owned by the artifact
//! states, so every error path and every dropped future cleans it up.
//!
//! # Usage
//!
//! ```ignore
//! let pipeline = Pipeline::new(&release, host, fetcher, installer, reporter, tmp_path(&home));
//! let report = pipeline.run().await?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use prebuilt_schema::{ArtifactEntry, PlatformKey, ReleaseCatalog, Sha256Digest};
use tempfile::TempDir;
use thiserror::Error;

use crate::Reporter;
use crate::install::{InstallError, InstalledBinary, Installer};
use crate::io::fetch::{FetchError, Fetcher};
use crate::io::verify::{self, IntegrityError};
use crate::resolver::{self, ResolveError};
use crate::smoke::{SmokeOutcome, SmokeTester};

/// A step of the install pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Choosing the catalog entry for the host.
    Resolve,
    /// Downloading the artifact.
    Fetch,
    /// Checking the artifact digest.
    Verify,
    /// Extracting and placing the executable.
    Install,
    /// Running the installed executable.
    SmokeTest,
}

impl Stage {
    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
            Self::Verify => "verify",
            Self::Install => "install",
            Self::SmokeTest => "smoke test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the pipeline stopped.
#[derive(Error, Debug)]
pub enum PipelineErrorKind {
    /// The catalog has no artifact for the host.
    #[error(transparent)]
    UnsupportedPlatform(#[from] ResolveError),

    /// The artifact could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The artifact digest did not match the catalog.
    #[error(transparent)]
    IntegrityMismatch(#[from] IntegrityError),

    /// The executable could not be installed.
    #[error(transparent)]
    Install(#[from] InstallError),
}

/// A fatal pipeline failure, tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} failed: {kind}")]
pub struct PipelineError {
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying cause.
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    fn new(stage: Stage, kind: impl Into<PipelineErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}

/// Outcome of a pipeline that reached the installed state.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Package name.
    pub package: String,
    /// Installed release version.
    pub version: String,
    /// Catalog entry that was installed.
    pub entry: ArtifactEntry,
    /// The executable on disk.
    pub installed: InstalledBinary,
    /// Smoke test result; a failure here is a warning only.
    pub smoke: SmokeOutcome,
}

/// Everything needed to install one release on one platform.
pub struct Pipeline<'a> {
    catalog: &'a ReleaseCatalog,
    platform: PlatformKey,
    fetcher: Arc<dyn Fetcher>,
    installer: Installer,
    smoke: SmokeTester,
    reporter: Arc<dyn Reporter>,
    tmp_root: PathBuf,
}

impl fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("package", &self.catalog.package().name)
            .field("version", &self.catalog.version())
            .field("platform", &self.platform)
            .field("installer", &self.installer)
            .field("tmp_root", &self.tmp_root)
            .finish_non_exhaustive()
    }
}

impl<'a> Pipeline<'a> {
    /// Build a pipeline. The smoke test uses the package's `smoke_args`.
    ///
    /// `tmp_root` must be on the same filesystem as the install directory.
    pub fn new(
        catalog: &'a ReleaseCatalog,
        platform: PlatformKey,
        fetcher: Arc<dyn Fetcher>,
        installer: Installer,
        reporter: Arc<dyn Reporter>,
        tmp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            platform,
            fetcher,
            installer,
            smoke: SmokeTester::new(catalog.package().smoke_args.clone()),
            reporter,
            tmp_root: tmp_root.into(),
        }
    }

    /// The installer this pipeline writes through.
    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Select the catalog entry for the configured platform.
    ///
    /// Touches neither the network nor the filesystem, so it doubles as a
    /// dry run.
    ///
    /// # Errors
    ///
    /// Fails at [`Stage::Resolve`] if the platform is not in the catalog.
    pub fn resolve(&self) -> Result<ResolvedArtifact<'_>, PipelineError> {
        self.reporter
            .stage(Stage::Resolve, &self.platform.to_string());
        let entry = resolver::resolve(self.catalog, &self.platform)
            .map_err(|e| PipelineError::new(Stage::Resolve, e))?;
        tracing::debug!(
            platform = %self.platform,
            url = %entry.location,
            digest = %entry.expected_digest,
            "resolved artifact"
        );
        Ok(ResolvedArtifact {
            pipeline: self,
            entry,
        })
    }

    /// Run every stage through to the smoke test.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`PipelineError`]. A failed smoke test is not
    /// an error; it is returned in [`InstallReport::smoke`].
    pub async fn run(&self) -> Result<InstallReport, PipelineError> {
        self.reporter.section(&format!(
            "Installing {} {}",
            self.catalog.package().name,
            self.catalog.version()
        ));

        match self.run_stages().await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.reporter.failed(e.stage, &e.kind.to_string());
                Err(e)
            }
        }
    }

    async fn run_stages(&self) -> Result<InstallReport, PipelineError> {
        let resolved = self.resolve()?;
        let entry = resolved.entry.clone();

        let installed = resolved.fetch().await?.verify().await?.install().await?;

        let command = std::iter::once(installed.path.display().to_string())
            .chain(self.smoke.args().iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.reporter.stage(Stage::SmokeTest, &command);
        let smoke = self.smoke.run(&installed.path).await;
        match &smoke {
            SmokeOutcome::Passed { output } if !output.is_empty() => self.reporter.info(output),
            SmokeOutcome::Passed { .. } => {}
            SmokeOutcome::Failed(failed) => self
                .reporter
                .warning(&format!("Smoke test failed: {failed}")),
        }

        Ok(InstallReport {
            package: self.catalog.package().name.clone(),
            version: self.catalog.version().to_string(),
            entry,
            installed,
            smoke,
        })
    }
}

/// State 1: the catalog entry for the host is known.
#[derive(Debug)]
pub struct ResolvedArtifact<'a> {
    pipeline: &'a Pipeline<'a>,
    /// Selected catalog entry.
    pub entry: &'a ArtifactEntry,
}

impl<'a> ResolvedArtifact<'a> {
    /// Download the artifact into a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// Fails at [`Stage::Fetch`] on network or local IO errors.
    pub async fn fetch(self) -> Result<FetchedArtifact<'a>, PipelineError> {
        let p = self.pipeline;
        let fail = |e: FetchError| PipelineError::new(Stage::Fetch, e);

        tokio::fs::create_dir_all(&p.tmp_root)
            .await
            .map_err(|e| fail(e.into()))?;
        let work = tempfile::Builder::new()
            .prefix("prebuilt-")
            .tempdir_in(&p.tmp_root)
            .map_err(|e| fail(e.into()))?;

        let name = match self.entry.location.file_name() {
            "" => "artifact",
            name => name,
        };
        let path = work.path().join(name);

        p.reporter
            .stage(Stage::Fetch, self.entry.location.as_str());
        let bytes = p
            .fetcher
            .fetch(&self.entry.location, &path, p.reporter.as_ref())
            .await
            .map_err(fail)?;
        tracing::debug!(path = %path.display(), bytes, "fetched artifact");

        Ok(FetchedArtifact {
            pipeline: p,
            entry: self.entry,
            work,
            path,
        })
    }
}

/// State 2: the artifact bytes are on disk but not yet trusted.
#[derive(Debug)]
pub struct FetchedArtifact<'a> {
    pipeline: &'a Pipeline<'a>,
    entry: &'a ArtifactEntry,
    work: TempDir,
    path: PathBuf,
}

impl<'a> FetchedArtifact<'a> {
    /// Compare the artifact with the catalog digest.
    ///
    /// # Errors
    ///
    /// Fails at [`Stage::Verify`] on a digest mismatch. The downloaded file
    /// is removed before returning.
    pub async fn verify(self) -> Result<VerifiedArtifact<'a>, PipelineError> {
        self.pipeline
            .reporter
            .stage(Stage::Verify, self.entry.expected_digest.short());
        let digest = verify::verify(&self.path, &self.entry.expected_digest)
            .await
            .map_err(|e| PipelineError::new(Stage::Verify, e))?;

        Ok(VerifiedArtifact {
            pipeline: self.pipeline,
            entry: self.entry,
            work: self.work,
            path: self.path,
            digest,
        })
    }
}

/// State 3: the artifact matches the catalog digest.
#[derive(Debug)]
pub struct VerifiedArtifact<'a> {
    pipeline: &'a Pipeline<'a>,
    entry: &'a ArtifactEntry,
    work: TempDir,
    path: PathBuf,
    digest: Sha256Digest,
}

impl VerifiedArtifact<'_> {
    /// Extract the artifact and place the executable.
    ///
    /// # Errors
    ///
    /// Fails at [`Stage::Install`] if extraction or placement fails. The
    /// previous install, if any, is left untouched.
    pub async fn install(self) -> Result<InstalledBinary, PipelineError> {
        let installer = self.pipeline.installer.clone();
        let format = self.entry.format;
        self.pipeline
            .reporter
            .stage(Stage::Install, &installer.target().display().to_string());

        let Self {
            work, path, digest, ..
        } = self;
        // The scratch directory moves into the blocking task so it outlives
        // extraction even if this future is dropped.
        let result = tokio::task::spawn_blocking(move || {
            let installed = installer.install(&path, format, &digest, work.path());
            drop(work);
            installed
        })
        .await
        .map_err(|e| InstallError::Io(std::io::Error::other(e)))
        .and_then(|r| r);

        result.map_err(|e| PipelineError::new(Stage::Install, e))
    }
}
