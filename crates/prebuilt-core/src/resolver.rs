//! Platform-to-artifact resolution.

use prebuilt_schema::{ArtifactEntry, PlatformKey, ReleaseCatalog};
use thiserror::Error;

/// Errors raised while selecting a catalog entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The catalog has no artifact for the host.
    #[error(
        "No {package} {version} artifact for {platform} (available: {})",
        join(.supported)
    )]
    UnsupportedPlatform {
        /// Package name.
        package: String,
        /// Release version.
        version: String,
        /// The host's platform.
        platform: PlatformKey,
        /// Platforms the release does cover.
        supported: Vec<PlatformKey>,
    },
}

fn join(platforms: &[PlatformKey]) -> String {
    platforms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Select the single entry matching `platform`.
///
/// Catalogs reject duplicate keys when they are built, so an exact match is
/// unambiguous.
///
/// # Errors
///
/// Returns [`ResolveError::UnsupportedPlatform`] when the release has no
/// artifact for `platform`.
pub fn resolve<'a>(
    catalog: &'a ReleaseCatalog,
    platform: &PlatformKey,
) -> Result<&'a ArtifactEntry, ResolveError> {
    catalog
        .get(platform)
        .ok_or_else(|| ResolveError::UnsupportedPlatform {
            package: catalog.package().name.clone(),
            version: catalog.version().to_string(),
            platform: *platform,
            supported: catalog.platforms(),
        })
}
