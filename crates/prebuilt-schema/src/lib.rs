//! Shared types for prebuilt.
//!
//! Everything in this crate is plain data: platform keys, content digests and
//! the release catalog model. Side effects (network, filesystem, processes)
//! live in `prebuilt-core`.

pub mod arch;
pub mod catalog;
pub mod hash;
pub mod platform;
pub mod types;

// Re-exports
pub use arch::Arch;
pub use catalog::{ArtifactEntry, CatalogError, PackageMeta, ReleaseCatalog};
pub use hash::{DigestError, Sha256Digest};
pub use platform::{OsFamily, PlatformError, PlatformKey};
pub use types::{ArtifactFormat, ArtifactLocation, LocationError};
