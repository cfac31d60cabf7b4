//! Core library for prebuilt.
//!
//! Resolves the release artifact for the running host from a
//! [`ReleaseCatalog`](prebuilt_schema::ReleaseCatalog), fetches it, verifies
//! its SHA256 digest, installs the contained executable and smoke-tests it.
//!
//! ```text
//! Init -> Resolved -> Fetched -> Verified -> Installed -> Tested
//! ```
//!
//! The entry point is [`pipeline::Pipeline`]. Progress is reported through
//! the [`Reporter`] trait so that core logic is not tied to a terminal.

pub mod catalog;
pub mod install;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod reporter;
pub mod resolver;
pub mod smoke;

pub use paths::*;
pub use pipeline::{InstallReport, Pipeline, PipelineError, Stage};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for outbound requests
pub const USER_AGENT: &str = concat!("prebuilt/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// Bytes that do not compress well, so truncating an archive cuts into them.
    pub(crate) fn noise(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_f491;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state.to_le_bytes()[0]
            })
            .collect()
    }

    /// Write a gzip-compressed tar archive of `(path, contents, mode)` entries.
    pub(crate) fn write_tar_gz(dest: &Path, entries: &[(&str, &[u8], u32)]) {
        let file = std::fs::File::create(dest).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }
}
