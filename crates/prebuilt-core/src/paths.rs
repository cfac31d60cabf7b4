//! Well-known locations under the prebuilt home directory.
//!
//! ```text
//! ~/.prebuilt/
//! ├── bin/           # Installed executables
//! ├── tmp/           # Download and extraction scratch space
//! └── catalog.toml   # Default release catalog
//! ```

use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "PREBUILT_HOME";

/// Returns the prebuilt home directory, or None if the user's home cannot be resolved.
pub fn try_prebuilt_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".prebuilt"))
}

/// Binary installation target: `<home>/bin`
pub fn bin_path(home: &Path) -> PathBuf {
    home.join("bin")
}

/// Temp path: `<home>/tmp`
///
/// Kept under the home directory so that scratch files usually share a
/// volume with `bin/`.
pub fn tmp_path(home: &Path) -> PathBuf {
    home.join("tmp")
}

/// Default catalog location: `<home>/catalog.toml`
pub fn default_catalog_path(home: &Path) -> PathBuf {
    home.join("catalog.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let home = Path::new("/opt/prebuilt");
        assert_eq!(bin_path(home), Path::new("/opt/prebuilt/bin"));
        assert_eq!(tmp_path(home), Path::new("/opt/prebuilt/tmp"));
        assert_eq!(
            default_catalog_path(home),
            Path::new("/opt/prebuilt/catalog.toml")
        );
    }
}
