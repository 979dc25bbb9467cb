//! aurup - Aura add-on installation orchestrator
//!
//! Resolves which add-on version to install, fetches the release bundle
//! from a ranked list of mirror sources with per-source failover, and
//! hands the artifacts to an install engine -- all off the interactive
//! thread, with progress and terminal outcomes marshaled back over a
//! single event channel.
//!
//! # Architecture
//!
//! - **Tagged outcomes**: long operations finish as
//!   `Success | Cancelled | Failed(kind)` -- cancellation is never an
//!   error and never a sentinel string.
//! - **Single-flight**: [`ops::session::InstallationSession`] guards
//!   every intent so at most one long operation is ever in flight.
//! - **Channel marshaling**: background work only produces values; the
//!   interactive loop is the sole consumer of session events and the
//!   sole writer of session state.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.aurup/
//! └── catalog.json   # last successfully fetched version catalog
//! ```

pub mod config;
pub mod core;
pub mod io;
pub mod ops;

// Re-exports for convenience
pub use crate::core::catalog::{CatalogSource, Channel, VersionCatalog, VersionEntry};
pub use crate::core::resolver::VersionCatalogResolver;
pub use crate::io::download::{ArtifactSpec, BundleOutcome, DownloadOrchestrator, DownloadOutcome};
pub use crate::ops::engine::{InstallEngine, InstallRequest, UninstallOptions};
pub use crate::ops::session::InstallationSession;

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the configuration directory, or None if the user's home cannot be resolved.
pub fn try_aurup_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("AURUP_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".aurup"))
}

/// Returns the canonical aurup home directory (`~/.aurup`). When no
/// home directory is resolvable, state lands on the system temp volume
/// instead of aborting.
pub fn aurup_home() -> PathBuf {
    try_aurup_home().unwrap_or_else(|| std::env::temp_dir().join("aurup"))
}

/// On-disk catalog cache: ~/.aurup/catalog.json
pub fn catalog_cache_path() -> PathBuf {
    aurup_home().join("catalog.json")
}

/// Staging directory for in-flight downloads, on the system temp volume.
pub fn staging_path() -> PathBuf {
    std::env::temp_dir().join("aurup-staging")
}

/// Extract the filename from a URL.
///
/// # Example
///
/// ```
/// use aurup::filename_from_url;
///
/// assert_eq!(filename_from_url("https://example.com/v1.0/bundle.zip"), "bundle.zip");
/// assert_eq!(filename_from_url(""), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

/// User Agent string
pub const USER_AGENT: &str = concat!("aurup/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_honors_env_override() {
        std::env::set_var("AURUP_HOME", "/tmp/aurup-test-home");
        assert_eq!(aurup_home(), PathBuf::from("/tmp/aurup-test-home"));
        assert_eq!(
            catalog_cache_path(),
            PathBuf::from("/tmp/aurup-test-home/catalog.json")
        );
        std::env::remove_var("AURUP_HOME");
    }

    #[test]
    fn test_home_never_panics() {
        // Falls back to the temp volume when no home is resolvable.
        let home = aurup_home();
        assert!(!home.as_os_str().is_empty());
    }
}
