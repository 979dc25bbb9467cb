//! Static installer configuration
//!
//! Mirror ranking, artifact names, and timing knobs. The source list is
//! consulted strictly in order -- first entry wins, no load balancing.

use std::path::PathBuf;
use std::time::Duration;

/// Upstream repository the add-on is published from.
pub const PUBLISHER_REPO: &str = "AuraProject/aura-resources";

/// Remote catalog endpoint returning the channel document
/// (`{releases, prereleases, ci_builds}`).
pub const CATALOG_URL: &str = "https://releases.aura-project.app/catalog.json";

/// Filename of the primary bundle (the patched application archive).
pub const PRIMARY_FILENAME: &str = "app-patched.asar";

/// Filename of the archive bundle (themes, scripts, static payload).
pub const ARCHIVE_FILENAME: &str = "aura.zip";

/// Name the primary bundle takes inside the vendor resources directory.
pub const TARGET_PRIMARY_NAME: &str = "app.asar";

/// Directory name the archive payload is unpacked into.
pub const PAYLOAD_DIR_NAME: &str = "aura";

/// A ranked download base. Artifact URLs are `{base}/{tag}/{filename}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSource {
    pub base: String,
}

impl DownloadSource {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Full URL for one artifact of one release tag.
    pub fn artifact_url(&self, tag: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.base.trim_end_matches('/'), tag, filename)
    }
}

/// Everything the orchestration layer needs to know up front.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Remote catalog endpoint.
    pub catalog_url: String,
    /// Mirror bases in priority order (index 0 is tried first).
    pub sources: Vec<DownloadSource>,
    /// Primary bundle filename.
    pub primary_filename: String,
    /// Archive bundle filename.
    pub archive_filename: String,
    /// Glob pattern locating the vendor resources directory.
    pub install_dir_pattern: String,
    /// On-disk catalog cache location.
    pub cache_file: PathBuf,
    /// Staging directory for in-flight downloads.
    pub staging_dir: PathBuf,
    /// Bound on the catalog HTTP request.
    pub catalog_timeout: Duration,
    /// Bound on a single download attempt against a single source.
    pub attempt_timeout: Duration,
    /// Hard deadline for a whole install/uninstall operation.
    pub operation_deadline: Duration,
    /// Window within which a cached catalog is served without refetching.
    pub cache_freshness: Duration,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            catalog_url: CATALOG_URL.to_string(),
            sources: default_sources(),
            primary_filename: PRIMARY_FILENAME.to_string(),
            archive_filename: ARCHIVE_FILENAME.to_string(),
            install_dir_pattern: default_install_dir_pattern(),
            cache_file: crate::catalog_cache_path(),
            staging_dir: crate::staging_path(),
            catalog_timeout: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(60),
            operation_deadline: Duration::from_secs(30 * 60),
            cache_freshness: Duration::from_secs(10 * 60),
        }
    }
}

/// Ranked mirror list. Regional mirrors go first because the canonical
/// host is unreachable or throttled for a large share of users.
fn default_sources() -> Vec<DownloadSource> {
    [
        format!("https://mirror.aura-project.app/{PUBLISHER_REPO}/raw/main"),
        format!("https://fastcdn.aura-project.app/{PUBLISHER_REPO}/raw/main"),
        format!("https://gcore.jsdelivr.net/gh/{PUBLISHER_REPO}"),
        format!("https://testingcf.jsdelivr.net/gh/{PUBLISHER_REPO}"),
        format!("https://github.com/{PUBLISHER_REPO}/raw/main"),
    ]
    .into_iter()
    .map(DownloadSource::new)
    .collect()
}

fn default_install_dir_pattern() -> String {
    if let Ok(pattern) = std::env::var("AURUP_INSTALL_DIR_PATTERN") {
        return pattern;
    }
    #[cfg(windows)]
    {
        r"C:\Program Files (x86)\Classworks\ClassworksService\ClassworksService_*\ClassworksAssistant\resources"
            .to_string()
    }
    #[cfg(not(windows))]
    {
        "/opt/classworks/ClassworksService_*/ClassworksAssistant/resources".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url_joins_tag_and_filename() {
        let src = DownloadSource::new("https://mirror.example.com/repo/raw/main");
        assert_eq!(
            src.artifact_url("v1.2.0", "aura.zip"),
            "https://mirror.example.com/repo/raw/main/v1.2.0/aura.zip"
        );
    }

    #[test]
    fn test_artifact_url_trims_trailing_slash() {
        let src = DownloadSource::new("https://mirror.example.com/base/");
        assert_eq!(
            src.artifact_url("v1", "a.asar"),
            "https://mirror.example.com/base/v1/a.asar"
        );
    }

    #[test]
    fn test_default_sources_are_ranked() {
        let sources = default_sources();
        assert!(sources.len() >= 2);
        // Canonical host is the last resort.
        assert!(sources.last().unwrap().base.starts_with("https://github.com/"));
    }
}
