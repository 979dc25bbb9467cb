//! Version catalog: the resolved set of selectable add-on versions.
//!
//! A catalog is produced fresh on every resolve call and never mutated;
//! refreshing supersedes it with a new one. Each channel list is ordered
//! newest-first, so index 0 is the default selection for that channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a resolved catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    /// Fetched from the remote endpoint in this call.
    Remote,
    /// Served from the cached copy of an earlier successful fetch.
    LocalCache,
    /// Nothing fetched and nothing cached; only manual channels work.
    Empty,
}

/// One selectable version within a channel.
///
/// Tags are unique within a single channel list but may coincide across
/// lists; a tag is only meaningful within the channel it was picked from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Release tag, e.g. `v1.2.0`.
    pub tag: String,
    /// Human-readable name shown to the user.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Publication timestamp, when the upstream provides one.
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub published_at: Option<DateTime<Utc>>,
}

/// An unparseable timestamp is the same as a missing one.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

impl VersionEntry {
    /// Render the publication date as `YYYY/MM/DD`, or empty when unknown.
    pub fn published_display(&self) -> String {
        self.published_at
            .map(|t| t.format("%Y/%m/%d").to_string())
            .unwrap_or_default()
    }
}

/// Selection category for an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// Newest stable release.
    Release,
    /// Newest prerelease.
    Prerelease,
    /// Continuous-integration build.
    Ci,
    /// A tag the user typed in; bypasses catalog lookup.
    CustomTag(String),
    /// A local artifact file; bypasses download entirely.
    LocalArtifact(PathBuf),
}

/// The resolved versions across all channels, plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCatalog {
    pub releases: Vec<VersionEntry>,
    pub prereleases: Vec<VersionEntry>,
    pub ci_builds: Vec<VersionEntry>,
    pub data_source: CatalogSource,
}

impl VersionCatalog {
    /// An empty catalog, the terminal fallback when nothing is reachable.
    pub fn empty() -> Self {
        Self {
            releases: Vec::new(),
            prereleases: Vec::new(),
            ci_builds: Vec::new(),
            data_source: CatalogSource::Empty,
        }
    }

    /// Same catalog re-tagged with a different provenance.
    pub fn with_source(mut self, source: CatalogSource) -> Self {
        self.data_source = source;
        self
    }

    /// Default tag policy: highest-priority non-empty channel in order
    /// Release -> Prerelease -> CI. `None` when every list is empty.
    pub fn default_tag(&self) -> Option<&str> {
        [&self.releases, &self.prereleases, &self.ci_builds]
            .into_iter()
            .find_map(|list| list.first())
            .map(|e| e.tag.as_str())
    }

    /// The entries of one catalog channel. Custom channels have none.
    pub fn channel_entries(&self, channel: &Channel) -> &[VersionEntry] {
        match channel {
            Channel::Release => &self.releases,
            Channel::Prerelease => &self.prereleases,
            Channel::Ci => &self.ci_builds,
            Channel::CustomTag(_) | Channel::LocalArtifact(_) => &[],
        }
    }

    /// Newest entry of a catalog channel, if the channel has any.
    pub fn latest_in(&self, channel: &Channel) -> Option<&VersionEntry> {
        self.channel_entries(channel).first()
    }

    /// Look a tag up within a single channel only.
    pub fn entry_for(&self, channel: &Channel, tag: &str) -> Option<&VersionEntry> {
        self.channel_entries(channel).iter().find(|e| e.tag == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty() && self.prereleases.is_empty() && self.ci_builds.is_empty()
    }
}

/// Wire shape of the remote catalog document (also the disk-cache shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub releases: Vec<VersionEntry>,
    #[serde(default)]
    pub prereleases: Vec<VersionEntry>,
    #[serde(default)]
    pub ci_builds: Vec<VersionEntry>,
}

impl CatalogDocument {
    /// Promote the raw document into a catalog with known provenance.
    pub fn into_catalog(self, source: CatalogSource) -> VersionCatalog {
        VersionCatalog {
            releases: self.releases,
            prereleases: self.prereleases,
            ci_builds: self.ci_builds,
            data_source: source,
        }
    }
}

impl From<&VersionCatalog> for CatalogDocument {
    fn from(catalog: &VersionCatalog) -> Self {
        Self {
            releases: catalog.releases.clone(),
            prereleases: catalog.prereleases.clone(),
            ci_builds: catalog.ci_builds.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: &str) -> VersionEntry {
        VersionEntry {
            tag: tag.to_string(),
            display_name: format!("Release {tag}"),
            published_at: None,
        }
    }

    fn catalog(releases: &[&str], prereleases: &[&str], ci: &[&str]) -> VersionCatalog {
        VersionCatalog {
            releases: releases.iter().map(|t| entry(t)).collect(),
            prereleases: prereleases.iter().map(|t| entry(t)).collect(),
            ci_builds: ci.iter().map(|t| entry(t)).collect(),
            data_source: CatalogSource::Remote,
        }
    }

    #[test]
    fn test_default_tag_prefers_releases() {
        let c = catalog(&["v2.0", "v1.0"], &["v2.1-rc1"], &["vNightly"]);
        assert_eq!(c.default_tag(), Some("v2.0"));
    }

    #[test]
    fn test_default_tag_falls_through_channels() {
        let c = catalog(&[], &["v2.1-rc1"], &["vNightly"]);
        assert_eq!(c.default_tag(), Some("v2.1-rc1"));

        let c = catalog(&[], &[], &["vNightly"]);
        assert_eq!(c.default_tag(), Some("vNightly"));

        let c = catalog(&[], &[], &[]);
        assert_eq!(c.default_tag(), None);
    }

    #[test]
    fn test_empty_channel_selection_is_none() {
        // A catalog with releases only: selecting the prerelease channel
        // yields no entry rather than crossing into another channel.
        let c = catalog(&["v2.0"], &[], &[]);
        assert_eq!(c.default_tag(), Some("v2.0"));
        assert!(c.latest_in(&Channel::Prerelease).is_none());
    }

    #[test]
    fn test_tag_resolved_only_within_its_channel() {
        let mut c = catalog(&["v1.0"], &[], &[]);
        c.ci_builds.push(entry("v1.0")); // same tag, different channel
        assert!(c.entry_for(&Channel::Release, "v1.0").is_some());
        assert!(c.entry_for(&Channel::Ci, "v1.0").is_some());
        assert!(c.entry_for(&Channel::Prerelease, "v1.0").is_none());
    }

    #[test]
    fn test_published_display() {
        let mut e = entry("v1.0");
        assert_eq!(e.published_display(), "");

        e.published_at = "2025-03-14T09:26:53Z".parse().ok();
        assert_eq!(e.published_display(), "2025/03/14");
    }

    #[test]
    fn test_document_parses_spec_shape() {
        let json = r#"{
            "releases": [{"tag": "v2.0", "name": "Release 2.0", "published_at": "2025-01-02T00:00:00Z"}],
            "prereleases": [],
            "ci_builds": [{"tag": "vAutoBuild", "name": "[CI] Auto Build"}]
        }"#;
        let doc: CatalogDocument = serde_json::from_str(json).unwrap();
        let catalog = doc.into_catalog(CatalogSource::Remote);
        assert_eq!(catalog.default_tag(), Some("v2.0"));
        assert_eq!(catalog.ci_builds[0].display_name, "[CI] Auto Build");
        assert!(catalog.ci_builds[0].published_at.is_none());
    }

    #[test]
    fn test_invalid_published_at_is_treated_as_missing() {
        let json = r#"{"releases": [{"tag": "v1", "name": "One", "published_at": "not-a-date"}]}"#;
        let doc: CatalogDocument = serde_json::from_str(json).unwrap();
        assert!(doc.releases[0].published_at.is_none());
        assert_eq!(doc.releases[0].published_display(), "");
    }

    #[test]
    fn test_document_tolerates_missing_lists() {
        let doc: CatalogDocument = serde_json::from_str(r#"{"releases": []}"#).unwrap();
        let catalog = doc.into_catalog(CatalogSource::LocalCache);
        assert!(catalog.is_empty());
        assert_eq!(catalog.data_source, CatalogSource::LocalCache);
    }
}
