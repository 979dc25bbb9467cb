//! Mirrored streaming downloads with failover
//!
//! Each artifact is tried against the ranked source list in order; the
//! first fully streamed copy wins. Cancellation is cooperative: it is
//! checked before each source attempt and between body chunks, never
//! mid-chunk.

use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DownloadSource, InstallerConfig};
use crate::ops::error::FailureKind;
use crate::ops::hooks::LifecycleHooks;

/// Per-attempt error, internal to the failover loop.
#[derive(Error, Debug)]
enum AttemptError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cancelled")]
    Cancelled,
}

/// Identifies one file to fetch for a resolved release tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub filename: String,
    pub tag: String,
}

impl ArtifactSpec {
    pub fn new(filename: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            tag: tag.into(),
        }
    }
}

/// Terminal result of an artifact fetch. Never a bare null: callers
/// must handle all three arms, and `Cancelled` is not an error.
#[derive(Debug)]
pub enum DownloadOutcome {
    Success(PathBuf),
    Cancelled,
    Failed(FailureKind),
}

/// Terminal result of fetching the two-artifact release bundle.
#[derive(Debug)]
pub enum BundleOutcome {
    /// Both artifacts landed.
    Complete { primary: PathBuf, archive: PathBuf },
    /// The primary landed but the archive did not; the caller decides
    /// whether a partial result is actionable.
    PrimaryOnly {
        primary: PathBuf,
        archive_failure: FailureKind,
    },
    Cancelled,
    Failed(FailureKind),
}

/// Multi-source streaming downloader with injected progress hooks.
pub struct DownloadOrchestrator {
    client: Client,
    sources: Vec<DownloadSource>,
    primary_filename: String,
    archive_filename: String,
    attempt_timeout: std::time::Duration,
    hooks: LifecycleHooks,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    pub fn new(client: Client, config: &InstallerConfig, hooks: LifecycleHooks) -> Self {
        Self {
            client,
            sources: config.sources.clone(),
            primary_filename: config.primary_filename.clone(),
            archive_filename: config.archive_filename.clone(),
            attempt_timeout: config.attempt_timeout,
            hooks,
        }
    }

    /// Fetch one artifact, failing over across the ranked sources.
    ///
    /// The first fully streamed source short-circuits. Transport errors
    /// move on to the next source; filesystem errors on the destination
    /// are fatal immediately since no other source can fix them. All
    /// sources exhausted yields `Failed(Network)`.
    pub async fn fetch_artifact(
        &self,
        spec: &ArtifactSpec,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        let dest = dest_dir.join(&spec.filename);

        for source in &self.sources {
            if cancel.is_cancelled() {
                info!(artifact = %spec.filename, "download cancelled before attempt");
                return DownloadOutcome::Cancelled;
            }

            let url = source.artifact_url(&spec.tag, &spec.filename);
            debug!(%url, "attempting download");

            match self.stream_to_file(&url, &dest, &spec.filename, cancel).await {
                Ok(()) => {
                    info!(artifact = %spec.filename, %url, "download complete");
                    return DownloadOutcome::Success(dest);
                }
                Err(AttemptError::Cancelled) => {
                    info!(artifact = %spec.filename, "download cancelled mid-stream");
                    remove_partial(&dest).await;
                    return DownloadOutcome::Cancelled;
                }
                Err(AttemptError::Http(err)) => {
                    warn!(artifact = %spec.filename, %url, "source failed: {err}");
                    remove_partial(&dest).await;
                }
                Err(AttemptError::Io(err)) => {
                    warn!(artifact = %spec.filename, "destination unwritable: {err}");
                    remove_partial(&dest).await;
                    return DownloadOutcome::Failed(FailureKind::FileSystem);
                }
            }
        }

        warn!(artifact = %spec.filename, "all download sources exhausted");
        DownloadOutcome::Failed(FailureKind::Network)
    }

    /// Fetch the release bundle for one tag: primary first, then archive.
    ///
    /// A failed or cancelled primary aborts immediately without touching
    /// the archive -- without the primary the archive is useless. An
    /// archive failure after a successful primary still returns the
    /// primary's path alongside the failure.
    pub async fn fetch_release_bundle(
        &self,
        tag: &str,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> BundleOutcome {
        let primary_spec = ArtifactSpec::new(self.primary_filename.clone(), tag);
        let primary = match self.fetch_artifact(&primary_spec, dest_dir, cancel).await {
            DownloadOutcome::Success(path) => path,
            DownloadOutcome::Cancelled => return BundleOutcome::Cancelled,
            DownloadOutcome::Failed(kind) => return BundleOutcome::Failed(kind),
        };

        let archive_spec = ArtifactSpec::new(self.archive_filename.clone(), tag);
        match self.fetch_artifact(&archive_spec, dest_dir, cancel).await {
            DownloadOutcome::Success(archive) => BundleOutcome::Complete { primary, archive },
            DownloadOutcome::Cancelled => BundleOutcome::Cancelled,
            DownloadOutcome::Failed(kind) => BundleOutcome::PrimaryOnly {
                primary,
                archive_failure: kind,
            },
        }
    }

    /// One bounded streaming attempt against one source.
    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        artifact_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .timeout(self.attempt_timeout)
            .send()
            .await?
            .error_for_status()?;

        // 0 means "unknown" all the way to the observer.
        let total_size = response.content_length().unwrap_or(0);
        let mut stream = response.bytes_stream();
        let mut file = File::create(dest).await?;
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                // Dropping the stream aborts the connection.
                return Err(AttemptError::Cancelled);
            }
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            self.hooks
                .download_progress(downloaded, total_size, artifact_name);
        }

        file.flush().await?;
        Ok(())
    }
}

async fn remove_partial(dest: &Path) {
    let _ = tokio::fs::remove_file(dest).await;
}
