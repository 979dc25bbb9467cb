//! Installation session state machine
//!
//! Owns the current state and the one in-flight operation. Intents are
//! validated against the state before anything is spawned, giving
//! single-flight by construction: a rejected intent performs no state
//! change and starts no background work.
//!
//! State is written only from the interactive thread -- background
//! contexts produce outcome values and read the cancellation token,
//! nothing else -- so there is no lock discipline to get wrong.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::InstallerConfig;
use crate::core::catalog::{Channel, VersionCatalog};
use crate::core::resolver::VersionCatalogResolver;
use crate::io::download::{BundleOutcome, DownloadOrchestrator};
use crate::io::extract;
use crate::ops::engine::{EngineError, InstallEngine, InstallRequest, UninstallOptions};
use crate::ops::error::{FailureKind, OperationKind, OperationOutcome};
use crate::ops::hooks::LifecycleHooks;
use crate::ops::scheduler::{SessionEvent, TaskScheduler};

/// Session lifecycle states. Every long operation leaves through
/// `Ready`; there is no stuck terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LoadingVersions,
    Ready,
    Installing,
    Uninstalling,
    Cancelling,
}

/// Why an intent was rejected. Rejection is a no-op: no state change,
/// no background work.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntentError {
    #[error("another operation is in progress")]
    Busy,

    #[error("uninstall requires explicit confirmation")]
    NotConfirmed,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("no version available in the selected channel")]
    NoSelection,
}

/// What the user asked to install, and where.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub channel: Channel,
    pub install_dir: Option<PathBuf>,
}

enum ResolvedSelection {
    Tag(String),
    Local(PathBuf),
}

/// The asynchronous installation-orchestration session.
pub struct InstallationSession {
    state: SessionState,
    catalog: Option<VersionCatalog>,
    config: InstallerConfig,
    scheduler: TaskScheduler,
    resolver: Arc<VersionCatalogResolver>,
    orchestrator: Arc<DownloadOrchestrator>,
    engine: Arc<dyn InstallEngine>,
    hooks: LifecycleHooks,
    cancel: Option<CancellationToken>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl std::fmt::Debug for InstallationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationSession")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl InstallationSession {
    /// Build a session around an engine. Starts `Idle`; call
    /// [`refresh_versions`](Self::refresh_versions) to load the catalog.
    pub fn new(
        handle: tokio::runtime::Handle,
        config: InstallerConfig,
        engine: Arc<dyn InstallEngine>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        let (events_tx, events_rx) = mpsc::channel();

        // Forward streaming progress straight onto the event channel;
        // the interactive loop is the only consumer.
        let hooks = LifecycleHooks::new();
        let progress_tx = events_tx.clone();
        hooks.set_download_progress(move |downloaded, total, artifact| {
            let _ = progress_tx.send(SessionEvent::Progress {
                downloaded,
                total,
                artifact: artifact.to_string(),
            });
        });

        let resolver = Arc::new(VersionCatalogResolver::new(client.clone(), &config));
        let orchestrator = Arc::new(DownloadOrchestrator::new(client, &config, hooks.clone()));
        let scheduler = TaskScheduler::new(handle, events_tx);

        Ok(Self {
            state: SessionState::Idle,
            catalog: None,
            config,
            scheduler,
            resolver,
            orchestrator,
            engine,
            hooks,
            cancel: None,
            events_rx,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn catalog(&self) -> Option<&VersionCatalog> {
        self.catalog.as_ref()
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    /// Load (or reload) the version catalog. `force` bypasses and
    /// invalidates the cache. Rejected while an operation or another
    /// load is in flight.
    pub fn refresh_versions(&mut self, force: bool) -> Result<(), IntentError> {
        match self.state {
            SessionState::Idle | SessionState::Ready => {
                self.state = SessionState::LoadingVersions;
                let resolver = self.resolver.clone();
                self.scheduler
                    .run_resolution(async move { resolver.resolve(force).await });
                Ok(())
            }
            _ => Err(IntentError::Busy),
        }
    }

    /// Begin an install. Rejected unless the session is `Ready`.
    pub fn start_install(&mut self, options: InstallOptions) -> Result<(), IntentError> {
        if self.state != SessionState::Ready {
            return Err(IntentError::Busy);
        }
        let selection = self.resolve_selection(&options)?;

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.state = SessionState::Installing;
        info!("install started");

        let future = run_install(
            self.orchestrator.clone(),
            self.engine.clone(),
            self.config.staging_dir.clone(),
            selection,
            options.install_dir,
            self.scheduler.event_sender(),
            cancel,
        );
        self.scheduler.run_operation(
            OperationKind::Install,
            Some(self.config.operation_deadline),
            future,
        );
        Ok(())
    }

    /// Begin an uninstall. Requires `options.confirmed`; confirmation
    /// itself is the observer's concern.
    pub fn start_uninstall(&mut self, options: UninstallOptions) -> Result<(), IntentError> {
        if self.state != SessionState::Ready {
            return Err(IntentError::Busy);
        }
        if !options.confirmed {
            return Err(IntentError::NotConfirmed);
        }

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.state = SessionState::Uninstalling;
        info!("uninstall started");

        let engine = self.engine.clone();
        let status = self.scheduler.event_sender();
        let future = async move {
            let _ = status.send(SessionEvent::Status("Uninstalling".to_string()));
            if cancel.is_cancelled() {
                return OperationOutcome::Cancelled;
            }
            match engine.uninstall(&options).await {
                Ok(()) => OperationOutcome::Success("Uninstall complete".to_string()),
                Err(EngineError::Cancelled) => OperationOutcome::Cancelled,
                Err(err) => OperationOutcome::Failed(FailureKind::Engine(err.to_string())),
            }
        };
        self.scheduler.run_operation(
            OperationKind::Uninstall,
            Some(self.config.operation_deadline),
            future,
        );
        Ok(())
    }

    /// Request cancellation of the in-flight operation. A no-op unless
    /// one is active; honored cooperatively at the next checkpoint.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            SessionState::Installing | SessionState::Uninstalling => {
                if let Some(token) = &self.cancel {
                    token.cancel();
                }
                self.state = SessionState::Cancelling;
                info!("cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Pump one event from the background contexts, applying any state
    /// transition it implies. This is the interactive loop's single
    /// dispatch point.
    pub fn poll_event(&mut self, timeout: Duration) -> Option<SessionEvent> {
        let event = self.events_rx.recv_timeout(timeout).ok()?;
        self.apply(&event);
        Some(event)
    }

    fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::CatalogLoaded(catalog) => {
                // Version loading always reaches Ready: a degraded
                // catalog keeps the manual channels usable.
                self.catalog = Some(catalog.clone());
                self.state = SessionState::Ready;
            }
            SessionEvent::Completed { op, outcome } => {
                match outcome {
                    OperationOutcome::Cancelled => info!(op = op.as_str(), "cancelled"),
                    OperationOutcome::Failed(kind) => {
                        warn!(op = op.as_str(), "failed: {kind}");
                    }
                    OperationOutcome::Success(_) => info!(op = op.as_str(), "succeeded"),
                }
                self.cancel = None;
                self.state = SessionState::Ready;
            }
            SessionEvent::Progress { .. } | SessionEvent::Status(_) => {}
        }
    }

    /// Turn the selected channel into a concrete tag or local path.
    fn resolve_selection(&self, options: &InstallOptions) -> Result<ResolvedSelection, IntentError> {
        match &options.channel {
            Channel::CustomTag(tag) => {
                if tag.trim().is_empty() {
                    return Err(IntentError::InvalidOptions(
                        "custom version tag is empty".to_string(),
                    ));
                }
                Ok(ResolvedSelection::Tag(tag.clone()))
            }
            Channel::LocalArtifact(path) => {
                if !path.exists() {
                    return Err(IntentError::InvalidOptions(format!(
                        "local artifact does not exist: {}",
                        path.display()
                    )));
                }
                Ok(ResolvedSelection::Local(path.clone()))
            }
            channel => {
                let catalog = self.catalog.as_ref().ok_or(IntentError::NoSelection)?;
                catalog
                    .latest_in(channel)
                    .map(|entry| ResolvedSelection::Tag(entry.tag.clone()))
                    .ok_or(IntentError::NoSelection)
            }
        }
    }
}

/// The install operation itself, run on a background context. Only ever
/// produces an outcome value; session state is untouched here.
async fn run_install(
    orchestrator: Arc<DownloadOrchestrator>,
    engine: Arc<dyn InstallEngine>,
    staging_dir: PathBuf,
    selection: ResolvedSelection,
    install_dir: Option<PathBuf>,
    status: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) -> OperationOutcome {
    let send_status = |msg: &str| {
        let _ = status.send(SessionEvent::Status(msg.to_string()));
    };

    let request = match selection {
        ResolvedSelection::Local(path) => InstallRequest {
            primary_artifact: path,
            archive_payload: None,
            install_dir,
        },
        ResolvedSelection::Tag(tag) => {
            send_status(&format!("Downloading release {tag}"));

            if let Err(err) = prepare_staging(&staging_dir).await {
                warn!("cannot prepare staging directory: {err}");
                return OperationOutcome::Failed(FailureKind::FileSystem);
            }

            match orchestrator
                .fetch_release_bundle(&tag, &staging_dir, &cancel)
                .await
            {
                BundleOutcome::Complete { primary, archive } => {
                    send_status("Unpacking archive");
                    let payload_dir = staging_dir.join("payload");
                    let unpack = tokio::task::spawn_blocking({
                        let payload_dir = payload_dir.clone();
                        move || extract::extract_archive(&archive, &payload_dir)
                    })
                    .await;
                    match unpack {
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => {
                            warn!("archive extraction failed: {err}");
                            return OperationOutcome::Failed(err.into());
                        }
                        Err(join_err) => {
                            warn!("extraction task panicked: {join_err}");
                            return OperationOutcome::Failed(FailureKind::FileSystem);
                        }
                    }
                    InstallRequest {
                        primary_artifact: primary,
                        archive_payload: Some(payload_dir),
                        install_dir,
                    }
                }
                BundleOutcome::PrimaryOnly {
                    primary,
                    archive_failure,
                } => {
                    // Partial result policy: proceed with the primary
                    // alone and tell the observer the archive is missing.
                    warn!("archive bundle unavailable: {archive_failure}");
                    send_status("Archive bundle unavailable, installing primary only");
                    InstallRequest {
                        primary_artifact: primary,
                        archive_payload: None,
                        install_dir,
                    }
                }
                BundleOutcome::Cancelled => return OperationOutcome::Cancelled,
                BundleOutcome::Failed(kind) => return OperationOutcome::Failed(kind),
            }
        }
    };

    if cancel.is_cancelled() {
        return OperationOutcome::Cancelled;
    }

    send_status("Installing");
    match engine.install(request).await {
        Ok(()) => OperationOutcome::Success("Install complete".to_string()),
        Err(EngineError::Cancelled) => OperationOutcome::Cancelled,
        Err(err) => OperationOutcome::Failed(FailureKind::Engine(err.to_string())),
    }
}

/// Clean and recreate the staging directory before a bundle fetch.
async fn prepare_staging(staging_dir: &std::path::Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(staging_dir).await? {
        tokio::fs::remove_dir_all(staging_dir).await?;
    }
    tokio::fs::create_dir_all(staging_dir).await
}
