//! Install-engine boundary
//!
//! The session hands resolved artifact paths to an [`InstallEngine`]
//! and interprets its result only as success, failure, or cancellation.
//! [`FsInstallEngine`] is the stock engine: it places the primary
//! artifact and the extracted payload into the vendor's resources
//! directory, keeping a one-time backup of the original file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{InstallerConfig, PAYLOAD_DIR_NAME, TARGET_PRIMARY_NAME};

#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine observed the cancellation signal and stopped.
    #[error("operation cancelled")]
    Cancelled,

    #[error("vendor install directory not found")]
    InstallDirNotFound,

    #[error("original application file is missing; reinstall the vendor application")]
    BackupMissing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the engine needs for one install.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// The primary bundle, already downloaded (or a local file).
    pub primary_artifact: PathBuf,
    /// Extracted payload directory, when the archive bundle landed.
    pub archive_payload: Option<PathBuf>,
    /// Explicit install directory; auto-detected when absent.
    pub install_dir: Option<PathBuf>,
}

/// Options for an uninstall intent. `confirmed` must be set by the
/// observer; the session refuses to start without it.
#[derive(Debug, Clone, Default)]
pub struct UninstallOptions {
    pub keep_user_data: bool,
    pub force: bool,
    pub dry_run: bool,
    pub confirmed: bool,
}

/// Consumes downloaded artifacts. Opaque to the session beyond its
/// success/failure/cancellation result.
#[async_trait]
pub trait InstallEngine: Send + Sync {
    async fn install(&self, request: InstallRequest) -> Result<(), EngineError>;
    async fn uninstall(&self, options: &UninstallOptions) -> Result<(), EngineError>;
}

/// Filesystem engine targeting the vendor resources directory.
#[derive(Debug, Clone)]
pub struct FsInstallEngine {
    install_dir_pattern: String,
}

impl FsInstallEngine {
    pub fn new(config: &InstallerConfig) -> Self {
        Self {
            install_dir_pattern: config.install_dir_pattern.clone(),
        }
    }

    /// Locate the vendor resources directory by glob pattern. The vendor
    /// updater suffixes its install directory with the version, hence
    /// the wildcard; the newest match wins.
    fn detect_install_dir(&self) -> Option<PathBuf> {
        let mut matches: Vec<PathBuf> = glob::glob(&self.install_dir_pattern)
            .ok()?
            .flatten()
            .filter(|p| p.is_dir())
            .collect();
        matches.sort();
        matches.pop()
    }

    fn resolve_install_dir(&self, explicit: Option<&Path>) -> Result<PathBuf, EngineError> {
        if let Some(dir) = explicit {
            if dir.is_dir() {
                return Ok(dir.to_path_buf());
            }
            return Err(EngineError::InstallDirNotFound);
        }
        self.detect_install_dir().ok_or(EngineError::InstallDirNotFound)
    }

    fn place(&self, request: &InstallRequest, install_dir: &Path) -> Result<(), EngineError> {
        let target = install_dir.join(TARGET_PRIMARY_NAME);
        let backup = install_dir.join(format!("{TARGET_PRIMARY_NAME}.bak"));

        // Back up the vendor's original file exactly once; reinstalls
        // must not overwrite the pristine copy with a patched one.
        if target.exists() && !backup.exists() {
            std::fs::copy(&target, &backup)?;
            debug!(backup = %backup.display(), "backed up original primary file");
        }

        std::fs::copy(&request.primary_artifact, &target)?;
        info!(target = %target.display(), "placed primary artifact");

        if let Some(payload) = &request.archive_payload {
            let payload_dest = install_dir.join(PAYLOAD_DIR_NAME);
            if payload_dest.exists() {
                std::fs::remove_dir_all(&payload_dest)?;
            }
            copy_dir_all(payload, &payload_dest)?;
            info!(dest = %payload_dest.display(), "placed payload directory");
        }

        Ok(())
    }

    fn remove(&self, options: &UninstallOptions, install_dir: &Path) -> Result<(), EngineError> {
        let target = install_dir.join(TARGET_PRIMARY_NAME);
        let backup = install_dir.join(format!("{TARGET_PRIMARY_NAME}.bak"));
        let payload = install_dir.join(PAYLOAD_DIR_NAME);

        if options.dry_run {
            info!(
                target = %target.display(),
                payload = %payload.display(),
                "dry run: would restore backup and remove payload"
            );
            return Ok(());
        }

        if backup.exists() {
            std::fs::copy(&backup, &target)?;
            std::fs::remove_file(&backup)?;
            info!("restored original primary file from backup");
        } else if !options.force {
            return Err(EngineError::BackupMissing);
        }

        if payload.exists() && !options.keep_user_data {
            std::fs::remove_dir_all(&payload)?;
            info!("removed payload directory");
        }

        Ok(())
    }
}

#[async_trait]
impl InstallEngine for FsInstallEngine {
    async fn install(&self, request: InstallRequest) -> Result<(), EngineError> {
        let install_dir = self.resolve_install_dir(request.install_dir.as_deref())?;
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.place(&request, &install_dir))
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?
    }

    async fn uninstall(&self, options: &UninstallOptions) -> Result<(), EngineError> {
        let install_dir = self.resolve_install_dir(None)?;
        let engine = self.clone();
        let options = options.clone();
        tokio::task::spawn_blocking(move || engine.remove(&options, &install_dir))
            .await
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?
    }
}

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine_for(dir: &Path) -> FsInstallEngine {
        FsInstallEngine {
            install_dir_pattern: dir.to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn test_install_backs_up_original_once() {
        let dir = tempdir().unwrap();
        let install_dir = dir.path().join("resources");
        std::fs::create_dir_all(&install_dir).unwrap();
        std::fs::write(install_dir.join(TARGET_PRIMARY_NAME), b"original").unwrap();

        let artifact = dir.path().join("app-patched.asar");
        std::fs::write(&artifact, b"patched-v1").unwrap();

        let engine = engine_for(&install_dir);
        let request = InstallRequest {
            primary_artifact: artifact.clone(),
            archive_payload: None,
            install_dir: Some(install_dir.clone()),
        };
        engine.install(request.clone()).await.unwrap();

        let backup = install_dir.join("app.asar.bak");
        assert_eq!(std::fs::read(&backup).unwrap(), b"original");
        assert_eq!(
            std::fs::read(install_dir.join(TARGET_PRIMARY_NAME)).unwrap(),
            b"patched-v1"
        );

        // Second install must not clobber the pristine backup.
        std::fs::write(&artifact, b"patched-v2").unwrap();
        engine.install(request).await.unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_uninstall_restores_backup_and_removes_payload() {
        let dir = tempdir().unwrap();
        let install_dir = dir.path().join("resources");
        std::fs::create_dir_all(install_dir.join(PAYLOAD_DIR_NAME)).unwrap();
        std::fs::write(install_dir.join(TARGET_PRIMARY_NAME), b"patched").unwrap();
        std::fs::write(install_dir.join("app.asar.bak"), b"original").unwrap();

        let engine = engine_for(&install_dir);
        engine
            .uninstall(&UninstallOptions {
                confirmed: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(install_dir.join(TARGET_PRIMARY_NAME)).unwrap(),
            b"original"
        );
        assert!(!install_dir.join("app.asar.bak").exists());
        assert!(!install_dir.join(PAYLOAD_DIR_NAME).exists());
    }

    #[tokio::test]
    async fn test_uninstall_without_backup_requires_force() {
        let dir = tempdir().unwrap();
        let install_dir = dir.path().join("resources");
        std::fs::create_dir_all(&install_dir).unwrap();
        std::fs::write(install_dir.join(TARGET_PRIMARY_NAME), b"patched").unwrap();

        let engine = engine_for(&install_dir);
        let err = engine
            .uninstall(&UninstallOptions {
                confirmed: true,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BackupMissing));

        engine
            .uninstall(&UninstallOptions {
                confirmed: true,
                force: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let install_dir = dir.path().join("resources");
        std::fs::create_dir_all(install_dir.join(PAYLOAD_DIR_NAME)).unwrap();
        std::fs::write(install_dir.join(TARGET_PRIMARY_NAME), b"patched").unwrap();
        std::fs::write(install_dir.join("app.asar.bak"), b"original").unwrap();

        let engine = engine_for(&install_dir);
        engine
            .uninstall(&UninstallOptions {
                confirmed: true,
                dry_run: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(install_dir.join(TARGET_PRIMARY_NAME)).unwrap(),
            b"patched"
        );
        assert!(install_dir.join("app.asar.bak").exists());
        assert!(install_dir.join(PAYLOAD_DIR_NAME).exists());
    }
}
