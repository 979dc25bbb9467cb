//! Failure taxonomy and terminal outcomes for long operations.

use thiserror::Error;

use crate::io::extract::ExtractError;

/// What kind of long operation produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Install,
    Uninstall,
    RefreshVersions,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Install => "install",
            OperationKind::Uninstall => "uninstall",
            OperationKind::RefreshVersions => "refresh",
        }
    }
}

/// Why an operation failed. Scoped to the operation, never fatal to the
/// process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Every download source was exhausted.
    #[error("network error: all download sources failed")]
    Network,

    /// The destination could not be written or cleaned up.
    #[error("filesystem error on the destination")]
    FileSystem,

    /// The archive bundle is corrupt; retrying a source would not help.
    #[error("downloaded archive is corrupt")]
    ArchiveCorrupt,

    /// The operation deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// The install engine reported a failure.
    #[error("install engine failed: {0}")]
    Engine(String),
}

impl From<ExtractError> for FailureKind {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Corrupt(_) => FailureKind::ArchiveCorrupt,
            ExtractError::Io(_) => FailureKind::FileSystem,
        }
    }
}

/// Terminal outcome of a long operation as delivered to the observer.
///
/// `Cancelled` is deliberately distinct from `Failed`: user-initiated
/// cancellation suppresses any error surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Completed; carries a human-readable summary.
    Success(String),
    Cancelled,
    Failed(FailureKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_mapping() {
        let corrupt = ExtractError::Corrupt("bad central directory".to_string());
        assert_eq!(FailureKind::from(corrupt), FailureKind::ArchiveCorrupt);

        let io = ExtractError::Io(std::io::Error::other("disk full"));
        assert_eq!(FailureKind::from(io), FailureKind::FileSystem);
    }
}
