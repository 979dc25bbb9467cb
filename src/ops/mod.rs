//! Installation orchestration: session state machine, scheduling,
//! lifecycle hooks, and the install-engine boundary.

pub mod engine;
pub mod error;
pub mod hooks;
pub mod scheduler;
pub mod session;

pub use error::{FailureKind, OperationKind, OperationOutcome};
pub use scheduler::{SessionEvent, TaskScheduler};
pub use session::{InstallOptions, IntentError, SessionState};
