//! Task scheduling and cross-thread marshaling
//!
//! Background futures run on the tokio runtime; their results come back
//! to the interactive loop as [`SessionEvent`]s over a plain mpsc
//! channel with a single consumer. The channel replaces timer-based
//! polling: there is no racing "check later" timer, just a queue the
//! interactive loop drains at its one dispatch point.
//!
//! The deadline guard wraps the operation future in
//! `tokio::time::timeout`; the single match on its result is the only
//! completion path, so "timer fired" and "operation completed" can
//! never both deliver for the same operation.

use std::sync::mpsc;
use std::time::Duration;

use tracing::warn;

use crate::core::catalog::VersionCatalog;
use crate::ops::error::{FailureKind, OperationKind, OperationOutcome};

/// Events marshaled from background contexts to the interactive loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// Streaming download progress; `total` is 0 when unknown.
    Progress {
        downloaded: u64,
        total: u64,
        artifact: String,
    },
    /// Human-readable status line.
    Status(String),
    /// Version catalog resolution finished (success or degraded).
    CatalogLoaded(VersionCatalog),
    /// A long operation reached its terminal outcome.
    Completed {
        op: OperationKind,
        outcome: OperationOutcome,
    },
}

/// Spawns operations on the runtime and delivers exactly one terminal
/// event per operation.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    handle: tokio::runtime::Handle,
    events: mpsc::Sender<SessionEvent>,
}

impl TaskScheduler {
    pub fn new(handle: tokio::runtime::Handle, events: mpsc::Sender<SessionEvent>) -> Self {
        Self { handle, events }
    }

    /// A sender background work can use for progress/status events.
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events.clone()
    }

    /// Run `operation` off the interactive thread and deliver its
    /// outcome as a `Completed` event. With a deadline, an operation
    /// that outlives it is dropped and reported as `Failed(Timeout)` --
    /// exactly one of the two reports ever happens.
    pub fn run_operation<F>(&self, op: OperationKind, deadline: Option<Duration>, operation: F)
    where
        F: std::future::Future<Output = OperationOutcome> + Send + 'static,
    {
        let events = self.events.clone();
        self.handle.spawn(async move {
            let outcome = match deadline {
                Some(limit) => match tokio::time::timeout(limit, operation).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(op = op.as_str(), "operation deadline elapsed");
                        OperationOutcome::Failed(FailureKind::Timeout)
                    }
                },
                None => operation.await,
            };
            if events.send(SessionEvent::Completed { op, outcome }).is_err() {
                warn!(op = op.as_str(), "observer gone, dropping terminal outcome");
            }
        });
    }

    /// Run catalog resolution and deliver the catalog. Resolution is
    /// infallible; its HTTP request is bounded internally, so no outer
    /// deadline is applied.
    pub fn run_resolution<F>(&self, resolution: F)
    where
        F: std::future::Future<Output = VersionCatalog> + Send + 'static,
    {
        let events = self.events.clone();
        self.handle.spawn(async move {
            let catalog = resolution.await;
            let _ = events.send(SessionEvent::CatalogLoaded(catalog));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> (
        tokio::runtime::Runtime,
        TaskScheduler,
        mpsc::Receiver<SessionEvent>,
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (tx, rx) = mpsc::channel();
        let sched = TaskScheduler::new(rt.handle().clone(), tx);
        (rt, sched, rx)
    }

    #[test]
    fn test_fast_operation_never_times_out() {
        let (_rt, sched, rx) = scheduler();

        sched.run_operation(
            OperationKind::Install,
            Some(Duration::from_millis(1000)),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                OperationOutcome::Success("done".to_string())
            },
        );

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        match event {
            SessionEvent::Completed { op, outcome } => {
                assert_eq!(op, OperationKind::Install);
                assert_eq!(outcome, OperationOutcome::Success("done".to_string()));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        // Exactly one terminal event: the timeout path must not fire too.
        assert!(rx.recv_timeout(Duration::from_millis(1200)).is_err());
    }

    #[test]
    fn test_slow_operation_times_out_once() {
        let (_rt, sched, rx) = scheduler();

        sched.run_operation(
            OperationKind::Uninstall,
            Some(Duration::from_millis(50)),
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                OperationOutcome::Success("unreachable".to_string())
            },
        );

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        match event {
            SessionEvent::Completed { op, outcome } => {
                assert_eq!(op, OperationKind::Uninstall);
                assert_eq!(outcome, OperationOutcome::Failed(FailureKind::Timeout));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_resolution_delivers_catalog() {
        let (_rt, sched, rx) = scheduler();

        sched.run_resolution(async { VersionCatalog::empty() });

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            SessionEvent::CatalogLoaded(catalog) => assert!(catalog.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
