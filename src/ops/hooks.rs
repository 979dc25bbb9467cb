//! Lifecycle hooks: a single-slot progress callback registry.
//!
//! Decouples background workers from the observer without a process
//! global: the hooks handle is injected into the orchestrator at
//! construction. One slot per hook name, last writer wins; invoking an
//! unset hook is a no-op. Re-registering mid-flight affects subsequent
//! invocations only -- past events are never buffered or replayed.

use std::sync::{Arc, RwLock};

type DownloadProgressFn = dyn Fn(u64, u64, &str) + Send + Sync;

#[derive(Default)]
struct Slots {
    download_progress: Option<Box<DownloadProgressFn>>,
}

/// Cloneable handle to the hook slots. Clones share the same registry.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    slots: Arc<RwLock<Slots>>,
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks").finish_non_exhaustive()
    }
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the download-progress handler, replacing any existing one.
    /// Arguments: cumulative downloaded bytes, total bytes (0 when
    /// unknown), artifact filename.
    pub fn set_download_progress(&self, handler: impl Fn(u64, u64, &str) + Send + Sync + 'static) {
        if let Ok(mut slots) = self.slots.write() {
            slots.download_progress = Some(Box::new(handler));
        }
    }

    /// Remove the download-progress handler.
    pub fn clear_download_progress(&self) {
        if let Ok(mut slots) = self.slots.write() {
            slots.download_progress = None;
        }
    }

    /// Invoke the download-progress hook; silent no-op when unset.
    pub fn download_progress(&self, downloaded: u64, total: u64, artifact: &str) {
        if let Ok(slots) = self.slots.read() {
            if let Some(handler) = &slots.download_progress {
                handler(downloaded, total, artifact);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_unset_hook_is_noop() {
        let hooks = LifecycleHooks::new();
        // Must not panic or block.
        hooks.download_progress(10, 100, "aura.zip");
    }

    #[test]
    fn test_last_writer_wins() {
        let hooks = LifecycleHooks::new();
        let first = Arc::new(AtomicU64::new(0));
        let second = Arc::new(AtomicU64::new(0));

        let c = first.clone();
        hooks.set_download_progress(move |d, _, _| c.store(d, Ordering::SeqCst));
        let c = second.clone();
        hooks.set_download_progress(move |d, _, _| c.store(d, Ordering::SeqCst));

        hooks.download_progress(42, 0, "app-patched.asar");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_clones_share_the_registry() {
        let hooks = LifecycleHooks::new();
        let seen = Arc::new(AtomicU64::new(0));
        let c = seen.clone();
        hooks.clone().set_download_progress(move |d, _, _| c.store(d, Ordering::SeqCst));

        hooks.download_progress(7, 7, "aura.zip");
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_cleared_hook_stops_firing() {
        let hooks = LifecycleHooks::new();
        let seen = Arc::new(AtomicU64::new(0));
        let c = seen.clone();
        hooks.set_download_progress(move |d, _, _| c.store(d, Ordering::SeqCst));
        hooks.clear_download_progress();

        hooks.download_progress(99, 99, "aura.zip");
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
