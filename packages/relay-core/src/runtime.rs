//! Task spawning abstraction.
//!
//! Long-running work started by the event router (clip playback, freezes,
//! delayed thaws) goes through a [`TaskSpawner`] so the router can be driven
//! from any runtime handle, including the paused clock in tests.

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// Spawned tasks are detached: the spawner offers no way to cancel or
/// join them.
pub trait TaskSpawner: Send + Sync {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Spawner backed by a Tokio runtime handle.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Spawner for the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn spawned_task_runs_on_current_runtime() {
        let spawner = TokioSpawner::current();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        spawner.spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(ran.load(Ordering::SeqCst));
    }
}
