//! Task spawning abstraction for runtime independence.
//!
//! The core library spawns its device actors through [`TaskSpawner`] so an
//! embedding application can decide which runtime handle they land on.

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// Spawned tasks must keep running after the spawner is dropped.
pub trait TaskSpawner: Send + Sync {
    /// Spawns a detached background task. Cancellation is the task's own
    /// business (device actors watch a `CancellationToken`).
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
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
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
