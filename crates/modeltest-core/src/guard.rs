//! Scoped executor cleanup

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use modeltest_kernel::ModelExecutor;

/// Shuts the wrapped executor down when dropped
///
/// Cleanup also runs when a check fails part way through.
pub struct ExecutorGuard {
    executor: Arc<dyn ModelExecutor>,
}

impl ExecutorGuard {
    #[inline]
    #[must_use]
    pub fn new(executor: Arc<dyn ModelExecutor>) -> Self {
        Self { executor }
    }

    /// Shared handle to the executor; it is shut down with the guard
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn ModelExecutor> {
        &self.executor
    }
}

impl Deref for ExecutorGuard {
    type Target = dyn ModelExecutor;

    fn deref(&self) -> &Self::Target {
        self.executor.as_ref()
    }
}

impl Drop for ExecutorGuard {
    fn drop(&mut self) {
        if !self.executor.is_shutdown() {
            tracing::debug!(version = %self.executor.version(), "Shutting down executor");
            self.executor.shutdown();
        }
    }
}

impl fmt::Debug for ExecutorGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorGuard")
            .field("version", &self.executor.version())
            .field("shutdown", &self.executor.is_shutdown())
            .finish()
    }
}
