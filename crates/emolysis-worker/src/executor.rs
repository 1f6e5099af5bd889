//! Bounded inference concurrency.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{WorkerError, WorkerResult};

/// Caps the number of model calls in flight across all sessions.
#[derive(Debug, Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
}

impl InferencePool {
    /// A `size` of 0 is treated as 1.
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `fut` once a permit is free.
    pub async fn run<F, T>(&self, fut: F) -> WorkerResult<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| WorkerError::processing_failed("inference pool closed"))?;
        Ok(fut.await)
    }
}
