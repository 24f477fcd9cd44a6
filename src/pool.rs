use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinSet},
    time,
};
use tracing::warn;

/// Fixed-size worker pool. Tasks are spawned right away but only `size` of them run at once.
#[derive(Debug)]
pub struct WorkerPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

/// What was left once the pool was drained.
#[derive(Debug)]
pub struct Drained<T> {
    pub finished: Vec<std::result::Result<T, JoinError>>,
    /// Tasks still running when the timeout hit. They were detached, not aborted.
    pub stragglers: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Queues a task. Returns immediately; results are collected by [`join`](Self::join).
    pub fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tasks.spawn(async move {
            // The semaphore is never closed, so this always yields a permit.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        });
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Shuts the pool down: waits up to `limit` for every task to finish. Whatever is still
    /// running afterwards keeps running in the background.
    pub async fn join(mut self, limit: Duration) -> Drained<T> {
        let mut finished = Vec::with_capacity(self.tasks.len());
        let drain = async {
            while let Some(res) = self.tasks.join_next().await {
                finished.push(res);
            }
        };

        let mut stragglers = 0;
        if time::timeout(limit, drain).await.is_err() {
            stragglers = self.tasks.len();
            warn!(stragglers, "drain timeout reached, leaving tasks running");
            self.tasks.detach_all();
        }

        Drained {
            finished,
            stragglers,
        }
    }
}
