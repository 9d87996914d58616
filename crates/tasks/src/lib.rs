//! Task spawning with a single cooperative shutdown signal.
//!
//! A [`TaskManager`] owns the shutdown [`Signal`] and hands out cloneable
//! [`TaskExecutor`]s. Every task spawned through an executor observes the same
//! [`Shutdown`]; tasks that need to finish cleanup before the process exits use
//! [`TaskExecutor::spawn_with_graceful_shutdown_signal`] and hold the returned
//! [`GracefulShutdownGuard`] until they are done.

use std::{future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{Instrument, debug, debug_span, warn};

mod metrics;
mod shutdown;

use metrics::{IncCounterOnDrop, TaskExecutorMetrics};
pub use shutdown::{GracefulShutdown, GracefulShutdownGuard, Shutdown, Signal, signal};
use shutdown::GracefulTasks;

/// Owns the shutdown signal for a group of tasks.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,
    signal: Mutex<Option<Signal>>,
    on_shutdown: Shutdown,
    graceful_tasks: Arc<GracefulTasks>,
}

impl TaskManager {
    /// Create a manager spawning onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Create a manager spawning onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        let (signal, on_shutdown) = signal();
        Self {
            handle,
            signal: Mutex::new(Some(signal)),
            on_shutdown,
            graceful_tasks: Arc::new(GracefulTasks::default()),
        }
    }

    /// Returns a new executor bound to this manager's shutdown signal.
    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            on_shutdown: self.on_shutdown.clone(),
            graceful_tasks: self.graceful_tasks.clone(),
            metrics: TaskExecutorMetrics::default(),
        }
    }

    /// Fire the shutdown signal. Calling this more than once has no further effect.
    pub fn fire_shutdown_signal(&self) {
        if let Some(signal) = self.signal.lock().take() {
            debug!("firing shutdown signal");
            signal.fire();
        }
    }

    /// Fire the shutdown signal and wait for graceful tasks to release their guards.
    ///
    /// Returns `false` if some tasks were still running when `timeout` elapsed.
    pub async fn graceful_shutdown_with_timeout(&self, timeout: Duration) -> bool {
        self.fire_shutdown_signal();
        match tokio::time::timeout(timeout, self.graceful_tasks.drained()).await {
            Ok(()) => {
                debug!("gracefully shut down");
                true
            }
            Err(_) => {
                warn!(
                    pending = self.graceful_tasks.pending(),
                    "graceful shutdown timed out"
                );
                false
            }
        }
    }
}

/// Spawns tasks tied to a [`TaskManager`]'s shutdown signal.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    on_shutdown: Shutdown,
    graceful_tasks: Arc<GracefulTasks>,
    metrics: TaskExecutorMetrics,
}

impl TaskExecutor {
    /// Returns the shutdown future observed by every task of this executor.
    pub fn on_shutdown_signal(&self) -> &Shutdown {
        &self.on_shutdown
    }

    /// Spawn a task that is dropped as soon as the shutdown signal fires.
    pub fn spawn<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_regular_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_regular_tasks_total.clone());
        let on_shutdown = self.on_shutdown.clone();

        let task = async move {
            let _finished = finished;
            tokio::select! {
                biased;
                _ = on_shutdown => debug!(task = name, "task cancelled by shutdown"),
                _ = fut => {}
            }
        };

        self.handle
            .spawn(task.instrument(debug_span!("task", name)))
    }

    /// Spawn a task that receives a [`GracefulShutdown`] and decides itself
    /// when to stop after the signal fires.
    pub fn spawn_with_graceful_shutdown_signal<F>(
        &self,
        name: &'static str,
        f: impl FnOnce(GracefulShutdown) -> F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_graceful_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_graceful_tasks_total.clone());
        let guard = GracefulShutdownGuard::new(self.graceful_tasks.clone());
        let fut = f(GracefulShutdown::new(self.on_shutdown.clone(), guard));

        let task = async move {
            let _finished = finished;
            fut.await;
        };

        self.handle
            .spawn(task.instrument(debug_span!("task", name)))
    }
}
