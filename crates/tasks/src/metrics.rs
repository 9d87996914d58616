//! Task Executor Metrics

use core::fmt;
use metrics::Counter;

/// Task Executor Metrics
#[derive(Clone, Debug)]
pub(crate) struct TaskExecutorMetrics {
    /// Number of spawned regular tasks
    pub(crate) regular_tasks_total: Counter,
    /// Number of finished spawned regular tasks
    pub(crate) finished_regular_tasks_total: Counter,
    /// Number of spawned tasks holding a graceful shutdown guard
    pub(crate) graceful_tasks_total: Counter,
    /// Number of finished spawned graceful tasks
    pub(crate) finished_graceful_tasks_total: Counter,
}

impl Default for TaskExecutorMetrics {
    fn default() -> Self {
        Self {
            regular_tasks_total: metrics::counter!("executor.spawn.regular_tasks_total"),
            finished_regular_tasks_total: metrics::counter!(
                "executor.spawn.finished_regular_tasks_total"
            ),
            graceful_tasks_total: metrics::counter!("executor.spawn.graceful_tasks_total"),
            finished_graceful_tasks_total: metrics::counter!(
                "executor.spawn.finished_graceful_tasks_total"
            ),
        }
    }
}

impl TaskExecutorMetrics {
    /// Increments the counter for spawned regular tasks.
    pub(crate) fn inc_regular_tasks(&self) {
        self.regular_tasks_total.increment(1);
    }

    /// Increments the counter for spawned graceful tasks.
    pub(crate) fn inc_graceful_tasks(&self) {
        self.graceful_tasks_total.increment(1);
    }
}

/// Helper type for increasing counters even if a task fails
pub(crate) struct IncCounterOnDrop(Counter);

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    /// Creates a new instance of `IncCounterOnDrop` with the given counter.
    pub(crate) const fn new(counter: Counter) -> Self {
        Self(counter)
    }
}

impl Drop for IncCounterOnDrop {
    /// Increment the counter when the instance is dropped.
    fn drop(&mut self) {
        self.0.increment(1);
    }
}
