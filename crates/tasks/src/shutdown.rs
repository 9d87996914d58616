//! Shutdown signalling shared by every background task.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll, ready},
};

use futures::{
    FutureExt,
    future::{FusedFuture, Shared},
};
use tokio::sync::{Notify, oneshot};

/// Resolves once the paired [`Signal`] is fired or dropped.
#[derive(Debug, Clone)]
#[must_use = "futures do nothing unless polled"]
pub struct Shutdown(Shared<oneshot::Receiver<()>>);

impl Future for Shutdown {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pin = self.get_mut();
        if pin.0.is_terminated() || pin.0.poll_unpin(cx).is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Fires the shutdown for all [`Shutdown`] clones.
#[derive(Debug)]
pub struct Signal(oneshot::Sender<()>);

impl Signal {
    /// Fire the signal. Dropping it has the same effect.
    pub fn fire(self) {
        let _ = self.0.send(());
    }
}

/// Create a linked [`Signal`] and [`Shutdown`] pair.
pub fn signal() -> (Signal, Shutdown) {
    let (sender, receiver) = oneshot::channel();
    (Signal(sender), Shutdown(receiver.shared()))
}

/// Number of tasks still holding a graceful shutdown guard.
#[derive(Debug, Default)]
pub(crate) struct GracefulTasks {
    pending: AtomicUsize,
    drained: Notify,
}

impl GracefulTasks {
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until no guard is alive.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held by a task while it winds down; the manager waits for all guards to drop.
#[derive(Debug)]
#[must_use = "dropping the guard releases the task immediately"]
pub struct GracefulShutdownGuard(Arc<GracefulTasks>);

impl GracefulShutdownGuard {
    pub(crate) fn new(tasks: Arc<GracefulTasks>) -> Self {
        tasks.pending.fetch_add(1, Ordering::SeqCst);
        Self(tasks)
    }
}

impl Drop for GracefulShutdownGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

/// A [`Shutdown`] that hands out a [`GracefulShutdownGuard`] when it fires.
///
/// The task keeps the guard until its cleanup is done, which lets
/// [`TaskManager::graceful_shutdown_with_timeout`](crate::TaskManager::graceful_shutdown_with_timeout)
/// wait for it.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct GracefulShutdown {
    shutdown: Shutdown,
    guard: Option<GracefulShutdownGuard>,
}

impl GracefulShutdown {
    pub(crate) fn new(shutdown: Shutdown, guard: GracefulShutdownGuard) -> Self {
        Self {
            shutdown,
            guard: Some(guard),
        }
    }
}

impl Future for GracefulShutdown {
    type Output = GracefulShutdownGuard;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        ready!(self.shutdown.poll_unpin(cx));
        match self.guard.take() {
            Some(guard) => Poll::Ready(guard),
            // Polled again after completion.
            None => Poll::Pending,
        }
    }
}
