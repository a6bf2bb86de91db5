//! Bounded worker pool for open notifications.
//!
//! `core_workers` long-lived workers drain a bounded queue. While jobs are
//! waiting, extra short-lived workers are added up to `max_workers`; they exit
//! as soon as the queue is empty. A full queue runs the job on the submitting
//! task instead of dropping it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::task::TaskTracker;

use crate::config::TrackingConfig;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// How a submitted job was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    RanOnCaller,
}

struct Inner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: SharedReceiver,
    tracker: TaskTracker,
    extra_workers: AtomicUsize,
    core_workers: usize,
    max_workers: usize,
    shutdown_timeout: Duration,
}

#[derive(Clone)]
pub struct TrackingNotifier {
    inner: Arc<Inner>,
}

impl TrackingNotifier {
    /// Spawns the core workers; must be called inside a tokio runtime.
    pub fn new(config: &TrackingConfig) -> Self {
        Self::with_limits(
            config.core_workers,
            config.max_workers,
            config.queue_capacity,
            config.shutdown_timeout(),
        )
    }

    pub fn with_limits(
        core_workers: usize,
        max_workers: usize,
        queue_capacity: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        let core_workers = core_workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(queue_capacity.max(1));
        let inner = Arc::new(Inner {
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            tracker: TaskTracker::new(),
            extra_workers: AtomicUsize::new(0),
            core_workers,
            max_workers: max_workers.max(core_workers),
            shutdown_timeout,
        });
        for _ in 0..core_workers {
            let receiver = inner.receiver.clone();
            inner.tracker.spawn(core_worker(receiver));
        }
        tracing::debug!(
            core_workers,
            max_workers = inner.max_workers,
            queue_capacity,
            "Tracking notifier started"
        );
        Self { inner }
    }

    fn current_sender(&self) -> Option<mpsc::Sender<Job>> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn submit<F>(&self, job: F) -> Submission
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(sender) = self.current_sender() else {
            tracing::debug!("Tracking notifier is shut down; running job on caller");
            job.await;
            return Submission::RanOnCaller;
        };

        match sender.try_send(Box::pin(job)) {
            Ok(()) => {
                self.grow_if_backlogged(&sender);
                Submission::Queued
            }
            Err(TrySendError::Full(job)) => {
                tracing::warn!("Tracking notification queue full; running job on caller");
                job.await;
                Submission::RanOnCaller
            }
            Err(TrySendError::Closed(job)) => {
                job.await;
                Submission::RanOnCaller
            }
        }
    }

    fn grow_if_backlogged(&self, sender: &mpsc::Sender<Job>) {
        let queued = sender.max_capacity() - sender.capacity();
        if queued == 0 {
            return;
        }
        let allowed_extra = self.inner.max_workers - self.inner.core_workers;
        let claimed = self
            .inner
            .extra_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < allowed_extra).then_some(current + 1)
            })
            .is_ok();
        if claimed {
            let inner = self.inner.clone();
            self.inner.tracker.spawn(async move {
                extra_worker(inner.receiver.clone()).await;
                inner.extra_workers.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }

    pub fn queued(&self) -> usize {
        self.current_sender()
            .map(|sender| sender.max_capacity() - sender.capacity())
            .unwrap_or(0)
    }

    /// Stops accepting queued work and waits for workers to drain what is
    /// left. Returns `false` if the timeout elapsed first.
    pub async fn shutdown(&self) -> bool {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);
        self.inner.tracker.close();

        match tokio::time::timeout(self.inner.shutdown_timeout, self.inner.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("Tracking notifier drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.inner.shutdown_timeout.as_secs(),
                    "Tracking notifier did not drain before timeout"
                );
                false
            }
        }
    }
}

async fn core_worker(receiver: SharedReceiver) {
    loop {
        let job = receiver.lock().await.recv().await;
        match job {
            Some(job) => job.await,
            None => break,
        }
    }
}

async fn extra_worker(receiver: SharedReceiver) {
    loop {
        let job = receiver.lock().await.try_recv();
        match job {
            Ok(job) => job.await,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn queued_jobs_run_on_workers() {
        let notifier = TrackingNotifier::with_limits(2, 5, 25, Duration::from_secs(5));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            let outcome = notifier
                .submit(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            assert_eq!(outcome, Submission::Queued);
        }
        assert!(notifier.shutdown().await);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn full_queue_runs_job_on_caller() {
        let notifier = TrackingNotifier::with_limits(1, 1, 1, Duration::from_secs(5));
        let gate = Arc::new(Notify::new());

        // Occupy the only worker, then fill the single queue slot.
        let blocker = gate.clone();
        notifier.submit(async move { blocker.notified().await }).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        notifier.submit(async {}).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_inline = ran.clone();
        let outcome = notifier
            .submit(async move {
                ran_inline.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(outcome, Submission::RanOnCaller);
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(notifier.shutdown().await);
    }

    #[tokio::test]
    async fn shutdown_times_out_on_stuck_job() {
        let notifier = TrackingNotifier::with_limits(1, 1, 4, Duration::from_millis(50));
        notifier
            .submit(async { std::future::pending::<()>().await })
            .await;
        assert!(!notifier.shutdown().await);
    }

    #[tokio::test]
    async fn submit_after_shutdown_runs_inline() {
        let notifier = TrackingNotifier::with_limits(1, 2, 4, Duration::from_secs(1));
        assert!(notifier.shutdown().await);
        let outcome = notifier.submit(async {}).await;
        assert_eq!(outcome, Submission::RanOnCaller);
    }
}
