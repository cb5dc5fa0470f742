//! Leaky bucket traffic shaping.
//!
//! Requests that arrive while the bucket has room are queued and released
//! one per tick by a single drainer task. A full bucket rejects at once.
//! Admitted requests therefore see queueing delay instead of a 429.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::security::Rejection;

/// A unit of deferred work.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Bounded job queue drained at a fixed interval.
///
/// Producers only enqueue; the drainer is the sole consumer. The drainer
/// stops once every handle to the bucket has been dropped and the queue
/// is empty.
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    queue: mpsc::Sender<Job>,
    capacity: usize,
    interval: Duration,
}

impl LeakyBucket {
    /// Create the bucket and spawn its drainer on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn start(capacity: usize, interval: Duration) -> Self {
        let capacity = capacity.max(1);
        let (queue, jobs) = mpsc::channel(capacity);
        tokio::spawn(drain(jobs, interval));
        Self {
            queue,
            capacity,
            interval,
        }
    }

    /// Queue `job` for execution on a later tick.
    pub fn submit<F>(&self, job: F) -> Result<(), Rejection>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.queue.try_send(Box::pin(job)).map_err(|e| match e {
            TrySendError::Full(_) => Rejection::QueueFull,
            TrySendError::Closed(_) => Rejection::Dropped,
        })
    }

    /// Jobs waiting for a tick.
    pub fn queued(&self) -> usize {
        self.capacity - self.queue.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

async fn drain(mut jobs: mpsc::Receiver<Job>, interval: Duration) {
    // First leak happens one full interval after start.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match jobs.try_recv() {
            Ok(job) => {
                tokio::spawn(job);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }
    }
    tracing::debug!("Leaky bucket drainer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_full_bucket_rejects_then_drains() {
        let bucket = LeakyBucket::start(2, Duration::from_millis(100));
        let ran = Arc::new(AtomicUsize::new(0));

        assert!(bucket.submit(counting_job(&ran)).is_ok());
        assert!(bucket.submit(counting_job(&ran)).is_ok());
        assert_eq!(bucket.submit(counting_job(&ran)), Err(Rejection::QueueFull));
        assert_eq!(bucket.queued(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(bucket.submit(counting_job(&ran)).is_ok());
    }

    #[tokio::test]
    async fn test_drains_one_per_tick() {
        let bucket = LeakyBucket::start(4, Duration::from_millis(50));
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            bucket.submit(counting_job(&ran)).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 4);
        assert_eq!(bucket.queued(), 0);
    }

    #[tokio::test]
    async fn test_drainer_runs_queued_jobs_after_drop() {
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let bucket = LeakyBucket::start(2, Duration::from_millis(20));
            bucket.submit(counting_job(&ran)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
