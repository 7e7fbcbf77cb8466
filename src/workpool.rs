//! # Work Pool
//!
//! A fixed-capacity pool of execution slots for blocking, CPU/GPU-bound work
//! (model loading and inference). Submissions queue FIFO on a semaphore when
//! all slots are busy, which gives backpressure instead of load shedding: the
//! concurrency ceiling is the pool capacity, and excess requests simply wait.
//!
//! Work is executed on the blocking thread pool via `spawn_blocking`, so the
//! async coordination layer is never blocked by a long-running unit. Once a
//! unit has started it runs to completion; there is no cancellation. A caller
//! that abandons the returned future only abandons the result, not the work.

use crate::error::{ServiceError, ServiceResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

/// Bounded pool of blocking execution slots.
pub struct WorkPool {
    slots: Arc<Semaphore>,
    capacity: usize,
    accepting: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

/// Releases a slot and the in-flight count when a unit of work finishes,
/// whether it returned or panicked.
struct SlotGuard {
    in_flight: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkPool {
    /// Create a pool with a fixed number of slots.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "work pool capacity must be non-zero");
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            accepting: AtomicBool::new(true),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of slots in the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units of work currently executing (not counting queued submissions).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run a blocking unit of work on a pool slot, waiting for a free slot if
    /// all are busy. The await suspends the logical request, not the runtime.
    pub async fn submit<F, T>(&self, label: &'static str, work: F) -> ServiceResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(ServiceError::ShuttingDown);
        }

        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::ShuttingDown)?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = SlotGuard {
            in_flight: Arc::clone(&self.in_flight),
            _permit: permit,
        };

        // Shutdown may have begun while this submission was queued.
        if !self.accepting.load(Ordering::SeqCst) {
            drop(guard);
            return Err(ServiceError::ShuttingDown);
        }

        debug!(label, "dispatching blocking work to pool slot");
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            work()
        });

        handle.await.map_err(|join_err| {
            error!(label, error = %join_err, "pool task did not complete");
            ServiceError::Internal(format!("{} task panicked: {}", label, join_err))
        })
    }

    /// Stop accepting new work, wait for every started unit to finish, then
    /// release the slots. Started work is never cancelled.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        info!(in_flight = self.in_flight(), "work pool draining");

        // Acquiring every slot only succeeds once all holders (and queued
        // submissions, which bail out when they observe the flag) are gone.
        match self
            .slots
            .clone()
            .acquire_many_owned(self.capacity as u32)
            .await
        {
            Ok(_all_slots) => self.slots.close(),
            // Already closed by a concurrent shutdown.
            Err(_) => {}
        }

        info!("work pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_capacity() {
        let pool = Arc::new(WorkPool::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let pool = Arc::clone(&pool);
            let running = Arc::clone(&running);
            let high_water = Arc::clone(&high_water);
            tasks.push(tokio::spawn(async move {
                pool.submit("test", move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(high_water.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_work() {
        let pool = Arc::new(WorkPool::new(1));
        let worker = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.submit("slow", || std::thread::sleep(Duration::from_millis(100)))
                    .await
                    .unwrap();
            })
        };
        // Let the unit start before draining.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        pool.shutdown().await;
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(pool.in_flight(), 0);
        worker.await.unwrap();

        // New work is refused after shutdown.
        let refused = pool.submit("late", || ()).await;
        assert!(matches!(refused, Err(ServiceError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_panicked_work_is_reported_and_releases_slot() {
        let pool = WorkPool::new(1);
        let outcome = pool.submit("explode", || panic!("boom")).await;
        assert!(matches!(outcome, Err(ServiceError::Internal(_))));

        // The slot is free again afterwards.
        let ok = pool.submit("after", || 7).await.unwrap();
        assert_eq!(ok, 7);
        assert_eq!(pool.in_flight(), 0);
    }
}
