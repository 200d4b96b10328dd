//! Sliding-window rate governor
//!
//! Keeps the instant of every call made in the last window. A caller may
//! proceed when fewer than `capacity` instants fall inside the window ending
//! now; otherwise it sleeps until the oldest one ages out. Callers are
//! admitted strictly in arrival order: they queue on a FIFO async mutex and
//! only the head of the queue ever inspects or waits on the window.

use quarry_core::TimeoutError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window limiter gating every primitive call.
#[derive(Debug)]
pub struct RateGovernor {
    capacity: usize,
    window: Duration,
    /// Consumption instants inside the current window, oldest first.
    log: Mutex<VecDeque<Instant>>,
    /// Arrival-order queue; tokio's mutex grants the lock FIFO.
    admission: tokio::sync::Mutex<()>,
    queued: AtomicUsize,
}

/// Decrements the queue counter however the wait ends.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateGovernor {
    /// A governor allowing `capacity` calls per rolling `window`.
    pub fn new(capacity: u32, window: Duration) -> Self {
        let capacity = (capacity as usize).max(1);
        Self {
            capacity,
            window,
            log: Mutex::new(VecDeque::with_capacity(capacity)),
            admission: tokio::sync::Mutex::new(()),
            queued: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a slot and consume it. Never fails; returns how long it waited.
    pub async fn acquire(&self) -> Duration {
        match self.acquire_until(None).await {
            Ok(waited) => waited,
            // Without a deadline the only exits are success paths.
            Err(_) => Duration::ZERO,
        }
    }

    /// Wait for a slot unless doing so would pass `deadline`.
    ///
    /// On [`TimeoutError`] no slot is consumed.
    pub async fn acquire_before(&self, deadline: Instant) -> Result<Duration, TimeoutError> {
        self.acquire_until(Some(deadline)).await
    }

    /// [`acquire_before`](Self::acquire_before) with a relative deadline.
    pub async fn acquire_within(&self, timeout: Duration) -> Result<Duration, TimeoutError> {
        self.acquire_until(Some(Instant::now() + timeout)).await
    }

    async fn acquire_until(&self, deadline: Option<Instant>) -> Result<Duration, TimeoutError> {
        let started = Instant::now();

        let ahead = self.queued.fetch_add(1, Ordering::SeqCst);
        // Held until this caller consumes a slot or gives up.
        let _queued = QueuedGuard(&self.queued);
        let admitted = match deadline {
            None => self.admission.lock().await,
            Some(deadline) => match tokio::time::timeout_at(deadline, self.admission.lock()).await {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::info!(queued_ahead = ahead, "deadline elapsed in rate queue");
                    return Err(TimeoutError::QueueDeadline { queued_ahead: ahead });
                }
            },
        };

        loop {
            let now = Instant::now();
            let ready_at = {
                let mut log = self.lock_log();
                self.prune(&mut log, now);
                if log.len() < self.capacity {
                    log.push_back(now);
                    drop(log);
                    drop(admitted);
                    return Ok(now.saturating_duration_since(started));
                }
                // Full window: the oldest consumption frees the next slot.
                match log.front() {
                    Some(oldest) => *oldest + self.window,
                    None => now,
                }
            };

            let wait = ready_at.saturating_duration_since(now);
            if let Some(deadline) = deadline {
                if ready_at > deadline {
                    return Err(TimeoutError::DeadlineExceeded {
                        required: wait,
                        available: deadline.saturating_duration_since(now),
                    });
                }
            }

            tracing::info!(wait_ms = wait.as_millis() as u64, "rate window full, waiting");
            tokio::time::sleep_until(ready_at).await;
        }
    }

    /// Slots free in the window ending now. Does not wait behind queued callers.
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let mut log = self.lock_log();
        self.prune(&mut log, now);
        self.capacity.saturating_sub(log.len())
    }

    /// When the next slot frees up, if the window holds any consumption.
    pub fn next_refill(&self) -> Option<Instant> {
        let now = Instant::now();
        let mut log = self.lock_log();
        self.prune(&mut log, now);
        log.front().map(|oldest| *oldest + self.window)
    }

    /// Callers currently waiting, whether behind another caller or on a full window.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    fn prune(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock_log(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // Every critical section leaves the deque consistent, so a poisoned
        // lock still holds valid state.
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
