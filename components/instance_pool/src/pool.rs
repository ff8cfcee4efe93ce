//! Per-script instance pool
//!
//! A pool is a bounded FIFO of ready instances plus the counters that drive
//! its capacity. The queue and counters sit behind one short-lived mutex;
//! instances are never built or destroyed while it is held.

use crate::config::PoolConfig;
use crate::key::{Generation, ScriptKey};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// An interpreter instance that can live in a pool.
pub trait PooledInstance: Send + 'static {
    /// Generation of the script content this instance was built from
    fn generation(&self) -> &Generation;

    /// Prepare for reuse before re-entering the queue.
    ///
    /// Implementations drop per-call state and perform a small, bounded
    /// unit of deferred reclamation work (never a full collection).
    fn recycle(&mut self) {}
}

/// Why a released instance was closed instead of queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The queue already held `capacity` instances
    Full,
    /// The instance was built against an older generation
    Stale,
    /// The pool was removed from its registry
    Retired,
}

/// Result of [`InstancePool::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Queued for reuse
    Pooled,
    /// Destroyed
    Closed(CloseReason),
}

/// Snapshot of a pool's counters
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    /// Script key
    pub key: ScriptKey,
    /// Current generation
    pub generation: Generation,
    /// Current capacity ceiling
    pub capacity: usize,
    /// Instances waiting in the queue
    pub queued: usize,
    /// Acquisition attempts since the last reset
    pub calls: u64,
    /// Attempts that found the queue empty
    pub misses: u64,
}

impl PoolStats {
    /// Fraction of attempts that missed
    pub fn miss_ratio(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.misses as f64 / self.calls as f64
        }
    }
}

struct PoolState<I> {
    generation: Generation,
    queue: VecDeque<I>,
    capacity: usize,
    calls: u64,
    misses: u64,
    retired: bool,
}

impl<I> PoolState<I> {
    fn admission(&self, generation: &Generation) -> Option<CloseReason> {
        if self.retired {
            Some(CloseReason::Retired)
        } else if *generation != self.generation {
            Some(CloseReason::Stale)
        } else if self.queue.len() >= self.capacity {
            Some(CloseReason::Full)
        } else {
            None
        }
    }
}

/// Ready instances for one script key.
pub struct InstancePool<I> {
    key: ScriptKey,
    config: PoolConfig,
    state: Mutex<PoolState<I>>,
}

impl<I> InstancePool<I> {
    /// Drain the queue and refuse all future releases.
    pub fn retire(&self) -> usize {
        let drained: Vec<I> = {
            let mut state = self.state.lock();
            state.retired = true;
            state.queue.drain(..).collect()
        };
        let closed = drained.len();
        drop(drained);
        closed
    }
}

impl<I: PooledInstance> InstancePool<I> {
    /// Create an empty pool at the configured capacity floor
    pub fn new(key: ScriptKey, generation: Generation, config: PoolConfig) -> Self {
        Self {
            key,
            config,
            state: Mutex::new(PoolState {
                generation,
                queue: VecDeque::with_capacity(config.initial_capacity),
                capacity: config.initial_capacity,
                calls: 0,
                misses: 0,
                retired: false,
            }),
        }
    }

    /// Script key served by this pool
    pub fn key(&self) -> &ScriptKey {
        &self.key
    }

    /// Current generation
    pub fn generation(&self) -> Generation {
        self.state.lock().generation.clone()
    }

    /// Current capacity ceiling
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of queued instances
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the pool has been removed from its registry
    pub fn is_retired(&self) -> bool {
        self.state.lock().retired
    }

    /// Pop a ready instance without blocking.
    ///
    /// Every attempt counts as a call; an empty queue counts as a miss.
    /// Capacity grows by one while the miss ratio stays above the threshold
    /// after the warm-up period, up to the configured maximum.
    pub fn try_acquire(&self) -> Option<I> {
        let mut state = self.state.lock();
        state.calls += 1;
        let instance = state.queue.pop_front();
        if instance.is_none() {
            state.misses += 1;
        }

        if state.calls > self.config.warmup_calls
            && state.capacity < self.config.max_capacity
            && (state.misses as f64 / state.calls as f64) > self.config.miss_ratio_threshold
        {
            state.capacity += 1;
            debug!(
                key = %self.key,
                capacity = state.capacity,
                calls = state.calls,
                misses = state.misses,
                "pool capacity grown"
            );
        }

        if instance.is_some() {
            debug!(key = %self.key, "pool hit");
        } else {
            debug!(key = %self.key, "pool miss");
        }
        instance
    }

    /// Return an instance after use.
    ///
    /// The instance is recycled first, then queued only if the pool is live,
    /// its generation matches and the queue is below capacity. Otherwise it
    /// is dropped outside the lock.
    pub fn release(&self, mut instance: I) -> ReleaseOutcome {
        instance.recycle();

        let reason = {
            let mut state = self.state.lock();
            match state.admission(instance.generation()) {
                None => {
                    state.queue.push_back(instance);
                    return ReleaseOutcome::Pooled;
                }
                Some(reason) => reason,
            }
        };

        debug!(key = %self.key, ?reason, "closing released instance");
        drop(instance);
        ReleaseOutcome::Closed(reason)
    }

    /// Drain the queue and re-arm the pool under `generation`.
    ///
    /// Counters and capacity return to their initial values. A retired pool
    /// stays retired. Returns the number of instances closed.
    pub fn reset(&self, generation: Generation) -> usize {
        let drained: Vec<I> = {
            let mut state = self.state.lock();
            state.generation = generation;
            state.capacity = self.config.initial_capacity;
            state.calls = 0;
            state.misses = 0;
            state.queue.drain(..).collect()
        };
        let closed = drained.len();
        drop(drained);
        closed
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            key: self.key.clone(),
            generation: state.generation.clone(),
            capacity: state.capacity,
            queued: state.queue.len(),
            calls: state.calls,
            misses: state.misses,
        }
    }
}
