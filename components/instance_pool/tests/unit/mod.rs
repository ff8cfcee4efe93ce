//! Unit tests for instance pooling
//!
//! Instances here are cheap probes that count how many were built and how
//! many were closed, so the pool's reuse and eviction rules can be checked
//! without a real interpreter.

use instance_pool::{
    CloseReason, CreateError, Generation, InstanceFactory, InstancePool, Lease, PoolConfig,
    PoolRegistry, PooledInstance, ReleaseOutcome, ScriptKey,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    closed: AtomicUsize,
}

struct Probe {
    generation: Generation,
    counters: Arc<Counters>,
}

impl PooledInstance for Probe {
    fn generation(&self) -> &Generation {
        &self.generation
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct ProbeFactory {
    generation: Mutex<Generation>,
    counters: Arc<Counters>,
    fail: AtomicBool,
}

impl ProbeFactory {
    fn new(generation: &str) -> Self {
        Self {
            generation: Mutex::new(gen(generation)),
            counters: Arc::new(Counters::default()),
            fail: AtomicBool::new(false),
        }
    }

    fn set_generation(&self, generation: &str) {
        *self.generation.lock() = gen(generation);
    }

    fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

impl InstanceFactory for ProbeFactory {
    type Instance = Probe;

    fn create(&self, key: &ScriptKey) -> Result<Probe, CreateError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CreateError::NotFound(key.clone()));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Probe {
            generation: self.generation.lock().clone(),
            counters: Arc::clone(&self.counters),
        })
    }
}

fn key(name: &str) -> ScriptKey {
    ScriptKey::new(name).unwrap()
}

fn gen(stamp: &str) -> Generation {
    Generation::new(stamp).unwrap()
}

/// Acquire-or-create, run nothing, release: one simulated invocation.
fn invoke(registry: &PoolRegistry<Probe>, factory: &ProbeFactory, name: &str) -> ReleaseOutcome {
    let k = key(name);
    let generation = factory.generation.lock().clone();
    let pool = registry.get_or_create(&k, &generation);
    let instance = match pool.try_acquire() {
        Some(instance) => instance,
        None => factory.create(&k).unwrap(),
    };
    pool.release(instance)
}

// ============================================================================
// Reuse
// ============================================================================

#[test]
fn test_sequential_calls_fabricate_once() {
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");

    for _ in 0..10 {
        assert_eq!(invoke(&registry, &factory, "sum"), ReleaseOutcome::Pooled);
    }

    let stats = registry.stats(&key("sum")).unwrap();
    assert_eq!(factory.created(), 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.calls, 10);
    assert_eq!(stats.queued, 1);
}

#[test]
fn test_pools_are_per_key() {
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");

    invoke(&registry, &factory, "a");
    invoke(&registry, &factory, "b");
    invoke(&registry, &factory, "a");

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.stats(&key("a")).unwrap().misses, 1);
    assert_eq!(registry.stats(&key("b")).unwrap().misses, 1);
}

// ============================================================================
// Generation invalidation
// ============================================================================

#[test]
fn test_reset_drains_and_first_call_misses() {
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");
    invoke(&registry, &factory, "sum");

    factory.set_generation("g2");
    let summary = registry.reset(&key("sum"), &gen("g2"), &factory);
    assert_eq!(summary.closed, 1);
    assert_eq!(factory.closed(), 1);

    let pool = registry.get(&key("sum")).unwrap();
    assert!(pool.try_acquire().is_none());
    assert_eq!(pool.stats().misses, 1);
    assert_eq!(pool.generation(), gen("g2"));
}

#[test]
fn test_stale_checkout_is_closed_on_release() {
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");
    let k = key("sum");
    let pool = registry.get_or_create(&k, &gen("g1"));
    let old = factory.create(&k).unwrap();

    factory.set_generation("g2");
    registry.reset(&k, &gen("g2"), &factory);

    assert_eq!(pool.release(old), ReleaseOutcome::Closed(CloseReason::Stale));
    assert!(pool.try_acquire().is_none());
}

#[test]
fn test_reset_prewarms_and_tolerates_failure() {
    let config = PoolConfig::default().with_prewarm(3);
    let registry = PoolRegistry::new(config);
    let factory = ProbeFactory::new("g1");

    let summary = registry.reset(&key("sum"), &gen("g1"), &factory);
    assert_eq!(summary.prewarmed, 3);
    assert_eq!(registry.get(&key("sum")).unwrap().len(), 3);

    factory.fail.store(true, Ordering::SeqCst);
    let summary = registry.reset(&key("sum"), &gen("g1"), &factory);
    assert_eq!(summary.closed, 3);
    assert_eq!(summary.prewarmed, 0);
    let pool = registry.get(&key("sum")).unwrap();
    assert!(pool.is_empty());
    assert!(!pool.is_retired());
}

#[test]
fn test_reset_after_remove_arms_a_fresh_pool() {
    let registry = PoolRegistry::new(PoolConfig::default().with_prewarm(2));
    let factory = ProbeFactory::new("g1");
    let k = key("sum");
    let orphan = registry.get_or_create(&k, &gen("g1"));
    assert!(registry.remove(&k));

    let summary = registry.reset(&k, &gen("g1"), &factory);

    assert_eq!(summary.prewarmed, 2);
    assert!(orphan.is_retired());
    assert!(orphan.is_empty());
    let live = registry.get(&k).unwrap();
    assert!(!Arc::ptr_eq(&live, &orphan));
    assert_eq!(live.len(), 2);

    orphan.reset(gen("g2"));
    assert!(orphan.is_retired());
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn test_release_at_capacity_closes() {
    let config = PoolConfig::default().with_initial_capacity(2);
    let pool: InstancePool<Probe> = InstancePool::new(key("k"), gen("g1"), config);
    let factory = ProbeFactory::new("g1");

    let outcomes: Vec<_> = (0..3)
        .map(|_| pool.release(factory.create(&key("k")).unwrap()))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            ReleaseOutcome::Pooled,
            ReleaseOutcome::Pooled,
            ReleaseOutcome::Closed(CloseReason::Full)
        ]
    );
    assert_eq!(pool.len(), 2);
    assert_eq!(factory.closed(), 1);
}

#[test]
fn test_capacity_grows_after_warmup_up_to_max() {
    let config = PoolConfig::default()
        .with_initial_capacity(2)
        .with_max_capacity(5)
        .with_warmup_calls(20);
    let pool: InstancePool<Probe> = InstancePool::new(key("k"), gen("g1"), config);

    let mut previous = pool.capacity();
    for _ in 0..20 {
        assert!(pool.try_acquire().is_none());
        assert_eq!(pool.capacity(), 2);
    }
    for _ in 0..50 {
        pool.try_acquire();
        let capacity = pool.capacity();
        assert!(capacity >= previous);
        previous = capacity;
    }
    assert_eq!(pool.capacity(), 5);
}

#[test]
fn test_capacity_holds_when_misses_are_rare() {
    let config = PoolConfig::default()
        .with_initial_capacity(1)
        .with_warmup_calls(10)
        .with_miss_ratio_threshold(0.5);
    let pool: InstancePool<Probe> = InstancePool::new(key("k"), gen("g1"), config);
    let factory = ProbeFactory::new("g1");

    for _ in 0..100 {
        let instance = pool
            .try_acquire()
            .unwrap_or_else(|| factory.create(&key("k")).unwrap());
        pool.release(instance);
    }
    assert_eq!(pool.capacity(), 1);
    assert_eq!(factory.created(), 1);
}

#[test]
fn test_capacity_resets_only_on_reset() {
    let config = PoolConfig::default()
        .with_initial_capacity(1)
        .with_warmup_calls(0);
    let pool: InstancePool<Probe> = InstancePool::new(key("k"), gen("g1"), config);
    for _ in 0..10 {
        pool.try_acquire();
    }
    assert_eq!(pool.capacity(), 11);

    let factory = ProbeFactory::new("g1");
    for _ in 0..5 {
        pool.release(factory.create(&key("k")).unwrap());
        pool.try_acquire();
    }
    assert!(pool.capacity() >= 11);

    pool.reset(gen("g2"));
    assert_eq!(pool.capacity(), 1);
    assert_eq!(pool.stats().calls, 0);
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_remove_is_idempotent() {
    let registry: PoolRegistry<Probe> = PoolRegistry::new(PoolConfig::default());
    assert!(!registry.remove(&key("absent")));

    let factory = ProbeFactory::new("g1");
    invoke(&registry, &factory, "sum");
    assert!(registry.remove(&key("sum")));
    assert!(!registry.remove(&key("sum")));
    assert!(registry.is_empty());
    assert_eq!(factory.closed(), 1);
}

#[test]
fn test_remove_during_checkout_closes_on_return() {
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");
    let k = key("sum");
    let pool = registry.get_or_create(&k, &gen("g1"));

    let lease = Lease::pooled(factory.create(&k).unwrap(), pool, false);
    registry.remove(&k);

    assert_eq!(lease.finish(), Some(ReleaseOutcome::Closed(CloseReason::Retired)));
    assert_eq!(factory.closed(), 1);
    assert!(registry.get(&k).is_none());
}

#[test]
fn test_clear_removes_all() {
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");
    for name in ["a", "b", "c"] {
        invoke(&registry, &factory, name);
    }
    registry.clear();
    assert!(registry.keys().is_empty());
    assert_eq!(factory.closed(), 3);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_checkouts_never_share() {
    const WORKERS: usize = 8;
    let registry = PoolRegistry::new(PoolConfig::default());
    let factory = ProbeFactory::new("g1");
    let k = key("sum");
    let in_flight = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let barrier = Barrier::new(WORKERS);

    thread::scope(|scope| {
        for _ in 0..WORKERS {
            scope.spawn(|| {
                barrier.wait();
                for _ in 0..50 {
                    let pool = registry.get_or_create(&k, &gen("g1"));
                    let instance = pool
                        .try_acquire()
                        .unwrap_or_else(|| factory.create(&k).unwrap());
                    in_flight.fetch_add(1, Ordering::SeqCst);
                    peak.fetch_max(in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    pool.release(instance);
                }
            });
        }
    });

    let stats = registry.stats(&k).unwrap();
    assert_eq!(stats.calls, (WORKERS * 50) as u64);
    assert!(peak.load(Ordering::SeqCst) <= WORKERS);
    assert!(factory.created() <= WORKERS);
    assert!(stats.queued <= stats.capacity);
    assert_eq!(factory.created() as u64, stats.misses);
}

#[test]
fn test_config_round_trips_through_json() {
    let config = PoolConfig::default().with_prewarm(2);
    let json = serde_json::to_string(&config).unwrap();
    let parsed: PoolConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    let partial: PoolConfig = serde_json::from_str(r#"{"max_capacity": 64}"#).unwrap();
    assert_eq!(partial.max_capacity, 64);
    assert_eq!(partial.initial_capacity, 10);
}
