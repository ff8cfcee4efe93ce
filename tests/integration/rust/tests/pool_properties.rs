//! Pool Property Tests
//!
//! Pools and registries filled with real Lua instances built by the bridge
//! factory, checked against the reuse, invalidation, capacity and growth
//! rules.

use host_types::memory::{MemoryContext, MemoryRecord};
use host_types::{List, Value};
use instance_pool::{
    CloseReason, InstanceFactory, InstancePool, PoolConfig, PoolRegistry, PooledInstance,
    ReleaseOutcome, ScriptKey,
};
use integration_tests::ScriptRoots;
use lua_bridge::{LuaFactory, LuaInstance, ScriptCatalog, SearchPaths};
use std::sync::Arc;
use udf_module::UdfModule;

fn factory_with(name: &str, source: &str) -> (LuaFactory, ScriptKey) {
    let catalog = Arc::new(ScriptCatalog::new(SearchPaths::default()));
    let key = ScriptKey::new(name).unwrap();
    catalog.insert_inline(key.clone(), source.as_bytes().to_vec());
    (LuaFactory::new(catalog), key)
}

fn pool_for(factory: &LuaFactory, key: &ScriptKey, config: PoolConfig) -> InstancePool<LuaInstance> {
    let generation = factory.catalog().get(key).unwrap().generation.clone();
    InstancePool::new(key.clone(), generation, config)
}

/// P1: sequential calls reuse one instance
#[test]
fn test_p1_sequential_reuse() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module
        .add_script("echo", b"function echo(r, v) return v end")
        .unwrap();
    let host = MemoryContext::new().into_handle();
    let record = MemoryRecord::new().into_handle();

    for n in 0..10 {
        let result = module
            .apply_to_record(&host, "echo", "echo", &record, &[Value::Integer(n)])
            .unwrap();
        assert_eq!(result.value(), Some(&Value::Integer(n)));
    }

    let stats = module.pool_stats("echo").unwrap();
    assert_eq!(stats.calls, 10);
    assert_eq!(stats.misses, 1);
    assert_eq!(module.stats().fabrications, 1);
}

/// P2: instances of an old generation never come back out
#[test]
fn test_p2_generation_invalidation() {
    let (factory, key) = factory_with("gen", "function f(r) return 1 end");
    let pool = pool_for(&factory, &key, PoolConfig::default());

    let old = factory.create(&key).unwrap();
    let straggler = factory.create(&key).unwrap();
    assert_eq!(pool.release(old), ReleaseOutcome::Pooled);

    let entry = factory
        .catalog()
        .insert_inline(key.clone(), b"function f(r) return 2 end".to_vec());
    assert_eq!(pool.reset(entry.generation.clone()), 1);

    assert!(pool.try_acquire().is_none());
    assert_eq!(pool.stats().misses, 1);
    assert_eq!(pool.release(straggler), ReleaseOutcome::Closed(CloseReason::Stale));

    let fresh = factory.create(&key).unwrap();
    assert_eq!(fresh.generation(), &entry.generation);
    assert_eq!(pool.release(fresh), ReleaseOutcome::Pooled);
    let reused = pool.try_acquire().unwrap();
    assert_eq!(reused.generation(), &entry.generation);
}

/// P3: releases beyond capacity close the instance
#[test]
fn test_p3_capacity_bound() {
    let (factory, key) = factory_with("cap", "function f(r) end");
    let config = PoolConfig::default().with_initial_capacity(2).with_max_capacity(2);
    let pool = pool_for(&factory, &key, config);

    let outcomes: Vec<_> = (0..4)
        .map(|_| pool.release(factory.create(&key).unwrap()))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            ReleaseOutcome::Pooled,
            ReleaseOutcome::Pooled,
            ReleaseOutcome::Closed(CloseReason::Full),
            ReleaseOutcome::Closed(CloseReason::Full),
        ]
    );
    assert_eq!(pool.len(), 2);
}

/// P4: host-owned values survive many bind/invoke/release cycles
#[test]
fn test_p4_host_values_never_freed_by_interpreter() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module
        .add_script(
            "hold",
            br#"
            kept = {}
            function hold(r, l)
                kept[#kept + 1] = r
                collectgarbage()
                return #l
            end
            "#,
        )
        .unwrap();
    let host = MemoryContext::new().into_handle();
    let record = MemoryRecord::with_bins([("a", Value::Integer(1))]).into_handle();
    let list = List::from_vec(vec![Value::Integer(1)]);

    for _ in 0..50 {
        let result = module
            .apply_to_record(&host, "hold", "hold", &record, &[Value::List(list.clone())])
            .unwrap();
        assert_eq!(result.value(), Some(&Value::Integer(1)));
        assert_eq!(Arc::strong_count(&record), 1);
    }

    assert_eq!(Arc::strong_count(&host), 1);
    assert_eq!(record.get("a"), Some(Value::Integer(1)));
    module.remove_script("hold").unwrap();
    assert_eq!(list.ref_count(), 1);
}

/// P5: sustained misses grow capacity up to the maximum and no further
#[test]
fn test_p5_adaptive_growth() {
    let (factory, key) = factory_with("grow", "function f(r) end");
    let config = PoolConfig::default()
        .with_initial_capacity(1)
        .with_max_capacity(4)
        .with_warmup_calls(5);
    let pool = pool_for(&factory, &key, config);

    let mut capacities = Vec::new();
    for _ in 0..12 {
        assert!(pool.try_acquire().is_none());
        capacities.push(pool.capacity());
    }

    assert!(capacities.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(capacities[4], 1);
    assert_eq!(*capacities.last().unwrap(), 4);

    let generation = pool.generation();
    pool.reset(generation);
    assert_eq!(pool.capacity(), 1);
}

/// P6: removing an absent or already removed pool is a no-op
#[test]
fn test_p6_idempotent_remove() {
    let (factory, key) = factory_with("gone", "function f(r) end");
    let registry: PoolRegistry<LuaInstance> =
        PoolRegistry::new(PoolConfig::default().with_initial_capacity(2).with_prewarm(2));
    let generation = factory.catalog().get(&key).unwrap().generation.clone();

    let summary = registry.reset(&key, &generation, &factory);
    assert_eq!(summary.prewarmed, 2);
    let handle = registry.get(&key).unwrap();

    assert!(registry.remove(&key));
    assert!(!registry.remove(&key));
    assert!(!registry.remove(&ScriptKey::new("never").unwrap()));
    assert!(handle.is_retired());

    let late = factory.create(&key).unwrap();
    assert_eq!(handle.release(late), ReleaseOutcome::Closed(CloseReason::Retired));
}
