//! Script key to pool registry
//!
//! Pools live in a sharded concurrent map. Lookups take a shard read lock
//! just long enough to clone the pool handle; creation and removal take the
//! shard write lock. Queue traffic inside a pool never touches the map.

use crate::config::PoolConfig;
use crate::factory::InstanceFactory;
use crate::key::{Generation, ScriptKey};
use crate::pool::{InstancePool, PoolStats, PooledInstance, ReleaseOutcome};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What a [`PoolRegistry::reset`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetSummary {
    /// Stale instances closed
    pub closed: usize,
    /// Fresh instances queued
    pub prewarmed: usize,
}

/// Concurrent map from script key to its instance pool.
pub struct PoolRegistry<I> {
    pools: DashMap<ScriptKey, Arc<InstancePool<I>>>,
    config: PoolConfig,
}

impl<I: PooledInstance> PoolRegistry<I> {
    /// Create an empty registry whose pools follow `config`
    pub fn new(config: PoolConfig) -> Self {
        Self {
            pools: DashMap::new(),
            config,
        }
    }

    /// Sizing policy applied to new pools
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Pool for `key`, if one exists
    pub fn get(&self, key: &ScriptKey) -> Option<Arc<InstancePool<I>>> {
        self.pools.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Pool for `key`, creating an empty one under `generation` if absent.
    ///
    /// Handles stay valid after the pool is removed; releases into a removed
    /// pool close the instance.
    pub fn get_or_create(&self, key: &ScriptKey, generation: &Generation) -> Arc<InstancePool<I>> {
        if let Some(pool) = self.get(key) {
            return pool;
        }
        let entry = self.pools.entry(key.clone()).or_insert_with(|| {
            info!(%key, %generation, "creating instance pool");
            Arc::new(InstancePool::new(key.clone(), generation.clone(), self.config))
        });
        Arc::clone(entry.value())
    }

    /// Registered pool for `key`, skipping one retired by a concurrent remove
    fn live(&self, key: &ScriptKey, generation: &Generation) -> Arc<InstancePool<I>> {
        loop {
            let pool = self.get_or_create(key, generation);
            if !pool.is_retired() {
                return pool;
            }
        }
    }

    /// Drain the pool for `key` and re-arm it under `generation`.
    ///
    /// Creates the pool if absent, then pre-populates it with up to
    /// `prewarm` fresh instances. A failed pre-population is logged and
    /// leaves a valid, partially filled or empty pool. If the pool is
    /// removed meanwhile, pre-population stops at the first closed release.
    pub fn reset<F>(&self, key: &ScriptKey, generation: &Generation, factory: &F) -> ResetSummary
    where
        F: InstanceFactory<Instance = I>,
    {
        let pool = self.live(key, generation);
        let closed = pool.reset(generation.clone());
        let mut summary = ResetSummary {
            closed,
            prewarmed: 0,
        };

        for _ in 0..self.config.prewarm {
            match factory.create(key) {
                Ok(instance) => {
                    if pool.release(instance) != ReleaseOutcome::Pooled {
                        break;
                    }
                    summary.prewarmed += 1;
                }
                Err(err) => {
                    warn!(%key, error = %err, "pool pre-population failed");
                    break;
                }
            }
        }

        info!(
            %key,
            %generation,
            closed = summary.closed,
            prewarmed = summary.prewarmed,
            "instance pool reset"
        );
        summary
    }

    /// Destroy the pool for `key` and every queued instance.
    ///
    /// Returns whether a pool existed. Removing an absent key is a no-op.
    pub fn remove(&self, key: &ScriptKey) -> bool {
        match self.pools.remove(key) {
            Some((_, pool)) => {
                let closed = pool.retire();
                info!(%key, closed, "instance pool removed");
                true
            }
            None => false,
        }
    }

    /// Remove every pool
    pub fn clear(&self) {
        for key in self.keys() {
            self.remove(&key);
        }
    }

    /// Keys with a live pool
    pub fn keys(&self) -> Vec<ScriptKey> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pools exist
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Counters for the pool serving `key`
    pub fn stats(&self, key: &ScriptKey) -> Option<PoolStats> {
        self.get(key).map(|pool| pool.stats())
    }
}

impl<I> Drop for PoolRegistry<I> {
    fn drop(&mut self) {
        // Handles held by in-flight leases outlive the map; mark them retired.
        for entry in self.pools.iter() {
            entry.value().retire();
        }
    }
}
