//! Checked-out instances

use crate::pool::{InstancePool, PooledInstance, ReleaseOutcome};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// An instance owned by exactly one invocation.
///
/// Dropping the lease hands the instance back to the pool it came from, on
/// every exit path including errors and panics. A detached lease (pooling
/// disabled) closes the instance instead.
pub struct Lease<I: PooledInstance> {
    instance: Option<I>,
    home: Option<Arc<InstancePool<I>>>,
    reused: bool,
}

impl<I: PooledInstance> Lease<I> {
    /// Lease an instance that returns to `pool`
    pub fn pooled(instance: I, pool: Arc<InstancePool<I>>, reused: bool) -> Self {
        Self {
            instance: Some(instance),
            home: Some(pool),
            reused,
        }
    }

    /// Lease an instance that is closed when dropped
    pub fn detached(instance: I) -> Self {
        Self {
            instance: Some(instance),
            home: None,
            reused: false,
        }
    }

    /// Whether the instance came out of the queue rather than the factory
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Return the instance now, reporting what the pool did with it.
    ///
    /// Detached leases report `None`.
    pub fn finish(mut self) -> Option<ReleaseOutcome> {
        self.give_back()
    }

    fn give_back(&mut self) -> Option<ReleaseOutcome> {
        let instance = self.instance.take()?;
        match self.home.take() {
            Some(pool) => Some(pool.release(instance)),
            None => {
                drop(instance);
                None
            }
        }
    }
}

impl<I: PooledInstance> Deref for Lease<I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.instance.as_ref().expect("lease used after release")
    }
}

impl<I: PooledInstance> DerefMut for Lease<I> {
    fn deref_mut(&mut self) -> &mut I {
        self.instance.as_mut().expect("lease used after release")
    }
}

impl<I: PooledInstance> Drop for Lease<I> {
    fn drop(&mut self) {
        self.give_back();
    }
}
