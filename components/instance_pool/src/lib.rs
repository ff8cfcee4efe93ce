//! Interpreter instance pooling.
//!
//! This crate keeps ready-to-use interpreter instances per script so that
//! the tens of milliseconds spent building one are paid once, not per call.
//! It is independent of the interpreter itself: instances only need to
//! report the script generation they were built against.
//!
//! # Overview
//!
//! - [`ScriptKey`] / [`Generation`] - Script identity and content version
//! - [`InstancePool`] - Bounded FIFO of ready instances with adaptive capacity
//! - [`Lease`] - A checked-out instance that returns itself on drop
//! - [`PoolRegistry`] - Concurrent map from script key to pool
//! - [`InstanceFactory`] - Fabricates instances on a pool miss
//!
//! # Example
//!
//! ```
//! use instance_pool::{Generation, InstancePool, PoolConfig, PooledInstance, ScriptKey};
//!
//! struct Instance(Generation);
//!
//! impl PooledInstance for Instance {
//!     fn generation(&self) -> &Generation {
//!         &self.0
//!     }
//! }
//!
//! let key = ScriptKey::new("sum").unwrap();
//! let gen = Generation::of_content(b"function sum(r) end");
//! let pool = InstancePool::new(key, gen.clone(), PoolConfig::default());
//!
//! assert!(pool.try_acquire().is_none()); // miss
//! pool.release(Instance(gen));
//! assert!(pool.try_acquire().is_some()); // hit
//! assert_eq!(pool.stats().misses, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod factory;
pub mod key;
pub mod lease;
pub mod pool;
pub mod registry;

pub use config::PoolConfig;
pub use error::{CreateError, KeyError, PoolConfigError, PoolResult};
pub use factory::InstanceFactory;
pub use key::{Generation, ScriptKey, MAX_KEY_LEN};
pub use lease::Lease;
pub use pool::{CloseReason, InstancePool, PoolStats, PooledInstance, ReleaseOutcome};
pub use registry::{PoolRegistry, ResetSummary};
