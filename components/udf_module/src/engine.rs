//! Single-invocation orchestration
//!
//! A call walks a fixed sequence of stages:
//!
//! ```text
//! Idle -> EnvironmentVerified -> InstanceAcquired -> Bound -> Invoked
//!      -> ResultConverted -> InstanceReleased -> Done
//! ```
//!
//! Any stage may end in failure. The instance is held by a [`Lease`], so it
//! is released on every exit path, early returns included.

use crate::error::UdfResult;
use host_types::{HostContext, Record, Stream, Value};
use instance_pool::{CreateError, Lease, PoolConfig, PoolRegistry, PoolStats, ScriptKey};
use lua_bridge::{BridgeError, LuaFactory, LuaInstance, ScriptCatalog, ScriptEntry, StreamScope};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Outcome of a script function
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// The function returned normally
    Success(Value),
    /// The function raised, or its result could not be converted
    Failure(String),
}

impl CallResult {
    /// Whether the call succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    /// Returned value, for a success
    pub fn value(&self) -> Option<&Value> {
        match self {
            CallResult::Success(value) => Some(value),
            CallResult::Failure(_) => None,
        }
    }

    /// Failure message, for a failure
    pub fn failure(&self) -> Option<&str> {
        match self {
            CallResult::Success(_) => None,
            CallResult::Failure(message) => Some(message),
        }
    }
}

/// Invocation progress, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing done yet
    Idle,
    /// Search paths checked
    EnvironmentVerified,
    /// Instance checked out or fabricated
    InstanceAcquired,
    /// Host handle and arguments installed
    Bound,
    /// Target function returned
    Invoked,
    /// Result copied out
    ResultConverted,
    /// Instance handed back
    InstanceReleased,
    /// Finished
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Engine counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineStats {
    /// Invocations started
    pub calls: u64,
    /// Interpreter instances built on the call path
    pub fabrications: u64,
    /// Invocations that ended in a failure result or error
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    fabrications: AtomicU64,
    failures: AtomicU64,
}

/// What a call runs against
enum Target<'a> {
    Record(&'a Arc<dyn Record>),
    Stream {
        scope: StreamScope,
        input: &'a Arc<dyn Stream>,
        output: &'a Arc<dyn Stream>,
    },
}

/// Per-call progress tracker
struct Invocation<'a> {
    key: &'a ScriptKey,
    function: &'a str,
    stage: Stage,
}

impl Invocation<'_> {
    fn advance(&mut self, stage: Stage) {
        trace!(key = %self.key, function = self.function, from = %self.stage, to = %stage, "invocation stage");
        self.stage = stage;
    }
}

/// Runs script functions on pooled or throwaway instances.
pub struct InvocationEngine {
    factory: LuaFactory,
    registry: RwLock<Option<Arc<PoolRegistry<LuaInstance>>>>,
    counters: Counters,
}

impl InvocationEngine {
    /// Engine reading scripts from `catalog`, with caching off
    pub fn new(catalog: Arc<ScriptCatalog>) -> Self {
        Self {
            factory: LuaFactory::new(catalog),
            registry: RwLock::new(None),
            counters: Counters::default(),
        }
    }

    /// Script catalog
    pub fn catalog(&self) -> &Arc<ScriptCatalog> {
        self.factory.catalog()
    }

    /// Turn pooling on with `config`.
    ///
    /// An existing registry is kept when its policy already matches;
    /// otherwise it is replaced and its pools are retired.
    pub fn enable_cache(&self, config: PoolConfig) {
        let mut slot = self.registry.write();
        if slot.as_ref().is_some_and(|registry| *registry.config() == config) {
            return;
        }
        *slot = Some(Arc::new(PoolRegistry::new(config)));
        info!(
            initial_capacity = config.initial_capacity,
            max_capacity = config.max_capacity,
            "instance cache enabled"
        );
    }

    /// Turn pooling off and close every pooled instance
    pub fn disable_cache(&self) {
        if self.registry.write().take().is_some() {
            info!("instance cache disabled");
        }
    }

    /// Active pool registry, when caching is on
    pub fn registry(&self) -> Option<Arc<PoolRegistry<LuaInstance>>> {
        self.registry.read().clone()
    }

    /// Re-arm the pool for `entry` under its generation
    pub fn reset(&self, entry: &ScriptEntry) {
        if let Some(registry) = self.registry() {
            registry.reset(&entry.key, &entry.generation, &self.factory);
        }
    }

    /// Drop the pool for `key`; returns whether one existed
    pub fn remove(&self, key: &ScriptKey) -> bool {
        self.registry().is_some_and(|registry| registry.remove(key))
    }

    /// Drop every pool
    pub fn clear(&self) {
        if let Some(registry) = self.registry() {
            registry.clear();
        }
    }

    /// Counters for the pool serving `key`
    pub fn pool_stats(&self, key: &ScriptKey) -> Option<PoolStats> {
        self.registry().and_then(|registry| registry.stats(key))
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            fabrications: self.counters.fabrications.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Call `function` of `key` with `record` followed by `args`
    pub fn apply_to_record(
        &self,
        host: &Arc<dyn HostContext>,
        key: &ScriptKey,
        function: &str,
        record: &Arc<dyn Record>,
        args: &[Value],
    ) -> UdfResult<CallResult> {
        self.run(host, key, function, Target::Record(record), args)
    }

    /// Run the stream pipeline built by `function` of `key`.
    ///
    /// Output is observed through `output`; a success carries `Nil`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_to_stream(
        &self,
        host: &Arc<dyn HostContext>,
        key: &ScriptKey,
        function: &str,
        scope: StreamScope,
        input: &Arc<dyn Stream>,
        output: &Arc<dyn Stream>,
        args: &[Value],
    ) -> UdfResult<CallResult> {
        let target = Target::Stream {
            scope,
            input,
            output,
        };
        self.run(host, key, function, target, args)
    }

    fn run(
        &self,
        host: &Arc<dyn HostContext>,
        key: &ScriptKey,
        function: &str,
        target: Target<'_>,
        args: &[Value],
    ) -> UdfResult<CallResult> {
        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        let mut call = Invocation {
            key,
            function,
            stage: Stage::Idle,
        };

        let result = self.drive(&mut call, host, target, args);
        match &result {
            Ok(CallResult::Success(_)) => {}
            Ok(CallResult::Failure(message)) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(%key, function, stage = %call.stage, error = %message, "script function failed");
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(%key, function, stage = %call.stage, error = %err, "invocation aborted");
            }
        }
        result
    }

    fn drive(
        &self,
        call: &mut Invocation<'_>,
        host: &Arc<dyn HostContext>,
        target: Target<'_>,
        args: &[Value],
    ) -> UdfResult<CallResult> {
        self.catalog().paths().verify()?;
        call.advance(Stage::EnvironmentVerified);

        let mut lease = self.acquire(call.key)?;
        call.advance(Stage::InstanceAcquired);

        lease.bind_host(host)?;
        let prepared = match &target {
            Target::Record(record) => lease.prepare_record_call(call.function, record, args),
            Target::Stream {
                scope,
                input,
                output,
            } => lease.prepare_stream_call(call.function, *scope, input, output, args),
        };
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return Ok(failure(err)),
        };
        call.advance(Stage::Bound);

        let returned = match lease.invoke(prepared) {
            Ok(returned) => returned,
            Err(err) => return Ok(failure(err)),
        };
        call.advance(Stage::Invoked);

        let value = match target {
            Target::Record(_) => match lease.convert_result(&returned) {
                Ok(value) => value,
                Err(err) => return Ok(failure(err)),
            },
            Target::Stream { .. } => Value::Nil,
        };
        drop(returned);
        call.advance(Stage::ResultConverted);

        let outcome = lease.finish();
        call.advance(Stage::InstanceReleased);
        debug!(key = %call.key, ?outcome, "instance released");

        call.advance(Stage::Done);
        Ok(CallResult::Success(value))
    }

    /// Check out an instance for `key`, fabricating one on a miss
    fn acquire(&self, key: &ScriptKey) -> UdfResult<Lease<LuaInstance>> {
        let entry = self
            .catalog()
            .resolve(key)?
            .ok_or_else(|| CreateError::NotFound(key.clone()))?;

        let Some(registry) = self.registry() else {
            return Ok(Lease::detached(self.fabricate(&entry)?));
        };
        let pool = registry.get_or_create(key, &entry.generation);
        match pool.try_acquire() {
            Some(instance) => Ok(Lease::pooled(instance, pool, true)),
            None => {
                let instance = self.fabricate(&entry)?;
                Ok(Lease::pooled(instance, pool, false))
            }
        }
    }

    fn fabricate(&self, entry: &ScriptEntry) -> Result<LuaInstance, CreateError> {
        self.counters.fabrications.fetch_add(1, Ordering::Relaxed);
        self.factory.build(entry)
    }
}

fn failure(err: BridgeError) -> CallResult {
    CallResult::Failure(err.to_string())
}
