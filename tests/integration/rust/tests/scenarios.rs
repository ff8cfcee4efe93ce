//! End-to-End Scenario Tests
//!
//! Configure a module, register scripts and invoke them the way the storage
//! server does, checking results together with the cache counters.

use host_types::memory::{MemoryContext, MemoryRecord, MemoryStream};
use host_types::{HostContext, MapKey, Record, Stream, Value};
use instance_pool::PoolConfig;
use integration_tests::ScriptRoots;
use lua_bridge::ValidationCode;
use std::sync::{Arc, Barrier};
use std::thread;
use udf_module::{CallResult, UdfModule};

const SUM_BINS: &str = "function sum(r) return r.a + r.b end";

const TOTAL: &str = r#"
function total(s, field)
    return s:map(function(m) return m[field] end)
            :reduce(function(a, b) return a + b end)
end
"#;

fn ab_record() -> Arc<dyn Record> {
    MemoryRecord::with_bins([("a", Value::Integer(2)), ("b", Value::Integer(3))]).into_handle()
}

/// Scenario A: no cache, every call fabricates
#[test]
fn test_scenario_uncached_record_call() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config().with_cache(false)).unwrap();
    module.add_script("sum", SUM_BINS.as_bytes()).unwrap();
    let host = MemoryContext::new().into_handle();
    let record = ab_record();

    for _ in 0..4 {
        let result = module
            .apply_to_record(&host, "sum", "sum", &record, &[])
            .expect("Invocation failed");
        assert_eq!(result, CallResult::Success(Value::Integer(5)));
    }

    let stats = module.stats();
    assert_eq!(stats.calls, 4);
    assert_eq!(stats.fabrications, 4);
    assert_eq!(stats.failures, 0);
}

/// Scenario B: concurrent stream calls against one key
#[test]
fn test_scenario_concurrent_stream_calls() {
    const WORKERS: usize = 10;
    let roots = ScriptRoots::new().unwrap();
    let config = roots
        .config()
        .with_pool(PoolConfig::default().with_initial_capacity(10));
    let module = UdfModule::new(config).unwrap();
    module.add_script("total", TOTAL.as_bytes()).unwrap();
    let barrier = Barrier::new(WORKERS);

    let outputs: Vec<Vec<Value>> = thread::scope(|s| {
        let handles: Vec<_> = (0..WORKERS as i64)
            .map(|worker| {
                let module = &module;
                let barrier = &barrier;
                s.spawn(move || {
                    let host = MemoryContext::new().into_handle();
                    let input: Vec<Value> = (1..=5)
                        .map(|n| Value::map([(MapKey::from("v"), Value::Integer(n * (worker + 1)))]))
                        .collect();
                    let istream: Arc<dyn Stream> = Arc::new(MemoryStream::input(input));
                    let output = Arc::new(MemoryStream::output());
                    let ostream: Arc<dyn Stream> = output.clone();

                    barrier.wait();
                    let result = module
                        .apply_to_stream(&host, "total", "total", &istream, &ostream, &[Value::from("v")])
                        .expect("Invocation failed");
                    assert!(result.is_success(), "{:?}", result);
                    output.drain()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (worker, output) in outputs.iter().enumerate() {
        assert_eq!(output, &vec![Value::Integer(15 * (worker as i64 + 1))]);
    }

    let pool = module.pool_stats("total").unwrap();
    assert_eq!(pool.calls, WORKERS as u64);
    assert!(pool.misses >= 1 && pool.misses <= WORKERS as u64);
    assert!(pool.queued <= 10);
    assert_eq!(pool.queued as u64, pool.misses);
    assert_eq!(module.stats().fabrications, pool.misses);
}

/// Scenario C: validation reports syntax errors without touching pools
#[test]
fn test_scenario_validate_syntax_error() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module.add_script("sum", SUM_BINS.as_bytes()).unwrap();
    let host = MemoryContext::new().into_handle();
    module
        .apply_to_record(&host, "sum", "sum", &ab_record(), &[])
        .unwrap();
    let before = module.pool_stats("sum").unwrap();

    let result = module.validate("sum.lua", b"function sum(r)\n  return r.a +\nend\n");
    let err = result.error().expect("validation should fail");
    assert_eq!(err.code, ValidationCode::Syntax);
    assert_eq!(err.line, Some(3));
    assert_eq!(err.file, "sum.lua");

    assert_eq!(module.pool_stats("sum").unwrap(), before);
    assert!(module.pool_stats("other").is_none());
}

/// Validation of a script that fails while loading
#[test]
fn test_validate_runtime_error_names_function() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();

    let source = "local function setup()\n  error('bad setup')\nend\nsetup()\n";
    let err = module
        .validate("boot.lua", source.as_bytes())
        .error()
        .cloned()
        .expect("validation should fail");

    assert_eq!(err.code, ValidationCode::Runtime);
    assert_eq!(err.line, Some(2));
    assert!(err.message.contains("bad setup"), "{}", err.message);
    assert_eq!(err.function.as_deref(), Some("setup"));
}

/// Host handle operations issued from a script reach the host context
#[test]
fn test_host_operations_reach_context() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module
        .add_script(
            "touch",
            br#"
            function touch(r, value)
                r.seen = value
                warn("touching %s", value)
                if not host:exists(r) then
                    return host:create(r)
                end
                return host:update(r)
            end
            "#,
        )
        .unwrap();
    let context = Arc::new(MemoryContext::new());
    let host: Arc<dyn HostContext> = context.clone();
    let record = MemoryRecord::new().into_handle();

    let first = module
        .apply_to_record(&host, "touch", "touch", &record, &[Value::from("x")])
        .unwrap();
    let second = module
        .apply_to_record(&host, "touch", "touch", &record, &[Value::from("y")])
        .unwrap();

    assert_eq!(first.value(), Some(&Value::Integer(0)));
    assert_eq!(second.value(), Some(&Value::Integer(0)));
    assert_eq!(record.get("seen"), Some(Value::from("y")));
    assert_eq!(context.record_count(), 1);
    assert_eq!(context.update_count(), 1);
    assert_eq!(context.logs().len(), 2);
}

/// Compound values cross both ways and stay shared
#[test]
fn test_compound_values_round_trip() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module
        .add_script(
            "shape",
            br#"
            function shape(r, l)
                local m = map{count = #l}
                m.first = l[1]
                m.tags = list{"a", "b"}
                list.append(l, "tail")
                return m
            end
            "#,
        )
        .unwrap();
    let host = MemoryContext::new().into_handle();
    let input = Value::list(vec![Value::Integer(10), Value::Integer(20)]);

    let result = module
        .apply_to_record(&host, "shape", "shape", &ab_record(), &[input.clone()])
        .unwrap();

    let expected = Value::map([
        (MapKey::from("count"), Value::Integer(2)),
        (MapKey::from("first"), Value::Integer(10)),
        (MapKey::from("tags"), Value::list(vec![Value::from("a"), Value::from("b")])),
    ]);
    assert_eq!(result.value(), Some(&expected));
    assert_eq!(input.as_list().unwrap().read().len(), 3);
}
