//! Script Lifecycle Integration Tests
//!
//! Scripts on disk flowing through catalog scans, file events, module
//! search paths and pool resets.

use host_types::memory::{MemoryContext, MemoryRecord};
use host_types::Value;
use instance_pool::ScriptKey;
use integration_tests::ScriptRoots;
use lua_bridge::{ScriptKind, VENDOR_DIR};
use std::fs;
use udf_module::{CallResult, UdfError, UdfModule};

fn call(module: &UdfModule, script: &str, function: &str) -> CallResult {
    let host = MemoryContext::new().into_handle();
    let record = MemoryRecord::new().into_handle();
    module
        .apply_to_record(&host, script, function, &record, &[])
        .expect("Invocation failed")
}

/// Test: configure scans both roots, user shadows system
#[test]
fn test_configure_scans_and_user_shadows_system() {
    let roots = ScriptRoots::new().unwrap();
    roots
        .write(roots.system.path(), "who.lua", "function who(r) return 'system' end")
        .unwrap();
    roots
        .write(roots.user.path(), "who.lua", "function who(r) return 'user' end")
        .unwrap();
    roots
        .write(roots.system.path(), "only.lua", "function only(r) return 1 end")
        .unwrap();
    roots.write(roots.system.path(), "notes.txt", "ignored").unwrap();

    let module = UdfModule::new(roots.config()).unwrap();

    let mut keys = module.catalog().keys();
    keys.sort();
    assert_eq!(keys, vec![ScriptKey::new("only").unwrap(), ScriptKey::new("who").unwrap()]);
    assert_eq!(call(&module, "who", "who").value(), Some(&Value::from("user")));
    assert!(module.pool_stats("only").is_some());
}

/// Test: native modules are cataloged by extension
#[test]
fn test_native_modules_are_cataloged() {
    let roots = ScriptRoots::new().unwrap();
    roots.write(roots.user.path(), "fast.so", "not really a library").unwrap();

    let module = UdfModule::new(roots.config().with_cache(false)).unwrap();
    let entry = module.catalog().get(&ScriptKey::new("fast").unwrap()).unwrap();
    assert_eq!(entry.kind, ScriptKind::Native);
}

/// Test: file events drive catalog and pools
#[test]
fn test_file_events() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    let path = roots
        .write(roots.user.path(), "ev.lua", "function f(r) return 1 end")
        .unwrap();

    module.on_script_added("ev.lua").unwrap();
    assert_eq!(call(&module, "ev", "f").value(), Some(&Value::Integer(1)));
    let first = module.pool_stats("ev").unwrap().generation;

    fs::write(&path, "function f(r) return 2 end").unwrap();
    module.on_script_added("ev.lua").unwrap();
    assert_ne!(module.pool_stats("ev").unwrap().generation, first);
    assert_eq!(call(&module, "ev", "f").value(), Some(&Value::Integer(2)));

    fs::remove_file(&path).unwrap();
    module.on_script_removed("ev.lua").unwrap();
    module.on_script_removed("ev.lua").unwrap();
    assert!(module.pool_stats("ev").is_none());
    assert!(matches!(
        module.apply_to_record(
            &MemoryContext::new().into_handle(),
            "ev",
            "f",
            &MemoryRecord::new().into_handle(),
            &[]
        ),
        Err(UdfError::Creation(_))
    ));
}

/// Test: rescan keeps inline scripts and drops deleted files
#[test]
fn test_rescan_keeps_inline_scripts() {
    let roots = ScriptRoots::new().unwrap();
    let disk = roots
        .write(roots.system.path(), "disk.lua", "function f(r) return 'disk' end")
        .unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module
        .add_script("inline", b"function f(r) return 'inline' end")
        .unwrap();

    fs::remove_file(disk).unwrap();
    let report = module.rescan_script_directories().unwrap();

    assert_eq!(report.removed, vec![ScriptKey::new("disk").unwrap()]);
    assert!(report.changed.is_empty());
    assert_eq!(call(&module, "inline", "f").value(), Some(&Value::from("inline")));
}

/// Test: scripts require modules from user, system and vendor roots
#[test]
fn test_require_resolves_search_paths() {
    let roots = ScriptRoots::new().unwrap();
    let vendor = roots.system.path().join(VENDOR_DIR);
    fs::create_dir(&vendor).unwrap();
    roots
        .write(&vendor, "vendored.lua", "return { answer = function() return 40 end }")
        .unwrap();
    roots
        .write(roots.user.path(), "helpers.lua", "return { two = function() return 2 end }")
        .unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module
        .add_script(
            "uses",
            br#"
            local vendored = require("vendored")
            local helpers = require("helpers")
            function f(r) return vendored.answer() + helpers.two() end
            "#,
        )
        .unwrap();

    assert_eq!(call(&module, "uses", "f").value(), Some(&Value::Integer(42)));
}

/// Test: changing search roots forgets scripts from the old roots
#[test]
fn test_reconfigure_paths() {
    let old = ScriptRoots::new().unwrap();
    old.write(old.user.path(), "a.lua", "function f(r) return 'a' end")
        .unwrap();
    let module = UdfModule::new(old.config()).unwrap();
    assert_eq!(call(&module, "a", "f").value(), Some(&Value::from("a")));

    let new = ScriptRoots::new().unwrap();
    new.write(new.user.path(), "b.lua", "function f(r) return 'b' end")
        .unwrap();
    module.configure(new.config()).unwrap();

    assert!(module.pool_stats("a").is_none());
    assert!(module.catalog().get(&ScriptKey::new("a").unwrap()).is_none());
    assert_eq!(call(&module, "b", "f").value(), Some(&Value::from("b")));
}

/// Test: a script failing to load is a creation error, every time
#[test]
fn test_load_failure_is_creation_error() {
    let roots = ScriptRoots::new().unwrap();
    let module = UdfModule::new(roots.config()).unwrap();
    module.add_script("broken", b"error('refuse to load')").unwrap();
    let host = MemoryContext::new().into_handle();
    let record = MemoryRecord::new().into_handle();

    for _ in 0..2 {
        let err = module
            .apply_to_record(&host, "broken", "f", &record, &[])
            .unwrap_err();
        assert!(matches!(err, UdfError::Creation(_)), "{:?}", err);
    }
    assert_eq!(module.stats().fabrications, 2);
    assert_eq!(module.stats().failures, 2);
    assert_eq!(module.pool_stats("broken").unwrap().queued, 0);
}
