//! Unit tests for the in-memory collaborators

use host_types::memory::{MemoryContext, MemoryRecord, MemoryStream};
use host_types::{HostContext, LogLevel, Record, Stream, Value};
use std::sync::Arc;
use std::thread;

#[test]
fn test_record_metadata() {
    let rec = MemoryRecord::new().with_meta(3600, 4).with_digest([9; 20]);
    assert_eq!(rec.ttl(), 3600);
    assert_eq!(rec.generation(), 4);
    assert_eq!(rec.digest(), Some([9; 20]));
}

#[test]
fn test_record_bin_names_are_sorted() {
    let rec = MemoryRecord::with_bins([("b", Value::Integer(1)), ("a", Value::Integer(2))]);
    assert_eq!(rec.bin_names(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_stream_concurrent_writers() {
    let stream = Arc::new(MemoryStream::output());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for j in 0..25 {
                    stream.write(Value::Integer(i * 100 + j)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(stream.len(), 100);
}

#[test]
fn test_context_is_usable_as_trait_object() {
    let ctx: Arc<dyn HostContext> = MemoryContext::new().into_handle();
    let rec = MemoryRecord::new().into_handle();
    ctx.update(&rec).unwrap();
    assert!(ctx.exists(&rec));
    ctx.log(LogLevel::Debug, "checked");
}
