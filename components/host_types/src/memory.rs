//! In-memory collaborator implementations.
//!
//! These back the CLI and the test suites: a record held in a bin map, a
//! lock-free FIFO stream, and a host context that keeps records in a vector
//! and forwards script logs to `tracing`.

use crate::context::{HostContext, LogLevel};
use crate::error::{HostError, HostResult};
use crate::record::{Record, DIGEST_LEN};
use crate::stream::Stream;
use crate::value::Value;
use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Longest bin name a record accepts
pub const MAX_BIN_NAME: usize = 15;

/// Record backed by an ordered bin map.
///
/// # Examples
///
/// ```
/// use host_types::memory::MemoryRecord;
/// use host_types::{Record, Value};
///
/// let rec = MemoryRecord::with_bins([("a", Value::Integer(2))]);
/// assert_eq!(rec.get("a"), Some(Value::Integer(2)));
/// assert_eq!(rec.bin_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryRecord {
    bins: RwLock<BTreeMap<String, Value>>,
    ttl: u32,
    generation: u16,
    digest: Option<[u8; DIGEST_LEN]>,
}

impl MemoryRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record holding the given bins
    pub fn with_bins<'a, I>(bins: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let bins = bins
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Self {
            bins: RwLock::new(bins),
            ..Self::default()
        }
    }

    /// Set record metadata
    pub fn with_meta(mut self, ttl: u32, generation: u16) -> Self {
        self.ttl = ttl;
        self.generation = generation;
        self
    }

    /// Set the record digest
    pub fn with_digest(mut self, digest: [u8; DIGEST_LEN]) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Wrap into a shareable record handle
    pub fn into_handle(self) -> Arc<dyn Record> {
        Arc::new(self)
    }
}

impl Record for MemoryRecord {
    fn get(&self, bin: &str) -> Option<Value> {
        self.bins.read().get(bin).cloned()
    }

    fn set(&self, bin: &str, value: Value) -> HostResult<()> {
        if bin.is_empty() || bin.len() > MAX_BIN_NAME {
            return Err(HostError::InvalidBin(bin.to_string()));
        }
        if value.is_nil() {
            return self.remove(bin);
        }
        self.bins.write().insert(bin.to_string(), value);
        Ok(())
    }

    fn remove(&self, bin: &str) -> HostResult<()> {
        self.bins.write().remove(bin);
        Ok(())
    }

    fn ttl(&self) -> u32 {
        self.ttl
    }

    fn generation(&self) -> u16 {
        self.generation
    }

    fn bin_count(&self) -> usize {
        self.bins.read().len()
    }

    fn bin_names(&self) -> Vec<String> {
        self.bins.read().keys().cloned().collect()
    }

    fn digest(&self) -> Option<[u8; DIGEST_LEN]> {
        self.digest
    }
}

/// FIFO stream over a lock-free queue.
#[derive(Debug)]
pub struct MemoryStream {
    queue: SegQueue<Value>,
    readable: bool,
    writable: AtomicBool,
}

impl MemoryStream {
    /// A readable stream pre-filled with `values`
    pub fn input<I: IntoIterator<Item = Value>>(values: I) -> Self {
        let queue = SegQueue::new();
        for value in values {
            queue.push(value);
        }
        Self {
            queue,
            readable: true,
            writable: AtomicBool::new(false),
        }
    }

    /// An empty writable stream
    pub fn output() -> Self {
        Self {
            queue: SegQueue::new(),
            readable: true,
            writable: AtomicBool::new(true),
        }
    }

    /// Stop accepting writes
    pub fn close(&self) {
        self.writable.store(false, Ordering::Release);
    }

    /// Number of values waiting to be read
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no values are waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued value in order
    pub fn drain(&self) -> Vec<Value> {
        let mut values = Vec::with_capacity(self.queue.len());
        while let Some(value) = self.queue.pop() {
            values.push(value);
        }
        values
    }
}

impl Stream for MemoryStream {
    fn read(&self) -> Option<Value> {
        if !self.readable {
            return None;
        }
        self.queue.pop()
    }

    fn write(&self, value: Value) -> HostResult<()> {
        if !self.is_writable() {
            return Err(HostError::NotWritable);
        }
        self.queue.push(value);
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.readable
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire)
    }
}

/// Host context keeping records in memory and capturing script logs.
#[derive(Default)]
pub struct MemoryContext {
    records: Mutex<Vec<Arc<dyn Record>>>,
    logs: Mutex<Vec<(LogLevel, String)>>,
    updates: AtomicUsize,
}

impl MemoryContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into a shareable context handle
    pub fn into_handle(self) -> Arc<dyn HostContext> {
        Arc::new(self)
    }

    /// Messages logged so far
    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.logs.lock().clone()
    }

    /// Number of successful `update` calls
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }

    /// Number of records held
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    fn position(records: &[Arc<dyn Record>], record: &Arc<dyn Record>) -> Option<usize> {
        records.iter().position(|r| Arc::ptr_eq(r, record))
    }
}

impl HostContext for MemoryContext {
    fn create(&self, record: &Arc<dyn Record>) -> HostResult<()> {
        let mut records = self.records.lock();
        if Self::position(&records, record).is_some() {
            return Err(HostError::RecordExists);
        }
        records.push(Arc::clone(record));
        Ok(())
    }

    fn update(&self, record: &Arc<dyn Record>) -> HostResult<()> {
        let mut records = self.records.lock();
        if Self::position(&records, record).is_none() {
            records.push(Arc::clone(record));
        }
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn exists(&self, record: &Arc<dyn Record>) -> bool {
        Self::position(&self.records.lock(), record).is_some()
    }

    fn remove(&self, record: &Arc<dyn Record>) -> HostResult<()> {
        let mut records = self.records.lock();
        match Self::position(&records, record) {
            Some(index) => {
                records.remove(index);
                Ok(())
            }
            None => Err(HostError::RecordNotFound),
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: "udf", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "udf", "{}", message),
            LogLevel::Info => tracing::info!(target: "udf", "{}", message),
            LogLevel::Debug => tracing::debug!(target: "udf", "{}", message),
            LogLevel::Trace => tracing::trace!(target: "udf", "{}", message),
        }
        self.logs.lock().push((level, message.to_string()));
    }
}
