//! User-defined function module for a storage server
//!
//! Ties the script catalog, the interpreter instance pools and the Lua
//! boundary together behind the operations the server calls.
//!
//! # Overview
//!
//! - [`UdfModule`] - configure, register scripts, validate, apply functions
//! - [`InvocationEngine`] - drives one call from environment check to release
//! - [`ModuleConfig`] - serde-loadable module options
//! - [`CallResult`] - success value or script failure message
//!
//! # Example
//!
//! ```
//! use host_types::memory::{MemoryContext, MemoryRecord};
//! use host_types::Value;
//! use udf_module::{ModuleConfig, UdfModule};
//!
//! let system = tempfile::tempdir().unwrap();
//! let user = tempfile::tempdir().unwrap();
//! let module = UdfModule::new(ModuleConfig::default().with_paths(system.path(), user.path())).unwrap();
//! module.add_script("math", b"function add(r, a, b) return a + b end").unwrap();
//!
//! let host = MemoryContext::new().into_handle();
//! let record = MemoryRecord::new().into_handle();
//! let result = module
//!     .apply_to_record(&host, "math", "add", &record, &[Value::Integer(2), Value::Integer(3)])
//!     .unwrap();
//! assert_eq!(result.value(), Some(&Value::Integer(5)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod module;

pub use config::ModuleConfig;
pub use engine::{CallResult, EngineStats, InvocationEngine, Stage};
pub use error::{UdfError, UdfResult};
pub use module::UdfModule;
