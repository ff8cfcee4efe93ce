//! Lua interpreter instances for user-defined functions
//!
//! This crate builds ready-to-call Lua states bound to a script, and owns
//! the boundary across which host values enter and leave them:
//! - [`ValueBox`] tags every compound value with who may release it
//! - [`convert`] copies scalars and boxes compounds in both directions
//! - [`LuaFactory`] fabricates instances for the pool
//! - [`ScriptCatalog`] tracks script content and generations
//! - [`validate`] dry-runs a script in a throwaway state
//!
//! # Example
//!
//! ```
//! use lua_bridge::{validate, SearchPaths};
//!
//! let paths = SearchPaths::default();
//! let result = validate(&paths, "broken.lua", b"function f( return 1 end");
//! assert!(!result.is_success());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod catalog;
pub mod convert;
pub mod error;
pub mod factory;
pub mod instance;
pub mod modules;
pub mod prelude;
pub mod userdata;
pub mod validate;

pub use boundary::{BoxScope, ValueBox};
pub use catalog::{
    ScanReport, ScriptCatalog, ScriptEntry, ScriptKind, ScriptOrigin, SearchPaths, VENDOR_DIR,
};
pub use error::{describe_lua_error, BoundaryError, BridgeError, BridgeResult, PathError};
pub use factory::LuaFactory;
pub use instance::{LuaInstance, PreparedCall, StreamScope};
pub use validate::{validate, ValidationCode, ValidationError, ValidationResult};
