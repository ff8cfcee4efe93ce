//! UDF Runner CLI Library
//!
//! Provides the Runtime struct and supporting modules for the `udf-run`
//! command, which loads a Lua script and calls its functions against
//! in-memory records and streams.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod json;
pub mod runtime;

pub use cli::{Cli, Command};
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
