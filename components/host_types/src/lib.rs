//! Host value model and collaborator interfaces.
//!
//! This crate provides the native side of the script boundary: the values a
//! storage server hands to user scripts, and the capability traits through
//! which scripts reach records, streams and the server itself.
//!
//! # Overview
//!
//! - [`Value`] - Discriminated union over every host value kind
//! - [`Shared`] - Reference-counted, interior-mutable compound storage
//! - [`Record`] - Record handle capabilities (bins, ttl, generation, digest)
//! - [`Stream`] - Stream handle capabilities (read / write)
//! - [`HostContext`] - Server operations available to a script
//! - [`memory`] - In-memory implementations of the collaborator traits
//!
//! # Examples
//!
//! ```
//! use host_types::{List, Value};
//!
//! let list = List::from_vec(vec![Value::Integer(1), Value::Integer(2)]);
//! let value = Value::List(list.clone());
//!
//! // Cloning a compound value reserves another reference.
//! assert_eq!(list.ref_count(), 2);
//! drop(value);
//! assert_eq!(list.ref_count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod context;
mod error;
pub mod memory;
mod record;
mod shared;
mod stream;
mod value;

pub use context::{HostContext, LogLevel};
pub use error::{HostError, HostResult};
pub use record::{Record, DIGEST_LEN};
pub use shared::Shared;
pub use stream::Stream;
pub use value::{Bytes, List, Map, MapKey, Value, MAX_DEPTH};
