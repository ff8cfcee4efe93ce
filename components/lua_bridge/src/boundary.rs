//! Ownership tags for host values held by the interpreter
//!
//! Every compound value a script can see sits inside a [`ValueBox`]. The box
//! records who is responsible for releasing the underlying host value:
//!
//! - [`BoxScope::InterpreterOwned`] boxes hold a reserved strong reference,
//!   released exactly once when the interpreter collects the userdata.
//! - [`BoxScope::HostOwned`] boxes hold a weak reference. Collecting them
//!   never touches the host's count, and a value the host has already
//!   released is reported instead of dereferenced.

use crate::error::BoundaryError;
use std::fmt;
use std::sync::{Arc, Weak};

/// Who releases the value inside a [`ValueBox`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxScope {
    /// Released by the interpreter when the box is finalized
    InterpreterOwned,
    /// Released by the host; the box only observes it
    HostOwned,
}

/// Interpreter-side wrapper around a host value.
pub enum ValueBox<T: ?Sized> {
    /// Reserved reference, dropped with the box
    Owned(Arc<T>),
    /// Non-owning reference to a value the host keeps alive
    Borrowed(Weak<T>),
}

impl<T: ?Sized> ValueBox<T> {
    /// Box a value the interpreter now co-owns.
    ///
    /// The caller hands over one reservation; cloning an `Arc` to pass in
    /// is that reservation.
    pub fn owned(value: Arc<T>) -> Self {
        ValueBox::Owned(value)
    }

    /// Box a value the host keeps alive for the duration of a call
    pub fn host(value: &Arc<T>) -> Self {
        ValueBox::Borrowed(Arc::downgrade(value))
    }

    /// Ownership scope of this box
    pub fn scope(&self) -> BoxScope {
        match self {
            ValueBox::Owned(_) => BoxScope::InterpreterOwned,
            ValueBox::Borrowed(_) => BoxScope::HostOwned,
        }
    }

    /// Strong handle to the boxed value.
    ///
    /// `kind` names the value in the error raised when a host-owned value
    /// has already been released.
    pub fn unbox(&self, kind: &'static str) -> Result<Arc<T>, BoundaryError> {
        match self {
            ValueBox::Owned(value) => Ok(Arc::clone(value)),
            ValueBox::Borrowed(weak) => weak.upgrade().ok_or(BoundaryError::Released(kind)),
        }
    }

    /// Whether the boxed value can still be reached
    pub fn is_live(&self) -> bool {
        match self {
            ValueBox::Owned(_) => true,
            ValueBox::Borrowed(weak) => weak.strong_count() > 0,
        }
    }
}

impl<T: ?Sized> fmt::Debug for ValueBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBox")
            .field("scope", &self.scope())
            .field("live", &self.is_live())
            .finish()
    }
}
