//! Reference-counted storage for compound host values.
//!
//! Lists, maps and byte buffers are shared between the host and any number
//! of script-side handles. Cloning a [`Shared`] reserves a reference;
//! dropping it releases one. The last release frees the storage.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// Shared, interior-mutable storage cell.
///
/// # Examples
///
/// ```
/// use host_types::Shared;
///
/// let cell = Shared::new(vec![1u8, 2, 3]);
/// let reserved = cell.clone();
/// reserved.write().push(4);
///
/// assert_eq!(cell.read().len(), 4);
/// assert!(cell.ptr_eq(&reserved));
/// ```
pub struct Shared<T> {
    cell: Arc<RwLock<T>>,
}

impl<T> Shared<T> {
    /// Allocate a new cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(RwLock::new(value)),
        }
    }

    /// Wrap an existing reference-counted cell
    pub fn from_arc(cell: Arc<RwLock<T>>) -> Self {
        Self { cell }
    }

    /// Borrow the underlying reference-counted cell
    pub fn as_arc(&self) -> &Arc<RwLock<T>> {
        &self.cell
    }

    /// Consume the handle, yielding the underlying cell without releasing it
    pub fn into_arc(self) -> Arc<RwLock<T>> {
        self.cell
    }

    /// Lock for reading
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read()
    }

    /// Lock for writing
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.write()
    }

    /// Number of live strong references to the storage
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.cell)
    }

    /// Whether both handles refer to the same storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone> Shared<T> {
    /// Copy the contents into a new, independent cell
    pub fn deep_clone(&self) -> Self {
        Self::new(self.read().clone())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cell.read().fmt(f)
    }
}
