//! The Handle Protocol (C6): strong/weak reference counting and prototype
//! pointer publication.
//!
//! Grounded in `entry.rs`'s `Handle`/`ArcHandle`/`WeakHandle` triad, adapted
//! so a `Handle` wraps a [`crate::record::TypeRecord`] rather than a value
//! directly — client code counts references *to TypeRecords*, while the
//! `TypeRecord`'s own `handle` field holds the published prototype pointer.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::asset::AssetObject;
use crate::record::TypeRecord;

/// Owned by a `TypeRecord`; holds the published prototype. Transitions
/// `None → Some` exactly once per Load; reload replaces the whole `Some`
/// value atomically under the lock rather than mutating in place.
pub struct Handle {
    prototype: RwLock<Option<Arc<dyn AssetObject>>>,
}

impl Handle {
    pub(crate) fn new() -> Self {
        Handle {
            prototype: RwLock::new(None),
        }
    }

    /// The currently published prototype, if any. Reading takes the
    /// record's read lock internally (acquire semantics on the publish
    /// below give this a consistent view).
    pub fn prototype(&self) -> Option<Arc<dyn AssetObject>> {
        self.prototype.read().clone()
    }

    pub(crate) fn publish(&self, prototype: Arc<dyn AssetObject>) {
        *self.prototype.write() = Some(prototype);
    }

    pub(crate) fn clear(&self) {
        *self.prototype.write() = None;
    }

    pub fn is_published(&self) -> bool {
        self.prototype.read().is_some()
    }
}

/// A strong reference to a `TypeRecord`.
///
/// While held, the type's external strong count is non-zero, which keeps
/// its prototype loaded (see C9). Dropping decrements the count; when it
/// reaches zero the prototype becomes eligible for unload on the next
/// manager pass.
pub struct StrongHandle {
    record: Arc<TypeRecord>,
    null: bool,
}

impl StrongHandle {
    pub(crate) fn new(record: Arc<TypeRecord>) -> Self {
        record.inc_client_strong();
        StrongHandle {
            record,
            null: false,
        }
    }

    /// Builds the process-wide null handle: a request that didn't resolve
    /// (or resolved to the wrong concrete type) yields this rather than an
    /// error, so client code can defer error handling to point of use.
    /// Does not participate in refcounting.
    pub(crate) fn null(record: Arc<TypeRecord>) -> Self {
        StrongHandle {
            record,
            null: true,
        }
    }

    pub fn record(&self) -> &Arc<TypeRecord> {
        &self.record
    }

    pub fn prototype(&self) -> Option<Arc<dyn AssetObject>> {
        self.record.handle().prototype()
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn downgrade(&self) -> WeakHandle {
        if self.null {
            WeakHandle::null(self.record.clone())
        } else {
            WeakHandle::new(self.record.clone())
        }
    }
}

impl Clone for StrongHandle {
    fn clone(&self) -> Self {
        if self.null {
            StrongHandle::null(self.record.clone())
        } else {
            StrongHandle::new(self.record.clone())
        }
    }
}

impl Drop for StrongHandle {
    fn drop(&mut self) {
        if !self.null {
            self.record.dec_client_strong();
        }
    }
}

impl fmt::Debug for StrongHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongHandle")
            .field("path", self.record.path())
            .finish()
    }
}

/// A weak reference to a `TypeRecord`: keeps the record addressable but
/// does not keep its prototype loaded.
pub struct WeakHandle {
    record: Arc<TypeRecord>,
    null: bool,
}

impl WeakHandle {
    pub(crate) fn new(record: Arc<TypeRecord>) -> Self {
        record.inc_client_weak();
        WeakHandle {
            record,
            null: false,
        }
    }

    pub(crate) fn null(record: Arc<TypeRecord>) -> Self {
        WeakHandle {
            record,
            null: true,
        }
    }

    pub fn record(&self) -> &Arc<TypeRecord> {
        &self.record
    }

    pub fn is_null(&self) -> bool {
        self.null
    }
}

impl Clone for WeakHandle {
    fn clone(&self) -> Self {
        if self.null {
            WeakHandle::null(self.record.clone())
        } else {
            WeakHandle::new(self.record.clone())
        }
    }
}

impl Drop for WeakHandle {
    fn drop(&mut self) {
        if !self.null {
            self.record.dec_client_weak();
        }
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("path", self.record.path())
            .finish()
    }
}
