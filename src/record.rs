//! `TypeRecord`: the manager-owned runtime metadata record for one asset.
//!
//! Grounded field-for-field on `AssetTypeInfo`: immutable identity fields
//! (`path`, `parent`, `concrete_type`) need no lock to read; everything that
//! changes after creation (`cache_index`, `modify_hash`, `modify_date`,
//! `load_state`) lives behind the record's own `RwLock` exactly as the
//! threading discipline documented there prescribes.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::asset::{AssetObject, DependencyRef};
use crate::handle::Handle;
use crate::path::AssetPath;
use crate::registry::TypeDescriptor;

/// `(blob_id, object_id, uid)` — identifies an object inside a cache block.
/// `uid` is a freshness tag checked on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheIndex {
    pub blob_id: u32,
    pub object_id: u32,
    pub uid: u32,
}

/// `UNLOADED → LOADING → LOADED | FAILED`, per the load state machine (C9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// Fields mutated only under the record's write lock.
struct Runtime {
    cache_index: Option<CacheIndex>,
    modify_hash: u64,
    modify_date: SystemTime,
    load_state: LoadState,
    /// Logical deletion: physical teardown waits for refcounts to reach 0.
    deleted: bool,
    out_edges: Vec<DependencyRef>,
}

/// The manager-owned runtime metadata record for one asset.
///
/// `parent` is a non-owning [`Weak`] reference: the parent record is owned
/// by the same [`crate::domain::DomainMap`], never by its children.
pub struct TypeRecord {
    path: AssetPath,
    parent: RwLock<Option<Weak<TypeRecord>>>,
    concrete_type: &'static TypeDescriptor,
    handle: Handle,
    instances: parking_lot::Mutex<Vec<Weak<dyn AssetObject>>>,
    runtime: RwLock<Runtime>,

    /// External (client Handle Protocol) reference counts — distinct from
    /// the dependency in-edge counts below. `acquire_strong`/`release_strong`
    /// and their weak counterparts operate on these.
    client_strong: AtomicU32,
    client_weak: AtomicU32,

    /// Count of other TypeRecords holding `self` as a strong/weak
    /// out-edge (dependency tracking, C8). A strong in-edge count > 0
    /// blocks Delete.
    dep_strong_in: AtomicU32,
    dep_weak_in: AtomicU32,
}

impl TypeRecord {
    pub fn new(path: AssetPath, concrete_type: &'static TypeDescriptor) -> Arc<Self> {
        Arc::new(TypeRecord {
            path,
            parent: RwLock::new(None),
            concrete_type,
            handle: Handle::new(),
            instances: parking_lot::Mutex::new(Vec::new()),
            runtime: RwLock::new(Runtime {
                cache_index: None,
                modify_hash: 0,
                modify_date: SystemTime::UNIX_EPOCH,
                load_state: LoadState::Unloaded,
                deleted: false,
                out_edges: Vec::new(),
            }),
            client_strong: AtomicU32::new(0),
            client_weak: AtomicU32::new(0),
            dep_strong_in: AtomicU32::new(0),
            dep_weak_in: AtomicU32::new(0),
        })
    }

    pub fn with_parent(
        path: AssetPath,
        concrete_type: &'static TypeDescriptor,
        parent: &Arc<TypeRecord>,
    ) -> Arc<Self> {
        let record = Self::new(path, concrete_type);
        *record.parent.write() = Some(Arc::downgrade(parent));
        record
    }

    // --- immutable identity: no lock required ---

    pub fn path(&self) -> &AssetPath {
        &self.path
    }

    pub fn concrete_type(&self) -> &'static TypeDescriptor {
        self.concrete_type
    }

    pub fn is_a(&self, descriptor: &'static TypeDescriptor) -> bool {
        self.concrete_type.id == descriptor.id
    }

    pub fn is_concrete(&self) -> bool {
        self.parent.read().is_none()
    }

    pub fn parent(&self) -> Option<Arc<TypeRecord>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Sets the parent, refusing if it would create a cycle.
    pub fn set_parent(self: &Arc<Self>, parent: Option<Arc<TypeRecord>>) -> Result<(), ()> {
        if let Some(p) = &parent {
            let mut cursor = Some(p.clone());
            while let Some(node) = cursor {
                if Arc::ptr_eq(&node, self) {
                    return Err(());
                }
                cursor = node.parent();
            }
        }
        *self.parent.write() = parent.map(|p| Arc::downgrade(&p));
        Ok(())
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    // --- mutable runtime state: record's own RW-lock ---

    pub fn load_state(&self) -> LoadState {
        self.runtime.read().load_state
    }

    pub fn set_load_state(&self, state: LoadState) {
        self.runtime.write().load_state = state;
    }

    pub fn cache_index(&self) -> Option<CacheIndex> {
        self.runtime.read().cache_index
    }

    pub fn set_cache_index(&self, index: Option<CacheIndex>) {
        self.runtime.write().cache_index = index;
    }

    pub fn modify_hash(&self) -> u64 {
        self.runtime.read().modify_hash
    }

    pub fn modify_date(&self) -> SystemTime {
        self.runtime.read().modify_date
    }

    pub fn set_modify_info(&self, hash: u64, date: SystemTime) {
        let mut rt = self.runtime.write();
        rt.modify_hash = hash;
        rt.modify_date = date;
    }

    pub fn is_deleted(&self) -> bool {
        self.runtime.read().deleted
    }

    pub fn mark_deleted(&self) {
        self.runtime.write().deleted = true;
    }

    pub fn out_edges(&self) -> Vec<DependencyRef> {
        self.runtime.read().out_edges.clone()
    }

    pub(crate) fn set_out_edges(&self, edges: Vec<DependencyRef>) {
        self.runtime.write().out_edges = edges;
    }

    // --- instance tracking (weak refs for hot-reload/instantiation) ---

    pub fn register_instance(&self, instance: &Arc<dyn AssetObject>) {
        self.instances.lock().push(Arc::downgrade(instance));
    }

    pub fn live_instances(&self) -> Vec<Arc<dyn AssetObject>> {
        let mut guard = self.instances.lock();
        guard.retain(|w| w.strong_count() > 0);
        guard.iter().filter_map(Weak::upgrade).collect()
    }

    // --- client (Handle Protocol) reference counts ---

    pub fn client_strong_count(&self) -> u32 {
        self.client_strong.load(Ordering::Acquire)
    }

    pub fn client_weak_count(&self) -> u32 {
        self.client_weak.load(Ordering::Acquire)
    }

    pub(crate) fn inc_client_strong(&self) -> u32 {
        self.client_strong.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn dec_client_strong(&self) -> u32 {
        let prev = self.client_strong.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "client_strong underflow on {:?}", self.path);
        prev - 1
    }

    pub(crate) fn inc_client_weak(&self) -> u32 {
        self.client_weak.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn dec_client_weak(&self) -> u32 {
        let prev = self.client_weak.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "client_weak underflow on {:?}", self.path);
        prev - 1
    }

    pub fn is_reapable(&self) -> bool {
        self.client_strong_count() == 0 && self.client_weak_count() == 0
    }

    // --- dependency in-edge counts (C8) ---

    pub fn dep_strong_in(&self) -> u32 {
        self.dep_strong_in.load(Ordering::Acquire)
    }

    pub fn dep_weak_in(&self) -> u32 {
        self.dep_weak_in.load(Ordering::Acquire)
    }

    pub(crate) fn inc_dep_in(&self, strength: crate::asset::DependencyStrength) {
        use crate::asset::DependencyStrength::*;
        match strength {
            Strong => self.dep_strong_in.fetch_add(1, Ordering::AcqRel),
            Weak => self.dep_weak_in.fetch_add(1, Ordering::AcqRel),
        };
    }

    pub(crate) fn dec_dep_in(&self, strength: crate::asset::DependencyStrength) {
        use crate::asset::DependencyStrength::*;
        match strength {
            Strong => self.dep_strong_in.fetch_sub(1, Ordering::AcqRel),
            Weak => self.dep_weak_in.fetch_sub(1, Ordering::AcqRel),
        };
    }

    pub fn can_delete(&self) -> bool {
        self.dep_strong_in() == 0 && self.client_strong_count() == 0
    }
}

impl fmt::Debug for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRecord")
            .field("path", &self.path)
            .field("concrete_type", &self.concrete_type.name)
            .field("load_state", &self.load_state())
            .finish()
    }
}
