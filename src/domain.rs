//! Per-domain type map (C4): `AssetPath → TypeRecord`, sharded to reduce
//! contention, grounded in the teacher's `cache.rs`/`map.rs` sharded
//! `AssetMap` (shard count scaled to available parallelism, each shard on
//! its own cache line).

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::path::AssetPath;
use crate::record::TypeRecord;
use crate::util::{hash_one, HashMap, HashSet, RandomState};

// Keep shards on distinct cache lines to avoid false sharing under
// concurrent load, same rationale as the teacher's `Shard`.
#[repr(align(64))]
struct Shard {
    records: RwLock<HashMap<String, Arc<TypeRecord>>>,
}

/// Per-domain registry of `TypeRecord`s, guarded by a sharded RW-lock.
///
/// A single domain's records are spread across shards keyed by path hash;
/// writers only ever lock the shard they touch, so unrelated concurrent
/// reads/writes on other paths never contend.
pub struct DomainMap {
    name: String,
    hasher: RandomState,
    shards: Box<[Shard]>,
    dirty_source: RwLock<HashSet<String>>,
    dirty_cache: RwLock<HashSet<String>>,
    len: AtomicUsize,
}

impl DomainMap {
    pub fn new(name: impl Into<String>) -> Self {
        let shard_count = match std::thread::available_parallelism() {
            Ok(n) => 4 * n.get().next_power_of_two(),
            Err(err) => {
                log::warn!("failed to get available parallelism: {err}, defaulting to 32 shards");
                32
            }
        };

        let shards = (0..shard_count)
            .map(|_| Shard {
                records: RwLock::new(HashMap::default()),
            })
            .collect();

        DomainMap {
            name: name.into(),
            hasher: RandomState::default(),
            shards,
            dirty_source: RwLock::new(HashSet::default()),
            dirty_cache: RwLock::new(HashSet::default()),
            len: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn shard_for(&self, key: &str) -> &Shard {
        let lower: String = key.to_ascii_lowercase();
        let hash = hash_one(&self.hasher, &lower);
        let idx = (hash as usize) & (self.shards.len() - 1);
        &self.shards[idx]
    }

    pub fn get(&self, path: &AssetPath) -> Option<Arc<TypeRecord>> {
        let shard = self.shard_for(path.as_str());
        shard.records.read().get(&path.as_str().to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, path: &AssetPath) -> bool {
        self.get(path).is_some()
    }

    /// Inserts a freshly-reserved record, failing if the path already
    /// resolves (Create's `AlreadyExists`).
    pub fn insert_new(&self, record: Arc<TypeRecord>) -> Result<(), Arc<TypeRecord>> {
        let key = record.path().as_str().to_ascii_lowercase();
        let shard = self.shard_for(record.path().as_str());
        let mut guard = shard.records.write();
        if let Some(existing) = guard.get(&key) {
            return Err(existing.clone());
        }
        guard.insert(key, record);
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Removes a record entirely (only valid once its refcounts are zero
    /// and its Delete has been committed).
    pub fn remove(&self, path: &AssetPath) -> Option<Arc<TypeRecord>> {
        let shard = self.shard_for(path.as_str());
        let removed = shard
            .records
            .write()
            .remove(&path.as_str().to_ascii_lowercase());
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots every live record. Used by enumeration/reconciliation
    /// passes; callers must not assume this stays in sync with concurrent
    /// mutation.
    pub fn snapshot(&self) -> Vec<Arc<TypeRecord>> {
        let mut out = Vec::with_capacity(self.len());
        for shard in &*self.shards {
            out.extend(shard.records.read().values().cloned());
        }
        out
    }

    pub fn mark_source_dirty(&self, path: &AssetPath) {
        self.dirty_source
            .write()
            .insert(path.as_str().to_ascii_lowercase());
    }

    pub fn mark_cache_dirty(&self, path: &AssetPath) {
        self.dirty_cache
            .write()
            .insert(path.as_str().to_ascii_lowercase());
    }

    /// Drains the source dirty-set under the registry write lock, per the
    /// SaveDomain op sketch.
    pub fn take_dirty_source(&self) -> Vec<String> {
        std::mem::take(&mut *self.dirty_source.write())
            .into_iter()
            .collect()
    }

    pub fn take_dirty_cache(&self) -> Vec<String> {
        std::mem::take(&mut *self.dirty_cache.write())
            .into_iter()
            .collect()
    }
}

impl fmt::Debug for DomainMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainMap")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
