//! Asset Manager façade (C7): owns the four controllers, exposes the
//! public operation surface, and runs the periodic `update()` pass.
//!
//! Grounded in `AssetMgr.h`'s full public API
//! (Initialize/Update/Load/Create/Import/Delete/CreateDomain/Wait/
//! Acquire*/Release*/SaveDomain/UpdateCacheData/FindType/GetTypes/
//! QuerySourceInfo/UpdateType/UpdateInstances/AddDependency/
//! RemoveDependency) and in the teacher's `AssetCache`-as-façade shape
//! (one top-level type owning the source/cache/registry plumbing that
//! application code talks to).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use crate::asset::{AssetObject, DependencyRef, DependencyStrength};
use crate::cache::CacheController;
use crate::dependency;
use crate::domain::DomainMap;
use crate::error::OpError;
use crate::handle::StrongHandle;
use crate::handle::WeakHandle;
use crate::op::{self, OpKind, Operation, OperationController, Promise, TargetKey};
use crate::path::AssetPath;
use crate::record::{LoadState, TypeRecord};
use crate::registry::TypeDescriptor;
use crate::source::SourceController;
use crate::util::HashMap;

/// Load flags, an explicit bit set per §6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadFlags {
    /// Just bump the refcount; do not enqueue a Load if currently UNLOADED.
    pub acquire_only: bool,
    /// Synchronously materialise immediate referenced assets before
    /// publishing.
    pub immediate_properties: bool,
    /// Extend immediate-properties to the whole transitive closure.
    pub recursive_properties: bool,
    /// Return the promise immediately; default is synchronous-wait on this
    /// thread (the caller decides by choosing whether to `.wait()` it).
    pub async_: bool,
    /// Load from source, bypassing cache (used when cache is known stale).
    pub source_only: bool,
}

/// Configuration accepted by [`AssetManager::new`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub source_root: std::path::PathBuf,
    pub cache_root: std::path::PathBuf,
    pub dispatch_capacity: usize,
    pub op_timeout: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            source_root: std::path::PathBuf::from("assets/source"),
            cache_root: std::path::PathBuf::from("assets/cache"),
            dispatch_capacity: 256,
            op_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("asset manager global already set")]
pub struct AlreadyGlobal;

static GLOBAL: OnceLock<AssetManager> = OnceLock::new();

/// Owns the Source/Cache/Data/Op controllers for one asset universe.
pub struct AssetManager {
    config: ManagerConfig,
    source: Arc<SourceController>,
    cache: Arc<CacheController>,
    domains: RwLock<HashMap<String, Arc<DomainMap>>>,
    ops: Arc<OperationController>,
    null_record: Arc<TypeRecord>,
    reconcile_cursor: AtomicU64,
}

static NULL_TYPE: TypeDescriptor = TypeDescriptor {
    id: crate::registry::TypeId32::from_name("manager::NullAsset"),
    name: "manager::NullAsset",
    construct_empty: || Box::new(NullAsset),
    decode: |_| Ok(Box::new(NullAsset)),
    overlay: crate::registry::overlay_by_round_trip::<NullAsset>,
};

#[derive(Clone, Debug)]
struct NullAsset;
impl AssetObject for NullAsset {
    fn encode(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Vec::new())
    }
    fn decode(_bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(NullAsset)
    }
}

impl AssetManager {
    pub fn new(config: ManagerConfig) -> Self {
        let source = Arc::new(SourceController::new(&config.source_root));
        let cache = Arc::new(CacheController::new(&config.cache_root));
        let ops = Arc::new(OperationController::new(config.dispatch_capacity));
        let null_record = TypeRecord::new(AssetPath::new("__null__//__null__"), &NULL_TYPE);

        AssetManager {
            config,
            source,
            cache,
            domains: RwLock::new(HashMap::default()),
            ops,
            null_record,
            reconcile_cursor: AtomicU64::new(0),
        }
    }

    /// Installs `self` as the process-wide singleton. Fails rather than
    /// silently overwriting, unlike the original's bare-`bool`
    /// `AssetMgr::SetGlobal`.
    pub fn set_global(self) -> Result<(), AlreadyGlobal> {
        GLOBAL.set(self).map_err(|_| {
            log::warn!("set_global: asset manager global was already installed");
            AlreadyGlobal
        })
    }

    pub fn global() -> Option<&'static AssetManager> {
        GLOBAL.get()
    }

    // --- domains ---

    pub fn create_domain(&self, name: &str) -> Arc<DomainMap> {
        let mut guard = self.domains.write();
        guard
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(DomainMap::new(name)))
            .clone()
    }

    fn domain(&self, name: &str) -> Option<Arc<DomainMap>> {
        self.domains.read().get(name).cloned()
    }

    fn domain_or_create(&self, name: &str) -> Arc<DomainMap> {
        if let Some(dm) = self.domain(name) {
            return dm;
        }
        self.create_domain(name)
    }

    fn resolve(&self, path: &AssetPath) -> Option<Arc<TypeRecord>> {
        self.domain(path.domain())?.get(path)
    }

    fn reject_now(err: OpError) -> Promise<()> {
        let (promise, settler) = op::promise::pair();
        settler.reject(err);
        promise
    }

    fn op_timeout_for(&self, kind: OpKind) -> Option<Duration> {
        match kind {
            OpKind::SaveDomain | OpKind::SaveDomainCache => {
                self.config.op_timeout.map(|d| d * 4)
            }
            _ => self.config.op_timeout,
        }
    }

    // --- Create / Import / Delete / Load (C5 op sketches, §4.5) ---

    /// Reserves a record at `path`, writes its source bytes, and publishes
    /// `prototype` as its initial state.
    pub fn create(
        &self,
        path: &AssetPath,
        concrete_type: &'static TypeDescriptor,
        prototype: Box<dyn AssetObject>,
        parent: Option<Arc<TypeRecord>>,
    ) -> Promise<()> {
        let dm = self.domain_or_create(path.domain());

        if let Some(parent) = &parent {
            if parent.is_deleted() {
                return Self::reject_now(OpError::InvalidParent(path.clone()));
            }
        }

        let record = match &parent {
            Some(p) => TypeRecord::with_parent(path.clone(), concrete_type, p),
            None => TypeRecord::new(path.clone(), concrete_type),
        };

        if dm.insert_new(record.clone()).is_err() {
            log::warn!("create: {path} already exists");
            return Self::reject_now(OpError::AlreadyExists(path.clone()));
        }

        let bytes = match prototype.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                dm.remove(path);
                log::warn!("create: {path} failed to encode initial prototype: {err}");
                return Self::reject_now(OpError::Deserialisation(err.to_string()));
            }
        };

        let edges = prototype.walk_dependencies();
        record.handle().publish(Arc::from(prototype));
        record.set_load_state(LoadState::Loaded);
        let resolver = {
            let manager_domain = dm.clone();
            move |p: &AssetPath| manager_domain.get(p)
        };
        dependency::update_dependencies(&record, edges, resolver);

        let source = self.source.clone();
        let target_path = path.clone();
        let dm_for_op = dm.clone();

        let op = Operation::new(
            OpKind::Create,
            TargetKey::for_path(path),
            Box::new(move || {
                source.write_source(&target_path, &bytes)?;
                dm_for_op.mark_source_dirty(&target_path);
                dm_for_op.mark_cache_dirty(&target_path);
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::Create) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    /// Probes `path`'s source bytes; if present, reserves a record and
    /// decodes them into its initial prototype.
    pub fn import(&self, path: &AssetPath, concrete_type: &'static TypeDescriptor) -> Promise<()> {
        let dm = self.domain_or_create(path.domain());
        let probe = self.source.probe_import(path);
        if !probe.exists {
            return Self::reject_now(OpError::NotFound(path.clone()));
        }

        let record = TypeRecord::new(path.clone(), concrete_type);
        if dm.insert_new(record.clone()).is_err() {
            return Self::reject_now(OpError::AlreadyExists(path.clone()));
        }

        let source = self.source.clone();
        let target_path = path.clone();
        let record_for_op = record.clone();
        let decode = concrete_type.decode;
        let dm_for_op = dm.clone();

        let op = Operation::new(
            OpKind::Import,
            TargetKey::for_path(path),
            Box::new(move || {
                let bytes = source.get_source_bytes(&target_path)?;
                let prototype = decode(&bytes).map_err(|e| OpError::Deserialisation(e.to_string()))?;
                let edges = prototype.walk_dependencies();
                record_for_op.handle().publish(Arc::from(prototype));
                record_for_op.set_load_state(LoadState::Loaded);
                let resolver = {
                    let dm = dm_for_op.clone();
                    move |p: &AssetPath| dm.get(p)
                };
                dependency::update_dependencies(&record_for_op, edges, resolver);
                dm_for_op.mark_cache_dirty(&target_path);
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::Import) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    /// Refuses while strong in-edges exist; otherwise marks `path`
    /// deleted, removes its cache object, and removes its source file.
    pub fn delete(&self, path: &AssetPath) -> Promise<()> {
        let dm = match self.domain(path.domain()) {
            Some(dm) => dm,
            None => return Self::reject_now(OpError::NotFound(path.clone())),
        };
        let record = match dm.get(path) {
            Some(record) => record,
            None => return Self::reject_now(OpError::NotFound(path.clone())),
        };
        if !record.can_delete() {
            log::warn!(
                "delete: {path} refused, {} strong client ref(s) / {} strong dependant(s) outstanding",
                record.client_strong_count(),
                record.dep_strong_in()
            );
            return Self::reject_now(OpError::InvalidParent(path.clone()));
        }

        log::trace!("delete: {path} marked deleted, queuing teardown");
        record.mark_deleted();
        let source = self.source.clone();
        let cache = self.cache.clone();
        let domain_name = path.domain().to_owned();
        let target_path = path.clone();
        let dm_for_op = dm.clone();
        let record_for_op = record.clone();

        let op = Operation::new(
            OpKind::Delete,
            TargetKey::for_path(path),
            Box::new(move || {
                if let Some(index) = record_for_op.cache_index() {
                    cache.remove(&domain_name, index)?;
                }
                source.remove_source(&target_path)?;
                dm_for_op.remove(&target_path);
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::Delete) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    /// Runs the Load publication protocol (§4.4): read bytes (cache
    /// preferred unless `flags.source_only`), decode, publish, transition
    /// `load_state`.
    pub fn load(&self, path: &AssetPath, flags: LoadFlags) -> Promise<()> {
        let record = match self.resolve(path) {
            Some(record) => record,
            None => return Self::reject_now(OpError::NotFound(path.clone())),
        };

        if flags.acquire_only && record.load_state() != LoadState::Unloaded {
            let (promise, settler) = op::promise::pair();
            settler.resolve(());
            return promise;
        }

        record.set_load_state(LoadState::Loading);

        let source = self.source.clone();
        let cache = self.cache.clone();
        let decode = record.concrete_type().decode;
        let domain_name = path.domain().to_owned();
        let target_path = path.clone();
        let record_for_op = record.clone();
        let source_only = flags.source_only;
        let dm_for_op = self.domain_or_create(path.domain());

        let op = Operation::new(
            OpKind::Load,
            TargetKey::for_path(path),
            Box::new(move || {
                let read_from_cache = !source_only && record_for_op.cache_index().is_some();
                let bytes = if !source_only {
                    match record_for_op.cache_index() {
                        Some(index) => cache.read(&domain_name, index).map_err(OpError::from),
                        None => source.get_source_bytes(&target_path).map_err(OpError::from),
                    }
                } else {
                    source.get_source_bytes(&target_path).map_err(OpError::from)
                }?;

                let prototype = match decode(&bytes) {
                    Ok(prototype) => prototype,
                    Err(e) => {
                        record_for_op.set_load_state(LoadState::Failed);
                        return Err(OpError::Deserialisation(e.to_string()));
                    }
                };
                let edges = prototype.walk_dependencies();
                record_for_op.handle().publish(Arc::from(prototype));
                record_for_op.set_load_state(LoadState::Loaded);
                let resolver = {
                    let dm = dm_for_op.clone();
                    move |p: &AssetPath| dm.get(p)
                };
                dependency::update_dependencies(&record_for_op, edges, resolver);
                if !read_from_cache {
                    dm_for_op.mark_cache_dirty(&target_path);
                }
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::Load) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    // --- SaveDomain / SaveDomainCache / UpdateCache ---

    pub fn save_domain(&self, domain: &str) -> Promise<()> {
        let dm = match self.domain(domain) {
            Some(dm) => dm,
            None => return Self::reject_now(OpError::NotFound(AssetPath::new(domain))),
        };
        let source = self.source.clone();
        let dm_for_op = dm.clone();

        let op = Operation::new(
            OpKind::SaveDomain,
            TargetKey::for_domain(domain),
            Box::new(move || {
                for path_lower in dm_for_op.take_dirty_source() {
                    if let Some(record) = dm_for_op.get(&AssetPath::new(&path_lower)) {
                        if let Some(prototype) = record.handle().prototype() {
                            let bytes = prototype
                                .encode()
                                .map_err(|e| OpError::Deserialisation(e.to_string()))?;
                            source.write_source(record.path(), &bytes)?;
                        }
                    }
                }
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::SaveDomain) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    pub fn save_domain_cache(&self, domain: &str) -> Promise<()> {
        let dm = match self.domain(domain) {
            Some(dm) => dm,
            None => return Self::reject_now(OpError::NotFound(AssetPath::new(domain))),
        };
        let cache = self.cache.clone();
        let dm_for_op = dm.clone();
        let domain_name = domain.to_owned();

        let op = Operation::new(
            OpKind::SaveDomainCache,
            TargetKey::for_domain(domain),
            Box::new(move || {
                for path_lower in dm_for_op.take_dirty_cache() {
                    if let Some(record) = dm_for_op.get(&AssetPath::new(&path_lower)) {
                        if let Some(prototype) = record.handle().prototype() {
                            let bytes = prototype
                                .encode()
                                .map_err(|e| OpError::Deserialisation(e.to_string()))?;
                            let index = cache.store(&domain_name, &path_lower, &bytes)?;
                            record.set_cache_index(Some(index));
                        }
                    }
                }
                cache.flush_domain(&domain_name)?;
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::SaveDomainCache) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    /// Rewrites cache bytes from an already-loaded prototype (used when
    /// source is modified by an editor outside the process).
    pub fn update_cache(&self, path: &AssetPath) -> Promise<()> {
        let record = match self.resolve(path) {
            Some(record) => record,
            None => return Self::reject_now(OpError::NotFound(path.clone())),
        };
        let prototype = match record.handle().prototype() {
            Some(p) => p,
            None => return Self::reject_now(OpError::NotFound(path.clone())),
        };

        let cache = self.cache.clone();
        let domain_name = path.domain().to_owned();
        let target_path = path.clone();
        let record_for_op = record.clone();

        let op = Operation::new(
            OpKind::UpdateCache,
            TargetKey::for_path(path),
            Box::new(move || {
                let bytes = prototype
                    .encode()
                    .map_err(|e| OpError::Deserialisation(e.to_string()))?;
                if let Some(old) = record_for_op.cache_index() {
                    let _ = cache.remove(&domain_name, old);
                }
                let index = cache.store(&domain_name, target_path.as_str(), &bytes)?;
                record_for_op.set_cache_index(Some(index));
                record_for_op.set_modify_info(0, SystemTime::now());
                Ok(())
            }),
        );
        let op = match self.op_timeout_for(OpKind::UpdateCache) {
            Some(t) => op.with_timeout(t),
            None => op,
        };
        self.ops.submit(op)
    }

    // --- Handle Protocol (C6) ---

    pub fn acquire_strong(
        &self,
        path: &AssetPath,
        required_concrete_type: Option<&'static TypeDescriptor>,
        flags: LoadFlags,
    ) -> StrongHandle {
        let matches_type = |record: &Arc<TypeRecord>| {
            required_concrete_type.map_or(true, |t| record.is_a(t))
        };
        let record = match self.resolve(path) {
            Some(record) if matches_type(&record) => record,
            _ => return StrongHandle::null(self.null_record.clone()),
        };
        let handle = StrongHandle::new(record.clone());
        if !flags.acquire_only && record.load_state() == LoadState::Unloaded {
            let _ = self.load(path, flags);
        }
        handle
    }

    pub fn acquire_weak(
        &self,
        path: &AssetPath,
        required_concrete_type: Option<&'static TypeDescriptor>,
    ) -> WeakHandle {
        match self.resolve(path) {
            Some(record) if required_concrete_type.map_or(true, |t| record.is_a(t)) => {
                WeakHandle::new(record)
            }
            _ => WeakHandle::null(self.null_record.clone()),
        }
    }

    // --- Wait ---

    pub fn wait(&self, promise: &Promise<()>) -> Result<(), OpError> {
        promise.wait()
    }

    // --- enumeration / query (AssetMgr.h's FindType/GetTypes/QuerySourceInfo) ---

    pub fn find_type(&self, path: &AssetPath) -> Option<Arc<TypeRecord>> {
        self.resolve(path)
    }

    pub fn types_in_domain(&self, domain: &str) -> Vec<Arc<TypeRecord>> {
        self.domain(domain).map(|dm| dm.snapshot()).unwrap_or_default()
    }

    pub fn types_of(&self, concrete_type: &'static TypeDescriptor) -> Vec<Arc<TypeRecord>> {
        self.domains
            .read()
            .values()
            .flat_map(|dm| dm.snapshot())
            .filter(|record| record.is_a(concrete_type))
            .collect()
    }

    pub fn query_source_info(&self, path: &AssetPath) -> crate::source::ImportProbe {
        self.source.probe_import(path)
    }

    // --- UpdateType / UpdateInstances (AssetMgr.h) ---

    /// Directly stamps a record's modify metadata, bypassing the op queue
    /// (used by editor tooling after an out-of-band source edit).
    pub fn update_type(&self, record: &Arc<TypeRecord>, hash: u64, modify_date: SystemTime) {
        record.set_modify_info(hash, modify_date);
    }

    /// Publishes `source` as `record`'s new prototype.
    ///
    /// `AssetObject` exposes no in-place mutation, so previously-acquired
    /// live instances are not retroactively patched — only the handle's
    /// published pointer moves. Callers that need every outstanding
    /// instance to see the update should prefer `immediate_properties`
    /// loading, which never lets a stale instance escape in the first
    /// place.
    pub fn update_instances(&self, record: &Arc<TypeRecord>, source: Arc<dyn AssetObject>) {
        record.handle().publish(source);
    }

    // --- Instantiate (AssetMgr.h's prototype-inheritance path, §4.4) ---

    /// Produces a new, independently-owned instance of `path`: walks its
    /// parent chain root-first, cloning and overlaying each ancestor's
    /// published prototype in turn, so the result reflects every field the
    /// chain contributes with the leaf's own fields taking precedence.
    ///
    /// Unlike the shared prototype a `Handle` resolves to, the returned
    /// object is owned by the caller; the record only keeps a weak
    /// reference to it (`TypeRecord::live_instances`) so a future
    /// `update_instances` can tell how many outstanding instances a
    /// hot-reload left stale.
    pub fn instantiate(&self, path: &AssetPath) -> Result<Arc<dyn AssetObject>, OpError> {
        let leaf = self.resolve(path).ok_or_else(|| OpError::NotFound(path.clone()))?;

        let mut chain = Vec::new();
        let mut cursor = Some(leaf.clone());
        while let Some(record) = cursor {
            if record.is_deleted() {
                return Err(OpError::InvalidParent(record.path().clone()));
            }
            cursor = record.parent();
            chain.push(record);
        }
        chain.reverse(); // root first, leaf last

        let mut current = leaf.concrete_type().construct_empty();
        for ancestor in &chain {
            let prototype = ancestor
                .handle()
                .prototype()
                .ok_or_else(|| OpError::NotFound(ancestor.path().clone()))?;
            current = (ancestor.concrete_type().overlay)(prototype.as_ref(), current.as_ref());
        }

        let instance: Arc<dyn AssetObject> = Arc::from(current);
        leaf.register_instance(&instance);
        Ok(instance)
    }

    // --- AddDependency / RemoveDependency (AssetMgr.h) ---

    pub fn add_dependency(
        &self,
        record: &Arc<TypeRecord>,
        dependant: &Arc<TypeRecord>,
        weak: bool,
    ) -> bool {
        let strength = if weak {
            DependencyStrength::Weak
        } else {
            DependencyStrength::Strong
        };
        let mut edges = record.out_edges();
        if edges
            .iter()
            .any(|e| e.target == *dependant.path() && e.strength == strength)
        {
            return false;
        }
        edges.push(DependencyRef {
            target: dependant.path().clone(),
            strength,
        });
        record.set_out_edges(edges);
        dependant.inc_dep_in(strength);
        true
    }

    pub fn remove_dependency(
        &self,
        record: &Arc<TypeRecord>,
        dependant: &Arc<TypeRecord>,
        weak: bool,
    ) -> bool {
        let strength = if weak {
            DependencyStrength::Weak
        } else {
            DependencyStrength::Strong
        };
        let mut edges = record.out_edges();
        let before = edges.len();
        edges.retain(|e| !(e.target == *dependant.path() && e.strength == strength));
        if edges.len() == before {
            return false;
        }
        record.set_out_edges(edges);
        dependant.dec_dep_in(strength);
        true
    }

    // --- update() (§4.7) ---

    /// Drives the op controller until its dispatch ring and overflow
    /// queue are both empty, finishes tearing down deleted zero-refcount
    /// records, and reconciles a small sample of stale records per
    /// domain. Does not evict unreferenced-but-not-deleted records —
    /// that opportunistic unload is [`Self::reclaim_unreferenced`], a
    /// separate call so a plain `update()` never unloads something an
    /// embedding app just created and has not yet gotten around to
    /// acquiring a handle for.
    pub fn update(&self) {
        while self.ops.run_one() {}
        self.reap_deleted();
        self.reconcile_sample(8);
    }

    fn reap_deleted(&self) {
        for dm in self.domains.read().values() {
            for record in dm.snapshot() {
                if record.is_deleted() && record.is_reapable() && record.dep_strong_in() == 0 {
                    record.set_load_state(LoadState::Unloaded);
                }
            }
        }
    }

    /// Unloads every record across every domain whose client and
    /// dependency refcounts have both dropped to zero. Callers invoke
    /// this explicitly (e.g. on a level transition or low-memory signal)
    /// rather than it running implicitly on every `update()` tick.
    pub fn reclaim_unreferenced(&self) {
        let mut reclaimed = 0u32;
        for dm in self.domains.read().values() {
            for record in dm.snapshot() {
                if !record.is_deleted()
                    && record.is_reapable()
                    && record.dep_strong_in() == 0
                    && record.load_state() == LoadState::Loaded
                {
                    record.handle().clear();
                    record.set_load_state(LoadState::Unloaded);
                    reclaimed += 1;
                }
            }
        }
        if reclaimed > 0 {
            log::trace!("reclaim_unreferenced: unloaded {reclaimed} record(s)");
        }
    }

    /// Checks a time-budgeted sample of records whose `modify_date` is
    /// older than their source file's mtime, enqueueing `UpdateCache` for
    /// each (the `mSourceToCacheUpdateTimer` reconciliation named in the
    /// original).
    fn reconcile_sample(&self, sample_size: usize) {
        let domains: Vec<Arc<DomainMap>> = self.domains.read().values().cloned().collect();
        if domains.is_empty() {
            return;
        }
        let cursor = self.reconcile_cursor.fetch_add(1, Ordering::Relaxed) as usize;
        let dm = &domains[cursor % domains.len()];
        let snapshot = dm.snapshot();

        for record in snapshot.iter().take(sample_size) {
            if record.load_state() != LoadState::Loaded {
                continue;
            }
            if let Some(source_mtime) = self.source.modified(record.path()) {
                if source_mtime > record.modify_date() {
                    let _ = self.update_cache(record.path());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
