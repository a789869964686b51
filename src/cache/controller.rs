//! Cache Controller: owns one [`CacheBlock`] per domain under
//! `<cache_root>/<domain>/`, grounded in the teacher's `cache.rs` (a
//! controller fronting per-domain storage, looked up and lazily opened on
//! first use).

use std::path::PathBuf;

use parking_lot::RwLock;

use super::block::{CacheBlock, DEFAULT_SUB_BLOB_SIZE};
use crate::error::CacheError;
use crate::record::CacheIndex;
use crate::util::HashMap;

/// Opens and multiplexes [`CacheBlock`]s across domains, one block per
/// domain at a fixed `block_index` of 0 — multi-block-per-domain rollover
/// (for blocks that outgrow a single index file) is left for a future
/// extension, same scoping as the teacher's single-file-per-asset cache.
pub struct CacheController {
    root: PathBuf,
    sub_blob_size_ceiling: u64,
    blocks: RwLock<HashMap<String, std::sync::Arc<CacheBlock>>>,
}

impl CacheController {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheController {
            root: root.into(),
            sub_blob_size_ceiling: DEFAULT_SUB_BLOB_SIZE,
            blocks: RwLock::new(HashMap::default()),
        }
    }

    pub fn with_sub_blob_size_ceiling(mut self, ceiling: u64) -> Self {
        self.sub_blob_size_ceiling = ceiling;
        self
    }

    fn block_for(&self, domain: &str) -> Result<std::sync::Arc<CacheBlock>, CacheError> {
        if let Some(block) = self.blocks.read().get(domain) {
            return Ok(block.clone());
        }
        let mut guard = self.blocks.write();
        if let Some(block) = guard.get(domain) {
            return Ok(block.clone());
        }
        let dir = self.root.join(domain);
        let block = std::sync::Arc::new(CacheBlock::open(
            dir,
            domain,
            0,
            self.sub_blob_size_ceiling,
        )?);
        guard.insert(domain.to_owned(), block.clone());
        Ok(block)
    }

    /// Allocates space and writes `bytes` for a newly-cached object,
    /// returning the `CacheIndex` the calling `TypeRecord` should store.
    /// `path` is recorded in the block's blob directory purely so a human
    /// can later correlate the stored `uid` back to the asset that
    /// produced it; it plays no role in the read/write path.
    pub fn store(&self, domain: &str, path: &str, bytes: &[u8]) -> Result<CacheIndex, CacheError> {
        let block = self.block_for(domain)?;
        let index = block.allocate(bytes.len() as u32)?;
        block.write(index, bytes)?;
        block.record_path(index.uid, path);
        log::trace!(
            "stored {} bytes in domain {domain} at object {} for {path}",
            bytes.len(),
            index.object_id
        );
        Ok(index)
    }

    pub fn read(&self, domain: &str, index: CacheIndex) -> Result<Vec<u8>, CacheError> {
        self.block_for(domain)?.read(index)
    }

    pub fn remove(&self, domain: &str, index: CacheIndex) -> Result<(), CacheError> {
        self.block_for(domain)?.delete(index.object_id)
    }

    /// Looks up the asset path recorded for a cached object's `uid`, for
    /// diagnostics. `None` if nothing was ever recorded for it (index 0,
    /// a block opened from files written before this sidecar existed, or
    /// an already-removed object).
    pub fn path_for(&self, domain: &str, index: CacheIndex) -> Result<Option<String>, CacheError> {
        Ok(self.block_for(domain)?.path_for(index.uid))
    }

    /// Commits every open domain's object table to disk. Called from
    /// `SaveDomainCache` and on manager shutdown.
    pub fn flush_all(&self) -> Result<(), CacheError> {
        for block in self.blocks.read().values() {
            block.flush()?;
        }
        Ok(())
    }

    pub fn flush_domain(&self, domain: &str) -> Result<(), CacheError> {
        self.block_for(domain)?.flush()
    }

    /// Runs the object-table integrity check for a domain's block,
    /// surfaced by `UpdateCacheData` / domain-open reconciliation.
    pub fn validate_domain(&self, domain: &str) -> Result<(), CacheError> {
        self.block_for(domain)?.validate()
    }
}
