//! Blob directory: a `uid -> asset path` sidecar kept next to a cache
//! block's index/sub-blob files purely as a debugging aid, named in
//! SPEC_FULL.md §4.2 so a human correlating a cache uid (surfaced in a
//! `StaleUid`/`DataCorruption` error, say) back to the asset that produced
//! it doesn't have to grep the source tree for it.
//!
//! Plain `uid\tpath\n` lines rather than the index file's binary layout —
//! this file is read by people, not by the hot path.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use crate::error::CacheError;

#[derive(Debug, Clone, Default)]
pub struct BlobDirectory {
    by_uid: HashMap<u32, String>,
}

impl BlobDirectory {
    pub fn new() -> Self {
        BlobDirectory::default()
    }

    pub fn record(&mut self, uid: u32, path: &str) {
        self.by_uid.insert(uid, path.to_owned());
    }

    pub fn forget(&mut self, uid: u32) {
        self.by_uid.remove(&uid);
    }

    pub fn path_for(&self, uid: u32) -> Option<&str> {
        self.by_uid.get(&uid).map(String::as_str)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        let mut rows: Vec<_> = self.by_uid.iter().collect();
        rows.sort_unstable_by_key(|(uid, _)| **uid);
        for (uid, path) in rows {
            out.push_str(&uid.to_string());
            out.push('\t');
            out.push_str(path);
            out.push('\n');
        }
        out.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CacheError::Corrupt("blob directory is not valid utf8".into()))?;
        let mut by_uid = HashMap::new();
        for line in text.lines() {
            let (uid, path) = line
                .split_once('\t')
                .ok_or_else(|| CacheError::Corrupt("malformed blob directory line".into()))?;
            let uid: u32 = uid
                .parse()
                .map_err(|_| CacheError::Corrupt("malformed blob directory uid".into()))?;
            by_uid.insert(uid, path.to_owned());
        }
        Ok(BlobDirectory { by_uid })
    }

    pub fn read_from(mut r: impl Read) -> Result<Self, CacheError> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes).map_err(CacheError::from)?;
        if bytes.is_empty() {
            return Ok(BlobDirectory::new());
        }
        Self::decode(&bytes)
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(&self.encode())
    }
}

pub fn directory_file_name(block_index: u32) -> String {
    format!("block_{block_index:04}.dir")
}
