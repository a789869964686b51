//! CacheBlock (C1): packed binary store of object bytes, split across
//! bounded-size sub-blob files.
//!
//! Bounds-checking on read is grounded exactly in `CacheReader.cpp`:
//! `read_pos > len` and overflow-checked `read_end` are both rejected
//! before any I/O is attempted.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::directory::{self, BlobDirectory};
use super::format::{self, BlockHeader, ObjectEntry};
use crate::error::CacheError;
use crate::record::CacheIndex;

/// Default ceiling on one sub-blob file's size before a new sub-blob is
/// allocated.
pub const DEFAULT_SUB_BLOB_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
struct FreeRegion {
    sub_blob: u16,
    offset: u64,
    size: u32,
}

struct Inner {
    header: BlockHeader,
    free_list: Vec<FreeRegion>,
    sub_blob_cursors: HashMap<u16, u64>,
    next_object_id: u32,
    next_uid: u32,
    dirty: bool,
    blob_directory: BlobDirectory,
    directory_dirty: bool,
}

/// A packed binary container for one domain's runtime objects, identified
/// by `(domain, generation)` — `generation` is encoded in the directory the
/// block lives under, chosen by the cache controller.
pub struct CacheBlock {
    dir: PathBuf,
    block_index: u32,
    sub_blob_size_ceiling: u64,
    inner: RwLock<Inner>,
}

impl CacheBlock {
    /// Opens an existing block, or creates an empty one if its index file
    /// doesn't exist yet.
    pub fn open(
        dir: impl Into<PathBuf>,
        domain: &str,
        block_index: u32,
        sub_blob_size_ceiling: u64,
    ) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let index_path = dir.join(format::index_file_name(block_index));
        let directory_path = dir.join(directory::directory_file_name(block_index));

        let header = if index_path.is_file() {
            let file = File::open(&index_path)?;
            BlockHeader::read_from(file)?
        } else {
            BlockHeader::new(domain)
        };

        let blob_directory = if directory_path.is_file() {
            let file = File::open(&directory_path)?;
            BlobDirectory::read_from(file)?
        } else {
            BlobDirectory::new()
        };

        let next_object_id = header.objects.iter().map(|o| o.object_id + 1).max().unwrap_or(0);
        let next_uid = header.objects.iter().map(|o| o.uid + 1).max().unwrap_or(1);

        let mut sub_blob_cursors = HashMap::new();
        for entry in &header.objects {
            let end = entry.offset + entry.size as u64;
            let cursor = sub_blob_cursors.entry(entry.sub_blob).or_insert(0u64);
            if end > *cursor {
                *cursor = end;
            }
        }

        Ok(CacheBlock {
            dir,
            block_index,
            sub_blob_size_ceiling,
            inner: RwLock::new(Inner {
                header,
                free_list: Vec::new(),
                sub_blob_cursors,
                blob_directory,
                directory_dirty: false,
                next_object_id,
                next_uid,
                dirty: false,
            }),
        })
    }

    fn sub_blob_path(&self, sub_blob: u16) -> PathBuf {
        self.dir
            .join(format::sub_blob_file_name(self.block_index, sub_blob))
    }

    /// Reserves space for `size` bytes, preferring a free-list region that
    /// fits, then appending to the current sub-blob, then rolling a new
    /// one if the ceiling would be exceeded.
    pub fn allocate(&self, size: u32) -> Result<CacheIndex, CacheError> {
        let mut inner = self.inner.write();

        if let Some(pos) = inner
            .free_list
            .iter()
            .position(|r| r.size as u64 >= size as u64)
        {
            let region = inner.free_list.remove(pos);
            let object_id = inner.next_object_id;
            inner.next_object_id += 1;
            let uid = inner.next_uid;
            inner.next_uid += 1;
            inner.header.objects.push(ObjectEntry {
                object_id,
                uid,
                sub_blob: region.sub_blob,
                offset: region.offset,
                size,
            });
            inner.dirty = true;
            return Ok(CacheIndex {
                blob_id: self.block_index,
                object_id,
                uid,
            });
        }

        let sub_blob_count = inner.sub_blob_cursors.len().max(1) as u16 - 1;
        let mut sub_blob = if inner.sub_blob_cursors.is_empty() {
            0
        } else {
            sub_blob_count
        };
        let cursor = *inner.sub_blob_cursors.get(&sub_blob).unwrap_or(&0);

        if cursor + size as u64 > self.sub_blob_size_ceiling {
            sub_blob += 1;
            if sub_blob == u16::MAX {
                return Err(CacheError::OutOfSpace);
            }
        }
        let offset = *inner.sub_blob_cursors.get(&sub_blob).unwrap_or(&0);

        let object_id = inner.next_object_id;
        inner.next_object_id += 1;
        let uid = inner.next_uid;
        inner.next_uid += 1;

        inner.header.objects.push(ObjectEntry {
            object_id,
            uid,
            sub_blob,
            offset,
            size,
        });
        inner.sub_blob_cursors.insert(sub_blob, offset + size as u64);
        inner.dirty = true;

        Ok(CacheIndex {
            blob_id: self.block_index,
            object_id,
            uid,
        })
    }

    fn find_entry(inner: &Inner, index: CacheIndex) -> Result<ObjectEntry, CacheError> {
        let entry = inner
            .header
            .objects
            .iter()
            .find(|o| o.object_id == index.object_id)
            .ok_or(CacheError::OutOfRange)?;
        if entry.uid != index.uid {
            return Err(CacheError::StaleUid);
        }
        Ok(*entry)
    }

    /// Reads exactly `entry.size` bytes after bounds-checking, matching
    /// `CacheReader`'s overflow-safe range check.
    pub fn read(&self, index: CacheIndex) -> Result<Vec<u8>, CacheError> {
        let entry = {
            let inner = self.inner.read();
            Self::find_entry(&inner, index)?
        };

        let path = self.sub_blob_path(entry.sub_blob);
        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();

        let read_pos = entry.offset;
        if read_pos > len {
            return Err(CacheError::OutOfRange);
        }
        let read_end = match read_pos.checked_add(entry.size as u64) {
            Some(end) if end <= len => end,
            _ => return Err(CacheError::OutOfRange),
        };
        let read_size = (read_end - read_pos) as usize;

        file.seek(SeekFrom::Start(read_pos))?;
        let mut buf = vec![0u8; read_size];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes exactly `bytes.len()` bytes at the reserved offset. Never
    /// resizes an entry in place: callers that need a different size must
    /// `delete` and `allocate` again.
    pub fn write(&self, index: CacheIndex, bytes: &[u8]) -> Result<(), CacheError> {
        let entry = {
            let inner = self.inner.read();
            Self::find_entry(&inner, index)?
        };

        if bytes.len() as u32 != entry.size {
            return Err(CacheError::Corrupt(
                "write size does not match reserved entry size".into(),
            ));
        }

        let path = self.sub_blob_path(entry.sub_blob);
        let mut file = OpenOptions::new().write(true).create(true).open(&path)?;
        file.seek(SeekFrom::Start(entry.offset))?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Returns an object's region to the free-list and invalidates its
    /// uid so stale `CacheIndex`es surface `StaleUid` rather than reading
    /// someone else's bytes.
    pub fn delete(&self, object_id: u32) -> Result<(), CacheError> {
        let mut inner = self.inner.write();
        let pos = inner
            .header
            .objects
            .iter()
            .position(|o| o.object_id == object_id)
            .ok_or(CacheError::OutOfRange)?;
        let entry = inner.header.objects.remove(pos);
        inner.free_list.push(FreeRegion {
            sub_blob: entry.sub_blob,
            offset: entry.offset,
            size: entry.size,
        });
        inner.dirty = true;
        inner.blob_directory.forget(entry.uid);
        inner.directory_dirty = true;
        Ok(())
    }

    /// Records which asset path produced `uid`, for the sidecar directory.
    /// Purely informational: never consulted by `read`/`write`/`allocate`.
    pub fn record_path(&self, uid: u32, path: &str) {
        let mut inner = self.inner.write();
        inner.blob_directory.record(uid, path);
        inner.directory_dirty = true;
    }

    /// Looks up the asset path recorded against `uid`, if any.
    pub fn path_for(&self, uid: u32) -> Option<String> {
        self.inner
            .read()
            .blob_directory
            .path_for(uid)
            .map(str::to_owned)
    }

    /// Commits the object table to the index file, and the blob directory
    /// to its sidecar, each independently only if dirty. Idempotent given
    /// the same table/directory contents.
    pub fn flush(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.write();
        if inner.dirty {
            let index_path = self.dir.join(format::index_file_name(self.block_index));
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&index_path)?;
            inner.header.write_to(file)?;
            inner.dirty = false;
        }
        if inner.directory_dirty {
            let directory_path = self
                .dir
                .join(directory::directory_file_name(self.block_index));
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&directory_path)?;
            inner.blob_directory.write_to(file).map_err(CacheError::from)?;
            inner.directory_dirty = false;
        }
        Ok(())
    }

    /// Validates that every entry's region lies within its sub-blob file
    /// and that no two live entries overlap.
    pub fn validate(&self) -> Result<(), CacheError> {
        let inner = self.inner.read();
        let mut by_sub_blob: HashMap<u16, Vec<(u64, u64)>> = HashMap::new();
        for entry in &inner.header.objects {
            by_sub_blob
                .entry(entry.sub_blob)
                .or_default()
                .push((entry.offset, entry.offset + entry.size as u64));
        }
        for ranges in by_sub_blob.values_mut() {
            ranges.sort_unstable();
            for pair in ranges.windows(2) {
                if pair[1].0 < pair[0].1 {
                    return Err(CacheError::Corrupt("overlapping object regions".into()));
                }
            }
        }
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.inner.read().header.objects.len()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
