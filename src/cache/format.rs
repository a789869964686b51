//! Cache index-file byte layout (little-endian).
//!
//! `magic "LFCB" | version:u32 | domain_len:u16 | domain:[u8] | count:u32 |
//! count * ObjectEntry | footer "BFCL"`. A versioned, deliberately new
//! layout (not byte-compatible with the original's `.lfcache` files — see
//! DESIGN.md's Open Question resolutions).

use std::io::{self, Read, Write};

use crate::error::CacheError;

pub const MAGIC: &[u8; 4] = b"LFCB";
pub const FOOTER: &[u8; 4] = b"BFCL";
pub const VERSION: u32 = 1;

/// One row of the object table: where an object lives and its freshness
/// tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEntry {
    pub object_id: u32,
    pub uid: u32,
    pub sub_blob: u16,
    pub offset: u64,
    pub size: u32,
}

impl ObjectEntry {
    const ENCODED_LEN: usize = 4 + 4 + 2 + 8 + 4;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.object_id.to_le_bytes());
        out.extend_from_slice(&self.uid.to_le_bytes());
        out.extend_from_slice(&self.sub_blob.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        ObjectEntry {
            object_id: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            uid: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            sub_blob: u16::from_le_bytes(bytes[8..10].try_into().unwrap()),
            offset: u64::from_le_bytes(bytes[10..18].try_into().unwrap()),
            size: u32::from_le_bytes(bytes[18..22].try_into().unwrap()),
        }
    }
}

/// In-memory representation of a cache block's index file.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub domain: String,
    pub objects: Vec<ObjectEntry>,
}

impl BlockHeader {
    pub fn new(domain: impl Into<String>) -> Self {
        BlockHeader {
            domain: domain.into(),
            objects: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let domain_bytes = self.domain.as_bytes();
        let mut out = Vec::with_capacity(
            4 + 4 + 2 + domain_bytes.len() + 4 + self.objects.len() * ObjectEntry::ENCODED_LEN + 4,
        );
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(domain_bytes.len() as u16).to_le_bytes());
        out.extend_from_slice(domain_bytes);
        out.extend_from_slice(&(self.objects.len() as u32).to_le_bytes());
        for entry in &self.objects {
            entry.write_to(&mut out);
        }
        out.extend_from_slice(FOOTER);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let mut cursor = 0usize;
        let take = |cursor: &mut usize, n: usize| -> Result<&[u8], CacheError> {
            if bytes.len() < *cursor + n {
                return Err(CacheError::Corrupt("truncated index file".into()));
            }
            let slice = &bytes[*cursor..*cursor + n];
            *cursor += n;
            Ok(slice)
        };

        let magic = take(&mut cursor, 4)?;
        if magic != MAGIC {
            return Err(CacheError::Corrupt("bad magic".into()));
        }
        let version = u32::from_le_bytes(take(&mut cursor, 4)?.try_into().unwrap());
        if version != VERSION {
            return Err(CacheError::Corrupt(format!(
                "unsupported version {version}"
            )));
        }
        let domain_len = u16::from_le_bytes(take(&mut cursor, 2)?.try_into().unwrap()) as usize;
        let domain = String::from_utf8(take(&mut cursor, domain_len)?.to_vec())
            .map_err(|_| CacheError::Corrupt("invalid domain name utf8".into()))?;
        let count = u32::from_le_bytes(take(&mut cursor, 4)?.try_into().unwrap()) as usize;

        let mut objects = Vec::with_capacity(count);
        for _ in 0..count {
            let entry_bytes = take(&mut cursor, ObjectEntry::ENCODED_LEN)?;
            objects.push(ObjectEntry::read_from(entry_bytes));
        }

        let footer = take(&mut cursor, 4)?;
        if footer != FOOTER {
            return Err(CacheError::Corrupt("bad footer".into()));
        }

        Ok(BlockHeader { domain, objects })
    }

    pub fn read_from(mut r: impl Read) -> Result<Self, CacheError> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes).map_err(CacheError::from)?;
        Self::decode(&bytes)
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(&self.encode())
    }
}

/// `block_<NNNN>_<HH>.cache` — sub-blob naming, adapted from the original's
/// hex-encoded blob-id suffix.
pub fn sub_blob_file_name(block_index: u32, sub_blob: u16) -> String {
    format!("block_{block_index:04}_{sub_blob:02X}.cache")
}

pub fn index_file_name(block_index: u32) -> String {
    format!("block_{block_index:04}.index")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_encode_decode() {
        let mut header = BlockHeader::new("engine");
        header.objects.push(ObjectEntry {
            object_id: 1,
            uid: 42,
            sub_blob: 0,
            offset: 0,
            size: 16,
        });
        let bytes = header.encode();
        let decoded = BlockHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.domain, "engine");
        assert_eq!(decoded.objects, header.objects);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let bytes = vec![0u8; 20];
        assert!(BlockHeader::decode(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let header = BlockHeader::new("engine");
        let mut bytes = header.encode();
        bytes.truncate(bytes.len() - 2);
        assert!(BlockHeader::decode(&bytes).is_err());
    }

    #[test]
    fn sub_blob_naming_uses_uppercase_hex() {
        assert_eq!(sub_blob_file_name(0, 0xAB), "block_0000_AB.cache");
        assert_eq!(index_file_name(7), "block_0007.index");
    }
}
