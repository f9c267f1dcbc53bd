//! Multi-pack index (MIDX) support.
//!
//! Layout: `"MIDX"` magic, u32 version, u32 pack count, u32 entry count,
//! length-prefixed pack id strings, a sorted array of
//! `{ id: [u8; 40] (hex), pack_index: u32, offset: u64 }` entries, and a
//! trailing 20-byte checksum over everything before it. Lookup is a binary
//! search over the sorted entry array, keyed on the hex id bytes (hex
//! encoding preserves byte-order, so comparing the ASCII form is equivalent
//! to comparing the raw id).

use std::path::{Path, PathBuf};

use git_hash::{HashAlgorithm, ObjectId};
use memmap2::Mmap;

use crate::PackError;

/// MIDX signature bytes.
const MIDX_SIGNATURE: &[u8; 4] = b"MIDX";
/// Current MIDX format version.
pub const MIDX_VERSION: u32 = 1;
/// Width of the hex-encoded id field in each entry.
const ENTRY_ID_LEN: usize = 40;
/// Entry size: id (40 hex bytes) + pack_index (u32) + offset (u64).
const ENTRY_SIZE: usize = ENTRY_ID_LEN + 4 + 8;
/// Trailing checksum width, fixed at 20 bytes regardless of hash algorithm.
const CHECKSUM_LEN: usize = 20;
const HEADER_LEN: usize = 16;

/// Multi-pack index spanning multiple packfiles.
pub struct MultiPackIndex {
    data: Mmap,
    version: u32,
    num_packs: u32,
    num_objects: u32,
    pack_names: Vec<String>,
    entries_offset: usize,
    midx_path: PathBuf,
}

impl MultiPackIndex {
    /// Open a multi-pack index file.
    pub fn open(midx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let midx_path = midx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&midx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(PackError::InvalidIndex("MIDX file too small".into()));
        }
        if &data[0..4] != MIDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad MIDX signature".into()));
        }

        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != MIDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported MIDX version {version}"
            )));
        }

        let num_packs = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let num_objects = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);

        let mut pos = HEADER_LEN;
        let mut pack_names = Vec::with_capacity(num_packs as usize);
        for _ in 0..num_packs {
            if pos + 4 > data.len() {
                return Err(PackError::InvalidIndex("truncated pack id table".into()));
            }
            let len =
                u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                    as usize;
            pos += 4;
            if pos + len > data.len() {
                return Err(PackError::InvalidIndex("truncated pack id string".into()));
            }
            let name = std::str::from_utf8(&data[pos..pos + len])
                .map_err(|_| PackError::InvalidIndex("pack id is not valid UTF-8".into()))?
                .to_string();
            pack_names.push(name);
            pos += len;
        }

        let entries_offset = pos;
        let entries_len = num_objects as usize * ENTRY_SIZE;
        if entries_offset + entries_len + CHECKSUM_LEN > data.len() {
            return Err(PackError::InvalidIndex("truncated entry table".into()));
        }

        Ok(Self {
            data,
            version,
            num_packs,
            num_objects,
            pack_names,
            entries_offset,
            midx_path,
        })
    }

    /// Look up an OID, returning `(pack_index, offset)` if found.
    pub fn lookup(&self, oid: &ObjectId) -> Option<(u32, u64)> {
        let target = oid.to_hex();
        let target = target.as_bytes();

        let mut low = 0usize;
        let mut high = self.num_objects as usize;
        while low < high {
            let mid = low + (high - low) / 2;
            let mid_id = self.entry_id_bytes(mid);
            match mid_id.cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Some(self.entry_pack_offset(mid)),
            }
        }
        None
    }

    /// MIDX format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of objects in the MIDX.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Number of packs referenced by this MIDX.
    pub fn num_packs(&self) -> u32 {
        self.num_packs
    }

    /// Pack names referenced by this MIDX, in pack-index order.
    pub fn pack_names(&self) -> &[String] {
        &self.pack_names
    }

    /// Path to the MIDX file this was opened from.
    pub fn path(&self) -> &Path {
        &self.midx_path
    }

    /// Iterate over all (OID, pack_index, offset) triples, in sorted order.
    pub fn iter(&self) -> MultiPackIndexIter<'_> {
        MultiPackIndexIter { midx: self, pos: 0 }
    }

    fn entry_offset(&self, index: usize) -> usize {
        self.entries_offset + index * ENTRY_SIZE
    }

    fn entry_id_bytes(&self, index: usize) -> &[u8] {
        let start = self.entry_offset(index);
        &self.data[start..start + ENTRY_ID_LEN]
    }

    fn entry_pack_offset(&self, index: usize) -> (u32, u64) {
        let start = self.entry_offset(index) + ENTRY_ID_LEN;
        let pack_index = u32::from_be_bytes([
            self.data[start],
            self.data[start + 1],
            self.data[start + 2],
            self.data[start + 3],
        ]);
        let offset = u64::from_be_bytes([
            self.data[start + 4],
            self.data[start + 5],
            self.data[start + 6],
            self.data[start + 7],
            self.data[start + 8],
            self.data[start + 9],
            self.data[start + 10],
            self.data[start + 11],
        ]);
        (pack_index, offset)
    }

    fn entry_oid(&self, index: usize) -> Result<ObjectId, PackError> {
        let hex = std::str::from_utf8(self.entry_id_bytes(index))
            .map_err(|_| PackError::InvalidIndex("entry id is not valid hex".into()))?;
        ObjectId::from_hex(hex).map_err(|e| PackError::InvalidIndex(format!("entry id: {e}")))
    }
}

/// Iterator over MIDX entries in sorted order.
pub struct MultiPackIndexIter<'a> {
    midx: &'a MultiPackIndex,
    pos: u32,
}

impl<'a> Iterator for MultiPackIndexIter<'a> {
    type Item = (ObjectId, u32, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.midx.num_objects {
            return None;
        }
        let oid = self.midx.entry_oid(self.pos as usize).ok()?;
        let (pack_idx, offset) = self.midx.entry_pack_offset(self.pos as usize);
        self.pos += 1;
        Some((oid, pack_idx, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.midx.num_objects - self.pos) as usize;
        (remaining, Some(remaining))
    }
}

/// Serialize a MIDX file from pack names and a sorted `(oid, pack_index,
/// offset)` entry list. The caller must pass entries already sorted by
/// `oid`; this is the MIDX rebuild path used by the atomic packfile store.
pub fn write_midx(
    pack_names: &[String],
    entries: &[(ObjectId, u32, u64)],
) -> Result<Vec<u8>, PackError> {
    debug_assert!(
        entries.windows(2).all(|w| w[0].0 <= w[1].0),
        "write_midx requires entries sorted by oid"
    );

    let mut buf = Vec::new();
    buf.extend_from_slice(MIDX_SIGNATURE);
    buf.extend_from_slice(&MIDX_VERSION.to_be_bytes());
    buf.extend_from_slice(&(pack_names.len() as u32).to_be_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for name in pack_names {
        buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
    }

    for (oid, pack_index, offset) in entries {
        let hex = oid.to_hex();
        if hex.len() != ENTRY_ID_LEN {
            return Err(PackError::InvalidIndex(format!(
                "MIDX entries require a {ENTRY_ID_LEN}-hex-byte id, got {}",
                hex.len()
            )));
        }
        buf.extend_from_slice(hex.as_bytes());
        buf.extend_from_slice(&pack_index.to_be_bytes());
        buf.extend_from_slice(&offset.to_be_bytes());
    }

    let mut hasher = git_hash::hasher::Hasher::new(HashAlgorithm::Sha1);
    hasher.update(&buf);
    let checksum = hasher.finalize()?;
    buf.extend_from_slice(checksum.as_bytes());

    Ok(buf)
}
