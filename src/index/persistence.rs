//! On-disk format of a built index.
//!
//! ```text
//! magic "NAPPIDX\0" (8) | version u32 LE | xxh3-64 of payload u64 LE | payload
//! ```
//!
//! The payload is the bincode encoding of [`IndexFile`]: metadata, pivot
//! objects, pivot positions and posting lists. Files are written under a
//! temporary name and renamed into place, so a failed save never leaves a
//! truncated file under the target path.

use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::IndexParams;
use crate::error::{NappError, Result};
use crate::types::IdType;

use super::combination::CombinationSpace;
use super::pivots::PivotSource;

pub const MAGIC: &[u8; 8] = b"NAPPIDX\0";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4 + 8;

/// Descriptive header of a saved index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub params: IndexParams,
    pub data_len: u64,
    pub num_posting_lists: u64,
    pub total_postings: u64,
    pub space: String,
    pub pivot_source: PivotSource,
    pub created_at: DateTime<Utc>,
}

/// Borrowed view of an index, serialized on save.
#[derive(Serialize)]
pub struct IndexFileRef<'b, O> {
    pub meta: &'b IndexMeta,
    pub pivots: &'b [O],
    pub pivot_pos: &'b [IdType],
    pub posting_lists: &'b [Vec<IdType>],
}

/// Owned index contents, produced on load.
#[derive(Deserialize)]
pub struct IndexFile<O> {
    pub meta: IndexMeta,
    pub pivots: Vec<O>,
    pub pivot_pos: Vec<IdType>,
    pub posting_lists: Vec<Vec<IdType>>,
}

impl<O> IndexFile<O> {
    /// Check the decoded contents against the dataset the index is loaded
    /// over. Returns the combination space described by the saved params.
    pub fn validate(&self, data_len: usize) -> Result<CombinationSpace> {
        let meta = &self.meta;
        if meta.data_len != data_len as u64 {
            return Err(NappError::Format(format!(
                "index was built over {} objects, dataset has {data_len}",
                meta.data_len
            )));
        }
        meta.params.validate()?;
        let comb = CombinationSpace::new(meta.params.num_pivot, meta.params.pivot_comb_qty)?;

        if self.pivots.len() != meta.params.num_pivot {
            return Err(NappError::Format(format!(
                "file holds {} pivots, params say {}",
                self.pivots.len(),
                meta.params.num_pivot
            )));
        }
        match meta.pivot_source {
            PivotSource::Sampled => {
                if self.pivot_pos.len() != self.pivots.len()
                    || self.pivot_pos.iter().any(|&p| p as usize >= data_len)
                {
                    return Err(NappError::Format("invalid pivot positions".to_string()));
                }
            }
            PivotSource::File | PivotSource::Generated => {
                if !self.pivot_pos.is_empty() {
                    return Err(NappError::Format(
                        "pivot positions recorded for non-sampled pivots".to_string(),
                    ));
                }
            }
        }

        if self.posting_lists.len() != comb.size() || meta.num_posting_lists != comb.size() as u64 {
            return Err(NappError::Format(format!(
                "file holds {} posting lists, expected {}",
                self.posting_lists.len(),
                comb.size()
            )));
        }

        let mut total = 0u64;
        for (comb_id, list) in self.posting_lists.iter().enumerate() {
            if list.iter().any(|&id| id as usize >= data_len) {
                return Err(NappError::Format(format!(
                    "posting list {comb_id} references an object beyond the dataset"
                )));
            }
            if !list.windows(2).all(|w| w[0] < w[1]) {
                return Err(NappError::Format(format!("posting list {comb_id} is not sorted")));
            }
            total += list.len() as u64;
        }
        let expected = data_len as u64 * comb.ids_per_prefix(meta.params.num_prefix) as u64;
        if total != meta.total_postings || total != expected {
            return Err(NappError::Format(format!(
                "file holds {total} postings, expected {expected}"
            )));
        }
        Ok(comb)
    }
}

/// Serialize an index into the framed on-disk representation.
pub fn encode<O: Serialize>(file: &IndexFileRef<'_, O>) -> Result<Bytes> {
    let payload = bincode::serialize(file)?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(MAGIC);
    buf.put_u32_le(FORMAT_VERSION);
    buf.put_u64_le(xxh3_64(&payload));
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Verify the frame and decode the payload.
pub fn decode<O: DeserializeOwned>(bytes: &[u8]) -> Result<IndexFile<O>> {
    if bytes.len() < HEADER_LEN {
        return Err(NappError::Format(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(NappError::Format("bad magic, not a napp index".to_string()));
    }

    let mut header = &bytes[MAGIC.len()..HEADER_LEN];
    let version = header.get_u32_le();
    if version != FORMAT_VERSION {
        return Err(NappError::Format(format!(
            "version {version}, this build reads version {FORMAT_VERSION}"
        )));
    }
    let expected = header.get_u64_le();
    let payload = &bytes[HEADER_LEN..];
    let actual = xxh3_64(payload);
    if expected != actual {
        return Err(NappError::ChecksumMismatch { expected, actual });
    }

    Ok(bincode::deserialize(payload)?)
}

/// Write `bytes` to `<path>.tmp-<ulid>` and rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| NappError::Config(format!("invalid index path {}", path.display())))?;
    let tmp = path.with_file_name(format!("{}.tmp-{}", file_name.to_string_lossy(), Ulid::new()));

    let res = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if let Err(e) = res {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> IndexMeta {
        IndexMeta {
            params: IndexParams {
                num_pivot: 3,
                num_prefix: 2,
                pivot_comb_qty: 2,
                index_thread_qty: 1,
                ..Default::default()
            },
            data_len: 2,
            num_posting_lists: 3,
            total_postings: 2,
            space: "test".to_string(),
            pivot_source: PivotSource::Sampled,
            created_at: Utc::now(),
        }
    }

    fn sample_bytes() -> Bytes {
        let meta = meta();
        let pivots = vec![vec![0.0f32], vec![1.0], vec![2.0]];
        let lists = vec![vec![0, 1], vec![], vec![]];
        encode(&IndexFileRef {
            meta: &meta,
            pivots: &pivots,
            pivot_pos: &[0, 1, 1],
            posting_lists: &lists,
        })
        .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_bytes();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), FORMAT_VERSION);

        let file: IndexFile<Vec<f32>> = decode(&bytes).unwrap();
        assert_eq!(file.meta.data_len, 2);
        assert_eq!(file.posting_lists[0], vec![0, 1]);
        file.validate(2).unwrap();
    }

    #[test]
    fn test_rejects_corruption() {
        let good = sample_bytes();

        let mut flipped = good.to_vec();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xff;
        assert!(matches!(
            decode::<Vec<f32>>(&flipped),
            Err(NappError::ChecksumMismatch { .. })
        ));

        let mut bad_magic = good.to_vec();
        bad_magic[0] = b'X';
        assert!(matches!(decode::<Vec<f32>>(&bad_magic), Err(NappError::Format(_))));

        let mut bad_version = good.to_vec();
        bad_version[8] = 99;
        assert!(matches!(decode::<Vec<f32>>(&bad_version), Err(NappError::Format(_))));

        assert!(matches!(decode::<Vec<f32>>(&good[..10]), Err(NappError::Format(_))));
    }

    #[test]
    fn test_validate_rejects_other_dataset() {
        let file: IndexFile<Vec<f32>> = decode(&sample_bytes()).unwrap();
        assert!(matches!(file.validate(5), Err(NappError::Format(_))));
    }

    #[test]
    fn test_write_atomic_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.napp");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
