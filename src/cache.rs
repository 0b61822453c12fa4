//! Delete-set cache: the bloom filters that make two-edit candidate
//! generation tractable.
//!
//! `deletes1` holds every string reachable by deleting one character
//! from a vocabulary word, `deletes2` every string reachable by
//! deleting two. During a query the edit generator probes them before
//! enumerating insertions, pruning the vast majority of hopeless paths.
//!
//! The cache is persisted to a `.spell` sidecar next to the model file:
//!
//! ```text
//! u64  magic            0x34E4A5F0A8A2B636
//! u16  version          1
//! u64  model checksum
//! bloom deletes1        (m: u64, k: u32, bit array)
//! bloom deletes2
//! u64  magic            (sentinel)
//! ```
//!
//! All fields little-endian. A load validates the leading magic, the
//! version, the checksum of the currently loaded model, and the
//! trailing magic after both filters; any mismatch means the cache is
//! treated as absent and rebuilt. Loading never leaves partial state.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bloom::BloomFilter;
use crate::constants::{AVG_WORD_LEN_SAMPLE, CACHE_MAGIC, CACHE_VERSION, MAX_CACHED_WORD_LEN};
use crate::model::LanguageModel;

/// Errors from loading or saving the delete cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Underlying file I/O failed.
    #[error("cache io error")]
    Io(#[from] std::io::Error),

    /// A magic number was missing or damaged.
    #[error("bad cache magic")]
    BadMagic,

    /// The cache was written by an incompatible version of this crate.
    #[error("unsupported cache version {0}")]
    UnsupportedVersion(u16),

    /// The cache belongs to a different model snapshot.
    #[error("cache checksum does not match the loaded model")]
    ChecksumMismatch,
}

/// The two delete-set bloom filters, bound to one model snapshot.
#[derive(Debug)]
pub struct DeleteCache {
    deletes1: BloomFilter,
    deletes2: BloomFilter,
}

impl DeleteCache {
    /// Builds the filters by walking the model vocabulary.
    ///
    /// This is the most expensive part of engine startup; callers are
    /// expected to persist the result with [`DeleteCache::save`] and
    /// reload it on subsequent runs.
    pub fn build<M: LanguageModel>(model: &M, false_positive_rate: f64) -> DeleteCache {
        let mut sampled = 0u64;
        let mut char_sum = 0u64;
        for (word, _) in model.words().take(AVG_WORD_LEN_SAMPLE) {
            sampled += 1;
            char_sum += word.chars().count() as u64;
        }
        let avg_len = if sampled == 0 {
            1
        } else {
            ((char_sum as f64 / sampled as f64) as u64 + 1).max(1)
        };

        let vocab = model.vocab_len() as u64;
        let deletes1_items = vocab * avg_len;
        let deletes2_items = vocab * avg_len * avg_len.saturating_sub(1).max(1);
        log::debug!(
            "building delete cache: {} words, average length {}",
            vocab,
            avg_len
        );

        let mut deletes1 = BloomFilter::new(deletes1_items, false_positive_rate);
        let mut deletes2 = BloomFilter::new(deletes2_items, false_positive_rate);

        for (word, _) in model.words() {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() > MAX_CACHED_WORD_LEN {
                log::warn!(
                    "skipping {}-character vocabulary entry during cache build",
                    chars.len()
                );
                continue;
            }
            for i in 0..chars.len() {
                let d1: String = one_delete(&chars, i);
                if d1.is_empty() {
                    continue;
                }
                deletes1.insert(d1.as_bytes());

                let d1_chars: Vec<char> = d1.chars().collect();
                for j in 0..d1_chars.len() {
                    let d2: String = one_delete(&d1_chars, j);
                    if !d2.is_empty() {
                        deletes2.insert(d2.as_bytes());
                    }
                }
            }
        }

        DeleteCache { deletes1, deletes2 }
    }

    /// Is `key` possibly one deletion away from a vocabulary word?
    #[inline(always)]
    pub fn contains_delete1(&self, key: &str) -> bool {
        self.deletes1.contains(key.as_bytes())
    }

    /// Is `key` possibly two deletions away from a vocabulary word?
    #[inline(always)]
    pub fn contains_delete2(&self, key: &str) -> bool {
        self.deletes2.contains(key.as_bytes())
    }

    /// Writes the cache for the model identified by `model_checksum`.
    pub fn save(&self, path: &Path, model_checksum: u64) -> Result<(), CacheError> {
        log::debug!("saving delete cache to {}", path.display());
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_u64::<LittleEndian>(CACHE_MAGIC)?;
        writer.write_u16::<LittleEndian>(CACHE_VERSION)?;
        writer.write_u64::<LittleEndian>(model_checksum)?;
        self.deletes1.write_to(&mut writer)?;
        self.deletes2.write_to(&mut writer)?;
        writer.write_u64::<LittleEndian>(CACHE_MAGIC)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a cache previously written by [`DeleteCache::save`],
    /// validating it against the given model checksum.
    pub fn load(path: &Path, model_checksum: u64) -> Result<DeleteCache, CacheError> {
        log::debug!("loading delete cache from {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        if reader.read_u64::<LittleEndian>()? != CACHE_MAGIC {
            return Err(CacheError::BadMagic);
        }
        let version = reader.read_u16::<LittleEndian>()?;
        if version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion(version));
        }
        if reader.read_u64::<LittleEndian>()? != model_checksum {
            return Err(CacheError::ChecksumMismatch);
        }

        let deletes1 = BloomFilter::read_from(&mut reader)?;
        let deletes2 = BloomFilter::read_from(&mut reader)?;

        if reader.read_u64::<LittleEndian>()? != CACHE_MAGIC {
            return Err(CacheError::BadMagic);
        }

        Ok(DeleteCache { deletes1, deletes2 })
    }
}

fn one_delete(chars: &[char], i: usize) -> String {
    chars
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &c)| c)
        .collect()
}
