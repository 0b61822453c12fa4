//! Classical bloom filter over byte strings.
//!
//! Sizing follows the standard formulas for a target false-positive
//! rate p and expected item count n: `m = ⌈-n·ln p / (ln 2)²⌉` bits and
//! `k = ⌈(m/n)·ln 2⌉` hash functions, with m clamped to a floor so tiny
//! vocabularies still get a usable filter.
//!
//! Membership bits are derived by double hashing: two independently
//! seeded 64-bit FNV-1a digests h1, h2 give `g_i = h1 + i·h2 (mod m)`
//! for i in 0..k. The seeds are fixed forever: a persisted filter must
//! report the same membership after reload on any platform (see
//! [`crate::hash`]).

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::constants::{MAX_BLOOM_BITS, MIN_BLOOM_BITS};
use crate::hash;

const SEED_LOW: u64 = 0;
const SEED_HIGH: u64 = 0x9e37_79b9_7f4a_7c15;

/// Approximate-membership set with a bounded false-positive rate and no
/// false negatives.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Creates an empty filter sized for `expected_items` keys at the
    /// given false-positive rate.
    pub fn new(expected_items: u64, false_positive_rate: f64) -> BloomFilter {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-12, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let wanted = (-(n * p.ln()) / (ln2 * ln2)).ceil() as u64;
        let num_bits = wanted.max(MIN_BLOOM_BITS);
        let num_hashes = (((num_bits as f64 / n) * ln2).ceil() as u32).clamp(1, 64);

        let words = ((num_bits + 63) / 64) as usize;
        BloomFilter {
            bits: vec![0; words],
            num_bits,
            num_hashes,
        }
    }

    /// Inserts a key.
    #[inline(always)]
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..u64::from(self.num_hashes) {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// Returns true if the key may have been inserted, false if it
    /// definitely was not.
    #[inline(always)]
    pub fn contains(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        for i in 0..u64::from(self.num_hashes) {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            if self.bits[(bit / 64) as usize] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of hash functions probed per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Serializes the filter as `m: u64, k: u32` followed by the bit
    /// array, all little-endian.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.num_bits)?;
        writer.write_u32::<LittleEndian>(self.num_hashes)?;
        for &word in &self.bits {
            writer.write_u64::<LittleEndian>(word)?;
        }
        Ok(())
    }

    /// Reads a filter previously written by [`BloomFilter::write_to`].
    pub fn read_from<R: Read>(mut reader: R) -> io::Result<BloomFilter> {
        let num_bits = reader.read_u64::<LittleEndian>()?;
        let num_hashes = reader.read_u32::<LittleEndian>()?;

        if num_bits == 0 || num_bits > MAX_BLOOM_BITS || num_hashes == 0 || num_hashes > 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "implausible bloom filter dimensions",
            ));
        }

        let words = ((num_bits + 63) / 64) as usize;
        let mut bits = vec![0u64; words];
        for word in &mut bits {
            *word = reader.read_u64::<LittleEndian>()?;
        }

        Ok(BloomFilter {
            bits,
            num_bits,
            num_hashes,
        })
    }
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .finish()
    }
}

#[inline(always)]
fn hash_pair(key: &[u8]) -> (u64, u64) {
    let h1 = hash::fnv1a(SEED_LOW, key);
    // An even stride could degenerate to a fraction of the bit space;
    // force it odd.
    let h2 = hash::fnv1a(SEED_HIGH, key) | 1;
    (h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &[&str] = &[
        "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog",
    ];

    #[test]
    fn no_false_negatives() {
        let mut filter = BloomFilter::new(WORDS.len() as u64, 0.001);
        for w in WORDS {
            filter.insert(w.as_bytes());
        }
        for w in WORDS {
            assert!(filter.contains(w.as_bytes()), "lost key {}", w);
        }
    }

    #[test]
    fn unseen_keys_are_mostly_absent() {
        let mut filter = BloomFilter::new(1000, 0.001);
        for w in WORDS {
            filter.insert(w.as_bytes());
        }
        let absent = (0..1000)
            .map(|i| format!("missing-{}", i))
            .filter(|k| !filter.contains(k.as_bytes()))
            .count();
        // 0.1% target rate; allow generous slack.
        assert!(absent > 950, "only {} of 1000 probes were absent", absent);
    }

    #[test]
    fn sizing_is_clamped() {
        let filter = BloomFilter::new(1, 0.001);
        assert_eq!(filter.num_bits(), 1000);
        assert!(filter.num_hashes() >= 1);
    }

    #[test]
    fn round_trip_preserves_membership() {
        let mut filter = BloomFilter::new(100, 0.001);
        for w in WORDS {
            filter.insert(w.as_bytes());
        }

        let mut buf = Vec::new();
        filter.write_to(&mut buf).unwrap();
        let reloaded = BloomFilter::read_from(buf.as_slice()).unwrap();

        assert_eq!(filter, reloaded);
        for w in WORDS {
            assert!(reloaded.contains(w.as_bytes()));
        }
    }

    #[test]
    fn rejects_corrupt_dimensions() {
        let mut buf = Vec::new();
        BloomFilter::new(10, 0.01).write_to(&mut buf).unwrap();
        // Implausible bit count in the header.
        buf[0..8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(BloomFilter::read_from(buf.as_slice()).is_err());
    }

    #[test]
    fn hashing_is_stable_across_instances() {
        let mut a = BloomFilter::new(50, 0.001);
        let mut b = BloomFilter::new(50, 0.001);
        for w in WORDS {
            a.insert(w.as_bytes());
            b.insert(w.as_bytes());
        }
        assert_eq!(a, b);
    }
}
