pub const CACHE_MAGIC: u64 = 0x34E4_A5F0_A8A2_B636;
pub const CACHE_VERSION: u16 = 1;

pub const MODEL_MAGIC: u64 = 0x6E67_7370_6C6C_6D31;
pub const MODEL_VERSION: u16 = 1;

/// Bloom filters never go below this many bits, whatever the sizing
/// formula says.
pub const MIN_BLOOM_BITS: u64 = 1000;

/// Upper bound accepted when reading a persisted filter. Anything
/// larger is a corrupt header, not a real filter.
pub const MAX_BLOOM_BITS: u64 = 1 << 40;

pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.001;

/// How many vocabulary words are sampled to estimate average word
/// length when sizing the delete-set filters.
pub const AVG_WORD_LEN_SAMPLE: usize = 3000;

/// Vocabulary entries longer than this are skipped during cache
/// construction; their delete neighborhood is quadratic in word length.
pub const MAX_CACHED_WORD_LEN: usize = 64;
