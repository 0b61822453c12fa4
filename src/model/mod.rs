//! The language-model seam consumed by the correction engine.
//!
//! The engine is deliberately narrow about what it needs from a
//! language model: vocabulary lookup, frequency counts, an alphabet,
//! and a contextual score. Everything behind those operations, from
//! n-gram storage to smoothing to tokenization rules, is the model's
//! business.
//! [`ngram::NgramModel`] is the implementation shipped with this crate;
//! tests use small in-memory models through the same trait.

pub mod ngram;

use std::fmt;
use std::path::Path;

use crate::types::{Count, Score, WordId};

/// A non-owning view of a lowercase word inside a host string.
///
/// Tokens borrow either from caller-provided text (query sentences) or
/// from language-model storage (vocabulary hits); they are never
/// mutated and live no longer than the string that produced them. Two
/// tokens compare equal iff their code-point sequences match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Word<'a>(&'a str);

impl<'a> Word<'a> {
    /// Wraps a string slice as a word token.
    #[inline(always)]
    pub fn new(s: &'a str) -> Word<'a> {
        Word(s)
    }

    /// The underlying code-point string.
    #[inline(always)]
    pub fn as_str(self) -> &'a str {
        self.0
    }

    /// True for the empty token.
    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Word<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The capability set the correction engine requires from a language
/// model.
///
/// All methods are pure reads; a model shared behind `&` may serve any
/// number of concurrent queries.
pub trait LanguageModel {
    /// Vocabulary lookup. Returns a token borrowing model storage, or
    /// `None` if the word is unknown.
    fn word(&self, s: &str) -> Option<Word<'_>>;

    /// Maps a token to its internal id without side effects.
    fn word_id(&self, word: Word<'_>) -> Option<WordId>;

    /// Training-corpus frequency of a word.
    fn word_count(&self, id: WordId) -> Count;

    /// Full vocabulary enumeration, used during delete-cache
    /// construction.
    fn words<'m>(&'m self) -> Box<dyn Iterator<Item = (&'m str, WordId)> + 'm>;

    /// Number of vocabulary entries.
    fn vocab_len(&self) -> usize;

    /// The ordered alphabet edits are enumerated over.
    fn alphabet(&self) -> &[char];

    /// Scores a sentence; higher is better.
    fn score(&self, sentence: &[Word<'_>]) -> Score;

    /// Stable digest of model contents, used to bind the on-disk
    /// delete cache to one model snapshot.
    fn checksum(&self) -> u64;

    /// Splits text into sentences of word tokens borrowing from `text`.
    /// Used by training and by surrounding layers, not by the candidate
    /// engine itself.
    fn tokenize<'t>(&self, text: &'t str) -> Vec<Vec<Word<'t>>>;
}

/// A language model with a file lifecycle.
///
/// Kept separate from [`LanguageModel`] so the query engine also works
/// with purely in-memory models.
pub trait StoredModel: LanguageModel + Sized {
    /// Loads a previously dumped model.
    fn load(path: &Path) -> Result<Self, ModelError>;

    /// Trains a model from a corpus file and an alphabet file.
    fn train(corpus_path: &Path, alphabet_path: &Path) -> Result<Self, ModelError>;

    /// Writes the model to disk.
    fn dump(&self, path: &Path) -> Result<(), ModelError>;
}

/// Errors from loading, training or dumping a language model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Underlying file I/O failed.
    #[error("model io error")]
    Io(#[from] std::io::Error),

    /// The file does not start with the model magic number.
    #[error("bad model magic")]
    BadMagic,

    /// The file was written by an incompatible version of this crate.
    #[error("unsupported model version {0}")]
    UnsupportedVersion(u16),

    /// The file is structurally invalid or fails its checksum.
    #[error("model file is truncated or corrupt")]
    Corrupt,

    /// The alphabet file contained no usable characters.
    #[error("alphabet is empty")]
    EmptyAlphabet,
}
