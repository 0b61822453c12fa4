//! Core types shared across the correction engine.

/// Identifier of a vocabulary word inside a language model.
pub type WordId = u32;

/// Training-corpus frequency of a vocabulary word.
pub type Count = u64;

/// Language-model score. Higher is better; n-gram models produce
/// log-probability sums, so scores are typically negative.
pub type Score = f64;
