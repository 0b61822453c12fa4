//! Alphabet-driven tokenization.
//!
//! A word is a maximal run of alphabet characters; everything else
//! separates words. Sentence punctuation additionally closes the
//! current sentence. Input is expected to be lowercased by the caller;
//! tokens are views into the host string, so no case folding happens
//! here.

use hashbrown::HashSet;

use crate::model::Word;

const SENTENCE_BREAKS: &[char] = &['.', '!', '?', '\n'];

/// Tokenization over string slices.
pub trait Tokenize {
    /// Splits into sentences of word tokens over the given alphabet.
    fn sentences_with_alphabet(&self, alphabet: &HashSet<char>) -> Vec<Vec<Word<'_>>>;
}

impl Tokenize for str {
    fn sentences_with_alphabet(&self, alphabet: &HashSet<char>) -> Vec<Vec<Word<'_>>> {
        let mut sentences = Vec::new();
        let mut current: Vec<Word<'_>> = Vec::new();
        let mut word_start: Option<usize> = None;

        for (idx, ch) in self.char_indices() {
            if alphabet.contains(&ch) {
                if word_start.is_none() {
                    word_start = Some(idx);
                }
                continue;
            }

            if let Some(start) = word_start.take() {
                current.push(Word::new(&self[start..idx]));
            }

            if SENTENCE_BREAKS.contains(&ch) && !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        }

        if let Some(start) = word_start {
            current.push(Word::new(&self[start..]));
        }
        if !current.is_empty() {
            sentences.push(current);
        }

        sentences
    }
}
