//! Per-query candidate generation, pruning and scoring.

use std::cmp::Ordering;

use hashbrown::HashSet;

use super::candidate::ScoredWord;
use super::CorrectorConfig;
use crate::cache::DeleteCache;
use crate::model::{LanguageModel, Word};
use crate::types::Count;

/// One correction query over immutable engine state.
///
/// The worker borrows the model, the delete cache and the
/// configuration; everything it allocates is transient and dropped
/// when the query returns.
pub(crate) struct CandidateWorker<'a, M: LanguageModel> {
    model: &'a M,
    cache: &'a DeleteCache,
    config: &'a CorrectorConfig,
}

impl<'a, M: LanguageModel> CandidateWorker<'a, M> {
    pub(crate) fn new(
        model: &'a M,
        cache: &'a DeleteCache,
        config: &'a CorrectorConfig,
    ) -> CandidateWorker<'a, M> {
        CandidateWorker {
            model,
            cache,
            config,
        }
    }

    pub(crate) fn candidates_scored(
        &self,
        sentence: &[Word<'a>],
        position: usize,
    ) -> Vec<ScoredWord<'a>> {
        if position >= sentence.len() {
            return Vec::new();
        }

        let query = sentence[position];

        let mut candidates = self.edits2(query.as_str());
        let mut first_level = true;
        if candidates.is_empty() {
            log::trace!("no symmetric-delete candidates for {}, falling back", query);
            candidates = self.edits1(query.as_str());
            first_level = false;
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        let (query, known_word) = match self.model.word(query.as_str()) {
            Some(hit) => (hit, true),
            None => (query, false),
        };
        candidates.push(query);

        // The generators may emit the same word many times.
        let mut seen: HashSet<&'a str> = HashSet::with_capacity(candidates.len());
        let mut unique: Vec<Word<'a>> = Vec::with_capacity(candidates.len());
        for cand in candidates {
            if seen.insert(cand.as_str()) {
                unique.push(cand);
            }
        }

        self.filter_by_frequency(&mut unique, query);

        let mut scored: Vec<ScoredWord<'a>> = Vec::with_capacity(unique.len());
        for cand in unique {
            let window = window_sentence(sentence, position, cand);
            let raw = self.model.score(&window);
            let score = apply_penalty(self.config, raw, cand == query, known_word, first_level);
            scored.push(ScoredWord::new(cand, score));
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored
    }

    /// Symmetric-delete candidate generation: every vocabulary hit
    /// reachable within edit distance 2, found by pairing the query's
    /// deletion neighborhood with the precomputed delete filters.
    fn edits2(&self, word: &str) -> Vec<Word<'a>> {
        let chars: Vec<char> = word.chars().collect();

        let mut stage: Vec<String> = Vec::with_capacity(chars.len() * chars.len() + 1);
        stage.push(word.to_string());
        for i in 0..chars.len() {
            let d1 = delete_at(&chars, i);
            if d1.is_empty() {
                continue;
            }
            let d1_chars: Vec<char> = d1.chars().collect();
            for j in 0..d1_chars.len() {
                let d2 = delete_at(&d1_chars, j);
                if !d2.is_empty() {
                    stage.push(d2);
                }
            }
            stage.push(d1);
        }

        let mut result = Vec::new();
        for s in &stage {
            if let Some(hit) = self.model.word(s) {
                result.push(hit);
            }
            if self.cache.contains_delete1(s) {
                self.inserts(s, &mut result);
            }
            if self.cache.contains_delete2(s) {
                self.inserts2(s, &mut result);
            }
        }
        result
    }

    /// Brute-force candidates at edit distance exactly 1: delete,
    /// transpose, replace and insert over the model alphabet, filtered
    /// against the vocabulary. Fallback when [`Self::edits2`] comes up
    /// empty.
    fn edits1(&self, word: &str) -> Vec<Word<'a>> {
        let chars: Vec<char> = word.chars().collect();
        let mut result = Vec::new();

        for i in 0..=chars.len() {
            if i < chars.len() {
                if let Some(hit) = self.model.word(&delete_at(&chars, i)) {
                    result.push(hit);
                }
            }

            if i + 1 < chars.len() {
                if let Some(hit) = self.model.word(&transpose_at(&chars, i)) {
                    result.push(hit);
                }
            }

            if i < chars.len() {
                for &ch in self.model.alphabet() {
                    if let Some(hit) = self.model.word(&replace_at(&chars, i, ch)) {
                        result.push(hit);
                    }
                }
            }

            for &ch in self.model.alphabet() {
                if let Some(hit) = self.model.word(&insert_at(&chars, i, ch)) {
                    result.push(hit);
                }
            }
        }

        result
    }

    /// Emits every vocabulary word reachable by inserting one alphabet
    /// character into `word`.
    fn inserts(&self, word: &str, result: &mut Vec<Word<'a>>) {
        let chars: Vec<char> = word.chars().collect();
        for i in 0..=chars.len() {
            for &ch in self.model.alphabet() {
                if let Some(hit) = self.model.word(&insert_at(&chars, i, ch)) {
                    result.push(hit);
                }
            }
        }
    }

    /// Two-character insertions: only enumerated where the single
    /// insertion already lands in the one-delete filter.
    fn inserts2(&self, word: &str, result: &mut Vec<Word<'a>>) {
        let chars: Vec<char> = word.chars().collect();
        for i in 0..=chars.len() {
            for &ch in self.model.alphabet() {
                let s = insert_at(&chars, i, ch);
                if self.cache.contains_delete1(&s) {
                    self.inserts(&s, result);
                }
            }
        }
    }

    /// Caps the candidate set at `max_candidates_to_check` by corpus
    /// frequency before the expensive contextual scoring, always
    /// keeping the original query token.
    fn filter_by_frequency(&self, candidates: &mut Vec<Word<'a>>, query: Word<'a>) {
        let cap = self.config.max_candidates_to_check;
        if candidates.len() <= cap {
            return;
        }

        let mut by_count: Vec<(Count, Word<'a>)> = candidates
            .iter()
            .map(|&cand| {
                let count = self
                    .model
                    .word_id(cand)
                    .map(|id| self.model.word_count(id))
                    .unwrap_or(0);
                (count, cand)
            })
            .collect();
        by_count.sort_by(|a, b| b.0.cmp(&a.0));

        candidates.clear();
        candidates.extend(by_count.into_iter().take(cap).map(|(_, cand)| cand));
        if !candidates.contains(&query) {
            candidates.push(query);
        }
    }
}

/// Copies positions within distance 2 of `position`, substituting the
/// candidate, so the model only ever scores a 5-gram neighborhood.
fn window_sentence<'a>(
    sentence: &[Word<'a>],
    position: usize,
    candidate: Word<'a>,
) -> Vec<Word<'a>> {
    let lo = position.saturating_sub(2);
    let hi = (position + 2).min(sentence.len() - 1);
    (lo..=hi)
        .map(|i| if i == position { candidate } else { sentence[i] })
        .collect()
}

/// The identity candidate is never penalized; corrections of a known
/// word pay the known-word penalty (or the fallback multiplier when the
/// symmetric-delete path found nothing); corrections of an unknown word
/// pay the unknown-word penalty.
fn apply_penalty(
    config: &CorrectorConfig,
    raw: crate::types::Score,
    is_identity: bool,
    known_word: bool,
    first_level: bool,
) -> crate::types::Score {
    if is_identity {
        return raw;
    }
    if known_word {
        if first_level {
            raw - config.known_words_penalty
        } else {
            raw * config.fallback_multiplier
        }
    } else {
        raw - config.unknown_words_penalty
    }
}

fn delete_at(chars: &[char], i: usize) -> String {
    chars
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &c)| c)
        .collect()
}

fn transpose_at(chars: &[char], i: usize) -> String {
    let mut out: Vec<char> = chars.to_vec();
    out.swap(i, i + 1);
    out.into_iter().collect()
}

fn replace_at(chars: &[char], i: usize, ch: char) -> String {
    chars
        .iter()
        .enumerate()
        .map(|(j, &c)| if j == i { ch } else { c })
        .collect()
}

fn insert_at(chars: &[char], i: usize, ch: char) -> String {
    let mut out = String::with_capacity(chars.len() * 4 + 4);
    for &c in &chars[..i] {
        out.push(c);
    }
    out.push(ch);
    for &c in &chars[i..] {
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_helpers_operate_on_code_points() {
        let chars: Vec<char> = "naïve".chars().collect();
        assert_eq!(delete_at(&chars, 2), "nave");
        assert_eq!(transpose_at(&chars, 1), "nïave");
        assert_eq!(replace_at(&chars, 2, 'i'), "naive");
        assert_eq!(insert_at(&chars, 5, 's'), "naïves");
        assert_eq!(insert_at(&chars, 0, 's'), "snaïve");
    }

    #[test]
    fn window_is_clamped_to_the_sentence() {
        let words: Vec<Word<'_>> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|s| Word::new(s))
            .collect();
        let cand = Word::new("x");

        let mid = window_sentence(&words, 3, cand);
        let mid: Vec<&str> = mid.iter().map(|w| w.as_str()).collect();
        assert_eq!(mid, vec!["b", "c", "x", "e", "f"]);

        let start = window_sentence(&words, 0, cand);
        let start: Vec<&str> = start.iter().map(|w| w.as_str()).collect();
        assert_eq!(start, vec!["x", "b", "c"]);

        let end = window_sentence(&words, 5, cand);
        let end: Vec<&str> = end.iter().map(|w| w.as_str()).collect();
        assert_eq!(end, vec!["d", "e", "x"]);
    }

    #[test]
    fn penalties_follow_the_scoring_rule() {
        let config = CorrectorConfig::default();

        // Identity is never penalized.
        assert_eq!(apply_penalty(&config, -3.0, true, true, true), -3.0);
        assert_eq!(apply_penalty(&config, -3.0, true, false, false), -3.0);

        // Corrections of a known word: additive on the primary path,
        // multiplicative on the fallback path.
        assert_eq!(
            apply_penalty(&config, -3.0, false, true, true),
            -3.0 - config.known_words_penalty
        );
        assert_eq!(
            apply_penalty(&config, -3.0, false, true, false),
            -3.0 * config.fallback_multiplier
        );

        // Corrections of an unknown word.
        assert_eq!(
            apply_penalty(&config, -3.0, false, false, true),
            -3.0 - config.unknown_words_penalty
        );
    }
}
