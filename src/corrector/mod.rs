//! The spelling-correction engine.
//!
//! [`SpellCorrector`] ties a language model to the delete-set cache and
//! answers ranked-candidate queries. Construction (building or loading
//! the cache) is serial and happens once per model; afterwards every
//! query is a pure read, so a corrector shared behind `&` may serve any
//! number of threads on disjoint inputs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use self::worker::CandidateWorker;
use crate::cache::{CacheError, DeleteCache};
use crate::model::{LanguageModel, ModelError, StoredModel, Word};
use crate::types::Score;

pub mod candidate;
mod worker;

pub use self::candidate::ScoredWord;

/// Extension of the sidecar cache file, appended to the model path.
const CACHE_EXT: &str = ".spell";

/// Tuning knobs for candidate generation and scoring.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CorrectorConfig {
    /// subtracted from corrections when the query itself is a known
    /// word (log-space)
    #[serde(default = "default_known_words_penalty")]
    pub known_words_penalty: Score,
    /// subtracted from corrections when the query is unknown
    #[serde(default = "default_unknown_words_penalty")]
    pub unknown_words_penalty: Score,
    /// applied instead of the known-word penalty to candidates from the
    /// brute-force fallback generator
    #[serde(default = "default_fallback_multiplier")]
    pub fallback_multiplier: Score,
    /// upper bound on candidates kept for contextual scoring
    #[serde(default = "default_max_candidates_to_check")]
    pub max_candidates_to_check: usize,
    /// false-positive rate of the delete-set bloom filters
    #[serde(default = "default_false_positive_rate")]
    pub false_positive_rate: f64,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self::default_const()
    }
}

impl CorrectorConfig {
    /// Create a default configuration with the following values:
    /// * known_words_penalty = 20
    /// * unknown_words_penalty = 5
    /// * fallback_multiplier = 50
    /// * max_candidates_to_check = 14
    /// * false_positive_rate = 0.001
    pub const fn default_const() -> CorrectorConfig {
        CorrectorConfig {
            known_words_penalty: default_known_words_penalty(),
            unknown_words_penalty: default_unknown_words_penalty(),
            fallback_multiplier: default_fallback_multiplier(),
            max_candidates_to_check: default_max_candidates_to_check(),
            false_positive_rate: default_false_positive_rate(),
        }
    }
}

const fn default_known_words_penalty() -> Score {
    20.0
}

const fn default_unknown_words_penalty() -> Score {
    5.0
}

const fn default_fallback_multiplier() -> Score {
    50.0
}

const fn default_max_candidates_to_check() -> usize {
    14
}

const fn default_false_positive_rate() -> f64 {
    crate::constants::DEFAULT_FALSE_POSITIVE_RATE
}

/// Errors from constructing a corrector.
#[derive(Debug, thiserror::Error)]
pub enum CorrectorError {
    /// The language model failed to load, train or dump.
    #[error("language model error")]
    Model(#[from] ModelError),

    /// The delete cache could not be written.
    #[error("cache error")]
    Cache(#[from] CacheError),
}

/// Statistical spelling corrector over a language model.
pub struct SpellCorrector<M> {
    model: M,
    cache: DeleteCache,
    config: CorrectorConfig,
}

impl<M: LanguageModel> SpellCorrector<M> {
    /// Wraps an in-memory model, building the delete cache from its
    /// vocabulary.
    pub fn new(model: M) -> SpellCorrector<M> {
        Self::with_config(model, CorrectorConfig::default())
    }

    /// As [`SpellCorrector::new`] with explicit tuning.
    pub fn with_config(model: M, config: CorrectorConfig) -> SpellCorrector<M> {
        let cache = DeleteCache::build(&model, config.false_positive_rate);
        SpellCorrector {
            model,
            cache,
            config,
        }
    }

    /// Ranked corrections for the word at `position`, best first.
    ///
    /// Infallible: an out-of-range position or a word with no reachable
    /// vocabulary neighborhood yields an empty list.
    pub fn get_candidates_scored<'a>(
        &'a self,
        sentence: &[Word<'a>],
        position: usize,
    ) -> Vec<ScoredWord<'a>> {
        CandidateWorker::new(&self.model, &self.cache, &self.config)
            .candidates_scored(sentence, position)
    }

    /// As [`SpellCorrector::get_candidates_scored`] with the scores
    /// stripped.
    pub fn get_candidates<'a>(&'a self, sentence: &[Word<'a>], position: usize) -> Vec<Word<'a>> {
        let scored = self.get_candidates_scored(sentence, position);
        for cand in &scored {
            log::trace!("candidate {} (score={})", cand.word(), cand.score());
        }
        scored.into_iter().map(|s| s.word()).collect()
    }

    /// Adjusts the known- and unknown-word penalties.
    pub fn set_penalty(&mut self, known_words_penalty: Score, unknown_words_penalty: Score) {
        self.config.known_words_penalty = known_words_penalty;
        self.config.unknown_words_penalty = unknown_words_penalty;
    }

    /// Adjusts the multiplier applied to fallback-level candidates.
    pub fn set_fallback_multiplier(&mut self, fallback_multiplier: Score) {
        self.config.fallback_multiplier = fallback_multiplier;
    }

    /// Adjusts the frequency-pruning cap.
    pub fn set_max_candidates_to_check(&mut self, max_candidates_to_check: usize) {
        self.config.max_candidates_to_check = max_candidates_to_check;
    }

    /// The language model backing this corrector.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The current tuning configuration.
    pub fn config(&self) -> &CorrectorConfig {
        &self.config
    }

    /// The delete-set cache backing this corrector.
    pub fn cache(&self) -> &DeleteCache {
        &self.cache
    }

    /// Persists the delete cache for this corrector's model snapshot.
    pub fn save_cache(&self, path: &Path) -> Result<(), CacheError> {
        self.cache.save(path, self.model.checksum())
    }
}

impl<M: StoredModel> SpellCorrector<M> {
    /// Loads a model from disk, then loads its sidecar `.spell` cache
    /// if valid; otherwise rebuilds the cache and tries to save it. A
    /// failed save is logged and does not fail the load; the engine
    /// stays usable in memory.
    pub fn load(model_path: impl AsRef<Path>) -> Result<SpellCorrector<M>, CorrectorError> {
        let model_path = model_path.as_ref();
        let model = M::load(model_path)?;
        let config = CorrectorConfig::default();

        let cache_file = cache_path(model_path);
        let cache = match DeleteCache::load(&cache_file, model.checksum()) {
            Ok(cache) => cache,
            Err(err) => {
                log::debug!(
                    "cache at {} unusable ({}), rebuilding",
                    cache_file.display(),
                    err
                );
                let cache = DeleteCache::build(&model, config.false_positive_rate);
                if let Err(err) = cache.save(&cache_file, model.checksum()) {
                    log::error!(
                        "could not save delete cache to {}: {}",
                        cache_file.display(),
                        err
                    );
                }
                cache
            }
        };

        Ok(SpellCorrector {
            model,
            cache,
            config,
        })
    }

    /// Trains a model from a corpus and alphabet file, dumps it to
    /// `model_path`, then builds and saves the sidecar cache.
    pub fn train(
        corpus_path: impl AsRef<Path>,
        alphabet_path: impl AsRef<Path>,
        model_path: impl AsRef<Path>,
    ) -> Result<SpellCorrector<M>, CorrectorError> {
        let model = M::train(corpus_path.as_ref(), alphabet_path.as_ref())?;
        model.dump(model_path.as_ref())?;

        let config = CorrectorConfig::default();
        let cache = DeleteCache::build(&model, config.false_positive_rate);
        cache.save(&cache_path(model_path.as_ref()), model.checksum())?;

        Ok(SpellCorrector {
            model,
            cache,
            config,
        })
    }
}

fn cache_path(model_path: &Path) -> PathBuf {
    let mut os: OsString = model_path.as_os_str().to_os_string();
    os.push(CACHE_EXT);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ngram::NgramModel;
    use std::fs;
    use tempfile::TempDir;

    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

    fn write_fixture(dir: &TempDir) -> (PathBuf, PathBuf) {
        let corpus = dir.path().join("corpus.txt");
        let alphabet = dir.path().join("alphabet.txt");
        fs::write(
            &corpus,
            "the quick brown fox jumps over the lazy dog.\n".repeat(10),
        )
        .unwrap();
        fs::write(&alphabet, ALPHABET).unwrap();
        (corpus, alphabet)
    }

    fn fixture() -> SpellCorrector<NgramModel> {
        let dir = tempfile::tempdir().unwrap();
        let (corpus, alphabet) = write_fixture(&dir);
        let model = NgramModel::train(&corpus, &alphabet).unwrap();
        SpellCorrector::new(model)
    }

    fn sentence<'a>(words: &[&'a str]) -> Vec<Word<'a>> {
        words.iter().map(|w| Word::new(w)).collect()
    }

    fn top<'a>(corrector: &'a SpellCorrector<NgramModel>, words: &[&'a str], pos: usize) -> String {
        let sent = sentence(words);
        let scored = corrector.get_candidates_scored(&sent, pos);
        assert!(!scored.is_empty(), "no candidates for {:?}", words);
        scored[0].word().as_str().to_string()
    }

    #[test]
    fn corrects_a_missing_letter() {
        let corrector = fixture();
        assert_eq!(top(&corrector, &["the", "quik", "brown", "fox"], 1), "quick");
    }

    #[test]
    fn corrects_a_replaced_letter() {
        let corrector = fixture();
        assert_eq!(top(&corrector, &["the", "jumpz", "over"], 1), "jumps");
    }

    #[test]
    fn corrects_a_transposition() {
        let corrector = fixture();
        assert_eq!(top(&corrector, &["teh", "quick"], 0), "the");
    }

    #[test]
    fn keeps_a_correct_word() {
        let corrector = fixture();
        assert_eq!(top(&corrector, &["the", "quick", "brown"], 2), "brown");
    }

    #[test]
    fn hopeless_word_yields_nothing() {
        let corrector = fixture();
        let sent = sentence(&["xyzzy"]);
        assert!(corrector.get_candidates_scored(&sent, 0).is_empty());
    }

    #[test]
    fn out_of_range_position_yields_nothing() {
        let corrector = fixture();
        let sent = sentence(&["the"]);
        assert!(corrector.get_candidates_scored(&sent, 5).is_empty());
        assert!(corrector.get_candidates(&sent, 5).is_empty());
    }

    #[test]
    fn every_vocabulary_word_ranks_itself_first() {
        let corrector = fixture();
        for (word, _) in corrector.model().words() {
            let host = word.to_string();
            let sent = vec![Word::new(host.as_str())];
            let scored = corrector.get_candidates_scored(&sent, 0);
            assert_eq!(
                scored[0].word().as_str(),
                word,
                "{} did not rank itself first",
                word
            );
        }
    }

    #[test]
    fn single_edits_are_always_recalled() {
        let corrector = fixture();
        let vocab: Vec<String> = corrector
            .model()
            .words()
            .map(|(w, _)| w.to_string())
            .collect();

        for word in &vocab {
            let chars: Vec<char> = word.chars().collect();
            let mut perturbed: Vec<String> = Vec::new();

            for i in 0..chars.len() {
                let mut deleted = chars.clone();
                deleted.remove(i);
                perturbed.push(deleted.into_iter().collect());
            }
            for i in 0..chars.len() - 1 {
                let mut swapped = chars.clone();
                swapped.swap(i, i + 1);
                perturbed.push(swapped.into_iter().collect());
            }
            for i in 0..chars.len() {
                for ch in 'a'..='z' {
                    let mut replaced = chars.clone();
                    replaced[i] = ch;
                    perturbed.push(replaced.into_iter().collect());
                }
            }
            for i in 0..=chars.len() {
                for ch in 'a'..='z' {
                    let mut inserted = chars.clone();
                    inserted.insert(i, ch);
                    perturbed.push(inserted.into_iter().collect());
                }
            }

            for p in perturbed {
                if p == *word {
                    continue;
                }
                assert!(strsim::damerau_levenshtein(&p, word) <= 1);

                let sent = vec![Word::new(p.as_str())];
                let found = corrector
                    .get_candidates(&sent, 0)
                    .iter()
                    .any(|c| c.as_str() == word);
                assert!(found, "{} not recalled from perturbation {}", word, p);
            }
        }
    }

    #[test]
    fn pruning_always_keeps_the_query_token() {
        let mut corrector = fixture();
        corrector.set_max_candidates_to_check(1);

        let sent = sentence(&["the", "quik", "brown", "fox"]);
        let candidates = corrector.get_candidates(&sent, 1);
        assert!(candidates.iter().any(|c| c.as_str() == "quik"));
        // The cap plus the re-added query token.
        assert!(candidates.len() <= 2);
    }

    #[test]
    fn queries_are_deterministic() {
        let corrector = fixture();
        let sent = sentence(&["the", "quik", "brown", "fox"]);
        let first = corrector.get_candidates_scored(&sent, 1);
        let second = corrector.get_candidates_scored(&sent, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn penalties_are_tunable() {
        let mut corrector = fixture();
        let sent = sentence(&["the", "quik", "brown", "fox"]);
        let baseline = top(&corrector, &["the", "quik", "brown", "fox"], 1);
        assert_ne!(baseline, "quik");

        // With a crushing unknown-word penalty the identity token wins.
        corrector.set_penalty(20.0, 1000.0);
        let repenalized = corrector.get_candidates_scored(&sent, 1);
        assert_eq!(repenalized[0].word().as_str(), "quik");
    }

    #[test]
    fn train_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (corpus, alphabet) = write_fixture(&dir);
        let model_path = dir.path().join("fixture.model");

        let trained: SpellCorrector<NgramModel> =
            SpellCorrector::train(&corpus, &alphabet, &model_path).unwrap();
        assert!(model_path.exists());
        assert!(cache_path(&model_path).exists());

        let loaded: SpellCorrector<NgramModel> = SpellCorrector::load(&model_path).unwrap();
        assert_eq!(
            trained.model().checksum(),
            loaded.model().checksum(),
            "loaded model is a different snapshot"
        );

        for words in [
            vec!["the", "quik", "brown", "fox"],
            vec!["teh", "quick"],
            vec!["the", "jumpz", "over"],
        ] {
            let sent = sentence(&words);
            assert_eq!(
                trained.get_candidates_scored(&sent, 1.min(words.len() - 1)),
                loaded.get_candidates_scored(&sent, 1.min(words.len() - 1))
            );
        }
    }

    #[test]
    fn load_rebuilds_a_corrupted_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (corpus, alphabet) = write_fixture(&dir);
        let model_path = dir.path().join("fixture.model");

        let _ = SpellCorrector::<NgramModel>::train(&corpus, &alphabet, &model_path).unwrap();

        let cache_file = cache_path(&model_path);
        let mut bytes = fs::read(&cache_file).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&cache_file, bytes).unwrap();

        // The corrupted sidecar is silently rebuilt and the engine works.
        let corrector: SpellCorrector<NgramModel> = SpellCorrector::load(&model_path).unwrap();
        assert_eq!(top(&corrector, &["teh", "quick"], 0), "the");
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = CorrectorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("known-words-penalty"));
        let back: CorrectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_candidates_to_check, config.max_candidates_to_check);
    }
}
