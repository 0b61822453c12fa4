//! Trainable n-gram language model.
//!
//! Counts 1/2/3-grams over an alphabet-tokenized corpus and scores
//! sentences with a stupid-backoff log-probability sum: a trigram hit
//! scores `ln(c3/c2)`, a bigram hit `ln(0.4·c2/c1)`, anything else
//! backs off to an add-one unigram estimate. The exact smoothing is not
//! part of any contract; the correction engine only requires "higher
//! is better" and determinism.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::{HashMap, HashSet};
use smol_str::SmolStr;

use super::{LanguageModel, ModelError, StoredModel, Word};
use crate::constants::{MODEL_MAGIC, MODEL_VERSION};
use crate::hash;
use crate::tokenizer::Tokenize;
use crate::types::{Count, Score, WordId};

const BACKOFF: Score = 0.4;

/// Guards against allocating for a corrupt length field.
const MAX_VOCAB_LEN: u64 = 100_000_000;
const MAX_WORD_BYTES: u32 = 4096;

type Gram2 = [WordId; 2];
type Gram3 = [WordId; 3];

/// N-gram language model over a fixed alphabet.
pub struct NgramModel {
    vocab: Vec<SmolStr>,
    word_to_id: HashMap<SmolStr, WordId>,
    counts: Vec<Count>,
    grams2: HashMap<Gram2, Count>,
    grams3: HashMap<Gram3, Count>,
    total_words: Count,
    alphabet: Vec<char>,
    alphabet_set: HashSet<char>,
    checksum: u64,
}

impl NgramModel {
    fn empty(alphabet: Vec<char>) -> NgramModel {
        let alphabet_set = alphabet.iter().copied().collect();
        NgramModel {
            vocab: Vec::new(),
            word_to_id: HashMap::new(),
            counts: Vec::new(),
            grams2: HashMap::new(),
            grams3: HashMap::new(),
            total_words: 0,
            alphabet,
            alphabet_set,
            checksum: 0,
        }
    }

    fn intern(&mut self, word: &str) -> WordId {
        if let Some(&id) = self.word_to_id.get(word) {
            return id;
        }
        let id = self.vocab.len() as WordId;
        let owned = SmolStr::from(word);
        self.vocab.push(owned.clone());
        self.word_to_id.insert(owned, id);
        self.counts.push(0);
        id
    }

    fn unigram_prob(&self, id: Option<WordId>) -> Score {
        let count = id.map(|id| self.counts[id as usize]).unwrap_or(0);
        (count as Score + 1.0) / (self.total_words as Score + self.vocab.len() as Score + 1.0)
    }

    fn log_prob_at(&self, ids: &[Option<WordId>], i: usize) -> Score {
        if i == 0 {
            return self.unigram_prob(ids[0]).ln();
        }

        if let (Some(a), Some(b)) = (ids[i - 1], ids[i]) {
            if i >= 2 {
                if let Some(z) = ids[i - 2] {
                    if let (Some(&c3), Some(&c2)) =
                        (self.grams3.get(&[z, a, b]), self.grams2.get(&[z, a]))
                    {
                        return (c3 as Score / c2 as Score).ln();
                    }
                }
            }
            if let Some(&c2) = self.grams2.get(&[a, b]) {
                let c1 = self.counts[a as usize];
                return (BACKOFF * c2 as Score / c1 as Score).ln();
            }
        }

        (BACKOFF * BACKOFF * self.unigram_prob(ids[i])).ln()
    }

    fn compute_checksum(&self) -> u64 {
        let mut state = hash::FNV64_OFFSET;
        for &ch in &self.alphabet {
            state = hash::fnv1a_with(state, &(ch as u32).to_le_bytes());
        }
        for (word, &count) in self.vocab.iter().zip(self.counts.iter()) {
            state = hash::fnv1a_with(state, word.as_bytes());
            state = hash::fnv1a_with(state, &[0xFF]);
            state = hash::fnv1a_with(state, &count.to_le_bytes());
        }
        state = hash::fnv1a_with(state, &self.total_words.to_le_bytes());
        for (gram, count) in sorted_entries(&self.grams2) {
            for id in gram {
                state = hash::fnv1a_with(state, &id.to_le_bytes());
            }
            state = hash::fnv1a_with(state, &count.to_le_bytes());
        }
        for (gram, count) in sorted_entries(&self.grams3) {
            for id in gram {
                state = hash::fnv1a_with(state, &id.to_le_bytes());
            }
            state = hash::fnv1a_with(state, &count.to_le_bytes());
        }
        state
    }
}

fn sorted_entries<const N: usize>(grams: &HashMap<[WordId; N], Count>) -> Vec<([WordId; N], Count)> {
    let mut entries: Vec<_> = grams.iter().map(|(&g, &c)| (g, c)).collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn read_alphabet(path: &Path) -> Result<Vec<char>, ModelError> {
    let text = fs::read_to_string(path)?;
    let mut alphabet = Vec::new();
    let mut seen = HashSet::new();
    for ch in text.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_whitespace() {
            continue;
        }
        if seen.insert(ch) {
            alphabet.push(ch);
        }
    }
    if alphabet.is_empty() {
        return Err(ModelError::EmptyAlphabet);
    }
    Ok(alphabet)
}

impl LanguageModel for NgramModel {
    fn word(&self, s: &str) -> Option<Word<'_>> {
        self.word_to_id
            .get(s)
            .map(|&id| Word::new(self.vocab[id as usize].as_str()))
    }

    fn word_id(&self, word: Word<'_>) -> Option<WordId> {
        self.word_to_id.get(word.as_str()).copied()
    }

    fn word_count(&self, id: WordId) -> Count {
        self.counts.get(id as usize).copied().unwrap_or(0)
    }

    fn words<'m>(&'m self) -> Box<dyn Iterator<Item = (&'m str, WordId)> + 'm> {
        Box::new(
            self.vocab
                .iter()
                .enumerate()
                .map(|(id, word)| (word.as_str(), id as WordId)),
        )
    }

    fn vocab_len(&self) -> usize {
        self.vocab.len()
    }

    fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    fn score(&self, sentence: &[Word<'_>]) -> Score {
        let ids: Vec<Option<WordId>> = sentence.iter().map(|&w| self.word_id(w)).collect();
        (0..ids.len()).map(|i| self.log_prob_at(&ids, i)).sum()
    }

    fn checksum(&self) -> u64 {
        self.checksum
    }

    fn tokenize<'t>(&self, text: &'t str) -> Vec<Vec<Word<'t>>> {
        text.sentences_with_alphabet(&self.alphabet_set)
    }
}

impl StoredModel for NgramModel {
    fn train(corpus_path: &Path, alphabet_path: &Path) -> Result<NgramModel, ModelError> {
        let alphabet = read_alphabet(alphabet_path)?;
        let mut model = NgramModel::empty(alphabet);

        let text = fs::read_to_string(corpus_path)?.to_lowercase();
        let sentences = text.sentences_with_alphabet(&model.alphabet_set);
        log::debug!(
            "training n-gram model: {} sentences, alphabet of {}",
            sentences.len(),
            model.alphabet.len()
        );

        for sentence in &sentences {
            let ids: Vec<WordId> = sentence.iter().map(|w| model.intern(w.as_str())).collect();
            for (i, &id) in ids.iter().enumerate() {
                model.counts[id as usize] += 1;
                model.total_words += 1;
                if i >= 1 {
                    *model.grams2.entry([ids[i - 1], id]).or_insert(0) += 1;
                }
                if i >= 2 {
                    *model.grams3.entry([ids[i - 2], ids[i - 1], id]).or_insert(0) += 1;
                }
            }
        }

        model.checksum = model.compute_checksum();
        log::debug!(
            "trained model: {} words, {} bigrams, {} trigrams",
            model.vocab.len(),
            model.grams2.len(),
            model.grams3.len()
        );
        Ok(model)
    }

    fn dump(&self, path: &Path) -> Result<(), ModelError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_u64::<LittleEndian>(MODEL_MAGIC)?;
        writer.write_u16::<LittleEndian>(MODEL_VERSION)?;

        writer.write_u32::<LittleEndian>(self.alphabet.len() as u32)?;
        for &ch in &self.alphabet {
            writer.write_u32::<LittleEndian>(ch as u32)?;
        }

        writer.write_u64::<LittleEndian>(self.vocab.len() as u64)?;
        for (word, &count) in self.vocab.iter().zip(self.counts.iter()) {
            writer.write_u32::<LittleEndian>(word.len() as u32)?;
            writer.write_all(word.as_bytes())?;
            writer.write_u64::<LittleEndian>(count)?;
        }
        writer.write_u64::<LittleEndian>(self.total_words)?;

        let grams2 = sorted_entries(&self.grams2);
        writer.write_u64::<LittleEndian>(grams2.len() as u64)?;
        for (gram, count) in grams2 {
            for id in gram {
                writer.write_u32::<LittleEndian>(id)?;
            }
            writer.write_u64::<LittleEndian>(count)?;
        }

        let grams3 = sorted_entries(&self.grams3);
        writer.write_u64::<LittleEndian>(grams3.len() as u64)?;
        for (gram, count) in grams3 {
            for id in gram {
                writer.write_u32::<LittleEndian>(id)?;
            }
            writer.write_u64::<LittleEndian>(count)?;
        }

        writer.write_u64::<LittleEndian>(self.checksum)?;
        writer.flush()?;
        Ok(())
    }

    fn load(path: &Path) -> Result<NgramModel, ModelError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        if reader.read_u64::<LittleEndian>()? != MODEL_MAGIC {
            return Err(ModelError::BadMagic);
        }
        let version = reader.read_u16::<LittleEndian>()?;
        if version != MODEL_VERSION {
            return Err(ModelError::UnsupportedVersion(version));
        }

        let alphabet_len = reader.read_u32::<LittleEndian>()?;
        let mut alphabet = Vec::with_capacity(alphabet_len as usize);
        for _ in 0..alphabet_len {
            let raw = reader.read_u32::<LittleEndian>()?;
            alphabet.push(char::from_u32(raw).ok_or(ModelError::Corrupt)?);
        }
        let mut model = NgramModel::empty(alphabet);

        let vocab_len = reader.read_u64::<LittleEndian>()?;
        if vocab_len > MAX_VOCAB_LEN {
            return Err(ModelError::Corrupt);
        }
        for _ in 0..vocab_len {
            let byte_len = reader.read_u32::<LittleEndian>()?;
            if byte_len > MAX_WORD_BYTES {
                return Err(ModelError::Corrupt);
            }
            let mut buf = vec![0u8; byte_len as usize];
            reader.read_exact(&mut buf)?;
            let word = String::from_utf8(buf).map_err(|_| ModelError::Corrupt)?;
            let id = model.intern(&word);
            model.counts[id as usize] = reader.read_u64::<LittleEndian>()?;
        }
        model.total_words = reader.read_u64::<LittleEndian>()?;

        let grams2_len = reader.read_u64::<LittleEndian>()?;
        if grams2_len > MAX_VOCAB_LEN {
            return Err(ModelError::Corrupt);
        }
        for _ in 0..grams2_len {
            let a = reader.read_u32::<LittleEndian>()?;
            let b = reader.read_u32::<LittleEndian>()?;
            let count = reader.read_u64::<LittleEndian>()?;
            model.grams2.insert([a, b], count);
        }

        let grams3_len = reader.read_u64::<LittleEndian>()?;
        if grams3_len > MAX_VOCAB_LEN {
            return Err(ModelError::Corrupt);
        }
        for _ in 0..grams3_len {
            let a = reader.read_u32::<LittleEndian>()?;
            let b = reader.read_u32::<LittleEndian>()?;
            let c = reader.read_u32::<LittleEndian>()?;
            let count = reader.read_u64::<LittleEndian>()?;
            model.grams3.insert([a, b, c], count);
        }

        let stored = reader.read_u64::<LittleEndian>()?;
        model.checksum = model.compute_checksum();
        if stored != model.checksum {
            return Err(ModelError::Corrupt);
        }

        Ok(model)
    }
}
