/*! Statistical spelling correction.

Given a sentence and a target position, produces a ranked list of
candidate replacements for the word at that position, scored by an
n-gram language model that weighs both how plausible a candidate is as
a word and how well it fits the surrounding context.

Candidate generation is symmetric-delete (SymSpell-style): the query's
deletion neighborhood is matched against two precomputed bloom filters
of vocabulary delete strings, which keeps two-edit enumeration
tractable without materializing the full Θ(n²·A²) edit space. The
filters are persisted to a `.spell` sidecar next to the model file and
validated against the model checksum on reload.

# Usage example

```no_run
use ngramspell::corrector::SpellCorrector;
use ngramspell::model::ngram::NgramModel;
use ngramspell::model::Word;

let corrector: SpellCorrector<NgramModel> =
    SpellCorrector::train("corpus.txt", "alphabet.txt", "en.model").unwrap();

let sentence = vec![Word::new("the"), Word::new("quik"), Word::new("fox")];
for candidate in corrector.get_candidates(&sentence, 1) {
    println!("{}", candidate);
}
```

On later runs, [`corrector::SpellCorrector::load`] reuses the dumped
model and its sidecar cache instead of retraining.
*/

#![warn(missing_docs)]

pub mod bloom;
pub mod cache;
pub mod corrector;
pub mod model;
pub mod tokenizer;
pub mod types;

pub(crate) mod constants;
pub(crate) mod hash;
