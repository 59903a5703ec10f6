use std::collections::HashMap;

use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

use crate::error::{Result, TranslatorError};

/// Reserved index for padding. No word is ever mapped to it.
pub const PAD_INDEX: usize = 0;
pub const START_TOKEN: &str = "<start>";
pub const END_TOKEN: &str = "<end>";

/// Characters treated as separators before splitting. Apostrophes are not among them.
const FILTERED_CHARS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Frequency-ranked word vocabulary.
///
/// Indices start at 1: the most frequent word gets 1, ties keep the order in
/// which the words were first seen. Index 0 stays free for padding.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    // (word, count) in first-seen order
    word_counts: Vec<(String, usize)>,
    count_slots: HashMap<String, usize>,
    word_index: HashMap<String, usize>,
    index_word: HashMap<usize, String>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercases `text`, turns every filtered character into a space and splits on whitespace.
    ///
    /// Contractions stay whole (`don't`) while underscores and hyphens separate words.
    pub fn split_words(text: &str) -> Result<Vec<String>> {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|ch| if FILTERED_CHARS.contains(ch) { ' ' } else { ch })
            .collect();
        let mut pretokenized = PreTokenizedString::from(cleaned.as_str());
        WhitespaceSplit
            .pre_tokenize(&mut pretokenized)
            .map_err(|e| TranslatorError::Tokenizer(format!("Failed to split '{}': {}", text, e)))?;

        Ok(pretokenized
            .get_splits(OffsetReferential::Original, OffsetType::Char)
            .into_iter()
            .map(|(piece, _, _)| piece.to_string())
            .collect())
    }

    pub fn fit_on_texts<S: AsRef<str>>(&mut self, texts: &[S]) -> Result<()> {
        let mut sequences = Vec::with_capacity(texts.len());
        for text in texts {
            sequences.push(Self::split_words(text.as_ref())?);
        }
        self.fit_on_word_sequences(&sequences);
        Ok(())
    }

    /// Counts already split words and rebuilds both index maps.
    pub fn fit_on_word_sequences(&mut self, sequences: &[Vec<String>]) {
        for words in sequences {
            for word in words {
                match self.count_slots.get(word) {
                    Some(&slot) => self.word_counts[slot].1 += 1,
                    None => {
                        self.count_slots.insert(word.clone(), self.word_counts.len());
                        self.word_counts.push((word.clone(), 1));
                    }
                }
            }
        }
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        let mut ranked: Vec<&(String, usize)> = self.word_counts.iter().collect();
        // stable sort keeps first-seen order among equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        self.word_index.clear();
        self.index_word.clear();
        for (rank, (word, _)) in ranked.into_iter().enumerate() {
            let index = rank + 1;
            self.word_index.insert(word.clone(), index);
            self.index_word.insert(index, word.clone());
        }
    }

    /// Maps words to indices, skipping words the vocabulary has never seen.
    pub fn words_to_sequence<S: AsRef<str>>(&self, words: &[S]) -> Vec<usize> {
        words
            .iter()
            .filter_map(|word| self.word_index.get(word.as_ref()).copied())
            .collect()
    }

    pub fn texts_to_sequences<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<usize>>> {
        texts
            .iter()
            .map(|text| Ok(self.words_to_sequence(&Self::split_words(text.as_ref())?)))
            .collect()
    }

    /// Inverse of [`Tokenizer::words_to_sequence`]. Padding and unknown indices are skipped.
    pub fn sequence_to_words(&self, sequence: &[usize]) -> Vec<String> {
        sequence
            .iter()
            .filter_map(|index| self.index_word.get(index).cloned())
            .collect()
    }

    pub fn word_index(&self, word: &str) -> Option<usize> {
        self.word_index.get(word).copied()
    }

    pub fn index_word(&self, index: usize) -> Option<&str> {
        self.index_word.get(&index).map(String::as_str)
    }

    pub fn word_count(&self, word: &str) -> usize {
        self.count_slots.get(word).map(|&slot| self.word_counts[slot].1).unwrap_or(0)
    }

    /// Number of embedding rows needed: every word plus the padding slot.
    pub fn vocab_size(&self) -> usize {
        self.word_index.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_words_lowercases_and_drops_punctuation() -> Result<()> {
        let words = Tokenizer::split_words("Hello, World!  How are you?")?;
        assert_eq!(words, vec!["hello", "world", "how", "are", "you"]);
        Ok(())
    }

    #[test]
    fn test_split_words_keeps_contractions_and_splits_underscores() -> Result<()> {
        let words = Tokenizer::split_words("I'm don't snake_case well-known")?;
        assert_eq!(words, vec!["i'm", "don't", "snake", "case", "well", "known"]);
        Ok(())
    }

    #[test]
    fn test_split_words_keeps_accented_letters() -> Result<()> {
        let words = Tokenizer::split_words("Olá, você está bem?")?;
        assert_eq!(words, vec!["olá", "você", "está", "bem"]);
        Ok(())
    }

    #[test]
    fn test_frequency_ranking_and_reserved_zero() -> Result<()> {
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit_on_texts(&["the cat", "the dog", "a cat the"])?;

        assert_eq!(tokenizer.word_index("the"), Some(1));
        assert_eq!(tokenizer.word_index("cat"), Some(2));
        // dog and a both appear once; dog was seen first
        assert_eq!(tokenizer.word_index("dog"), Some(3));
        assert_eq!(tokenizer.word_index("a"), Some(4));
        assert_eq!(tokenizer.index_word(PAD_INDEX), None);
        assert_eq!(tokenizer.vocab_size(), 5);
        assert_eq!(tokenizer.word_count("the"), 3);
        Ok(())
    }

    #[test]
    fn test_texts_to_sequences_drops_unknown_words() -> Result<()> {
        let mut tokenizer = Tokenizer::new();
        tokenizer.fit_on_texts(&["i like tea"])?;
        let sequences = tokenizer.texts_to_sequences(&["I like coffee", "zebra"])?;
        assert_eq!(sequences, vec![vec![1, 2], vec![]]);
        Ok(())
    }

    #[test]
    fn test_markers_survive_word_level_fit() {
        let mut tokenizer = Tokenizer::new();
        let words: Vec<String> = [START_TOKEN, "olá", END_TOKEN].iter().map(|w| w.to_string()).collect();
        tokenizer.fit_on_word_sequences(&[words.clone()]);

        let sequence = tokenizer.words_to_sequence(&words);
        assert_eq!(sequence.len(), 3);
        assert_eq!(tokenizer.sequence_to_words(&sequence), words);
        assert!(tokenizer.word_index(START_TOKEN).is_some());
    }

    proptest! {
        #[test]
        fn prop_fitted_words_round_trip(words in proptest::collection::vec("[a-z]{1,6}", 1..20)) {
            let mut tokenizer = Tokenizer::new();
            let text = words.join(" ");
            tokenizer.fit_on_texts(&[text.as_str()]).unwrap();

            let sequence = tokenizer.texts_to_sequences(&[text.as_str()]).unwrap().remove(0);
            prop_assert_eq!(sequence.len(), words.len());
            prop_assert!(sequence.iter().all(|&index| index != PAD_INDEX));
            prop_assert_eq!(tokenizer.sequence_to_words(&sequence), words);
        }
    }
}
