use log::debug;
use ndarray_stats::QuantileExt;

use crate::config::TranslatorConfig;
use crate::dataset::{load_pairs, PreparedCorpus};
use crate::error::{Result, TranslatorError};
use crate::model::Seq2Seq;
use crate::sequence::{pad_sequences, PadOptions};
use crate::tokenizer::{Tokenizer, END_TOKEN, PAD_INDEX, START_TOKEN};
use crate::training::{Trainer, TrainingHistory};

/// A trained model together with the vocabularies and lengths it was trained with.
#[derive(Debug, Clone)]
pub struct Translator {
    model: Seq2Seq,
    source_tokenizer: Tokenizer,
    target_tokenizer: Tokenizer,
    max_len_source: usize,
    max_len_target: usize,
}

impl Translator {
    pub fn new(
        model: Seq2Seq,
        source_tokenizer: Tokenizer,
        target_tokenizer: Tokenizer,
        max_len_source: usize,
        max_len_target: usize,
    ) -> Result<Self> {
        if model.source_vocab_size() != source_tokenizer.vocab_size()
            || model.target_vocab_size() != target_tokenizer.vocab_size()
        {
            return Err(TranslatorError::Model(format!(
                "Model vocabularies ({}, {}) do not match tokenizers ({}, {})",
                model.source_vocab_size(),
                model.target_vocab_size(),
                source_tokenizer.vocab_size(),
                target_tokenizer.vocab_size()
            )));
        }
        Ok(Self { model, source_tokenizer, target_tokenizer, max_len_source, max_len_target })
    }

    /// Builds the model for `corpus`, trains it and wraps the result.
    pub fn train(corpus: PreparedCorpus, config: &TranslatorConfig) -> Result<(Self, TrainingHistory)> {
        let mut model = Seq2Seq::new(
            &config.model,
            corpus.source_tokenizer.vocab_size(),
            corpus.target_tokenizer.vocab_size(),
            config.training.seed,
        )?;
        let history = Trainer::new(config.training.clone())?.fit(&mut model, &corpus)?;
        let translator = Self::new(
            model,
            corpus.source_tokenizer,
            corpus.target_tokenizer,
            corpus.max_len_source,
            corpus.max_len_target,
        )?;
        Ok((translator, history))
    }

    /// Whole pipeline: load the CSV named in `config`, prepare it, train.
    pub fn from_config(config: &TranslatorConfig) -> Result<(Self, TrainingHistory)> {
        config.validate()?;
        let pairs = load_pairs(&config.dataset)?;
        let corpus = PreparedCorpus::build(&pairs)?;
        Self::train(corpus, config)
    }

    pub fn max_len_target(&self) -> usize {
        self.max_len_target
    }

    /// Greedy token ids for `sentence`, at most `max_len_target` of them.
    ///
    /// Stops early when `<end>` is the most likely token; the `<end>` id is not returned.
    pub fn decode_ids(&self, sentence: &str) -> Result<Vec<usize>> {
        if sentence.trim().is_empty() {
            return Err(TranslatorError::EmptyInput);
        }

        let sequences = self.source_tokenizer.texts_to_sequences(&[sentence])?;
        let padded = pad_sequences(&sequences, self.max_len_source, PadOptions::default());
        let source = padded.row(0).to_vec();
        debug!("Source ids for '{}': {:?}", sentence, source);

        let mut state = self.model.encode(&source)?;
        let mut token = self.target_tokenizer.word_index(START_TOKEN).unwrap_or(PAD_INDEX);
        let end = self.target_tokenizer.word_index(END_TOKEN);

        let mut generated = Vec::new();
        for _ in 0..self.max_len_target {
            let (logits, next) = self.model.decode_step(token, &state)?;
            let sampled = logits
                .argmax()
                .map_err(|e| TranslatorError::Model(format!("Cannot pick next token: {}", e)))?;
            if Some(sampled) == end {
                break;
            }
            generated.push(sampled);
            token = sampled;
            state = next;
        }
        Ok(generated)
    }

    /// Translates one sentence with greedy decoding.
    ///
    /// Empty or whitespace-only input fails with [`TranslatorError::EmptyInput`]
    /// before the model runs.
    pub fn translate(&self, sentence: &str) -> Result<String> {
        let ids = self.decode_ids(sentence)?;
        Ok(self.target_tokenizer.sequence_to_words(&ids).join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, TrainingConfig};
    use crate::dataset::SentencePair;

    fn pairs() -> Vec<SentencePair> {
        vec![
            SentencePair::new("hello", "olá"),
            SentencePair::new("thank you", "muito obrigado"),
            SentencePair::new("good night", "boa noite"),
            SentencePair::new("good morning", "bom dia"),
        ]
    }

    fn config(epochs: usize) -> TranslatorConfig {
        TranslatorConfig {
            model: ModelConfig { embedding_dim: 16, hidden_dim: 32 },
            training: TrainingConfig { epochs, learning_rate: 0.01, ..TrainingConfig::default() },
            ..TranslatorConfig::default()
        }
    }

    fn untrained() -> Translator {
        Translator::train(PreparedCorpus::build(&pairs()).unwrap(), &config(0)).unwrap().0
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let translator = untrained();
        for input in ["", "   ", "\n\t "] {
            assert!(matches!(translator.translate(input), Err(TranslatorError::EmptyInput)));
        }
    }

    #[test]
    fn test_empty_input_never_reaches_the_model() {
        // vocabularies far larger than the model: any encode or decode step fails
        let corpus = PreparedCorpus::build(&pairs()).unwrap();
        let model = Seq2Seq::new(&ModelConfig { embedding_dim: 2, hidden_dim: 2 }, 2, 2, 0).unwrap();
        let translator = Translator {
            model,
            source_tokenizer: corpus.source_tokenizer,
            target_tokenizer: corpus.target_tokenizer,
            max_len_source: corpus.max_len_source,
            max_len_target: corpus.max_len_target,
        };

        assert!(matches!(translator.translate("hello"), Err(TranslatorError::Model(_))));
        for input in ["", "  \t"] {
            assert!(matches!(translator.translate(input), Err(TranslatorError::EmptyInput)));
        }
    }

    #[test]
    fn test_decoding_is_deterministic() -> Result<()> {
        let translator = untrained();
        let first = translator.translate("good night")?;
        for _ in 0..3 {
            assert_eq!(translator.translate("good night")?, first);
        }
        Ok(())
    }

    #[test]
    fn test_decoding_is_bounded_by_max_target_length() -> Result<()> {
        let mut translator = untrained();
        // strip the end marker's chance of winning
        let end = translator.target_tokenizer.word_index(END_TOKEN).unwrap();
        translator.model.projection.bias[end] = -1e4;

        let ids = translator.decode_ids("hello")?;
        assert_eq!(ids.len(), translator.max_len_target());
        Ok(())
    }

    #[test]
    fn test_unknown_words_still_decode() -> Result<()> {
        let translator = untrained();
        let ids = translator.decode_ids("zebra xylophone")?;
        assert!(ids.len() <= translator.max_len_target());
        Ok(())
    }

    #[test]
    fn test_long_input_is_truncated_not_rejected() -> Result<()> {
        let translator = untrained();
        let ids = translator.decode_ids("good good good good good morning night hello")?;
        assert!(ids.len() <= translator.max_len_target());
        Ok(())
    }

    #[test]
    fn test_trained_model_reproduces_training_pairs() -> Result<()> {
        let corpus = PreparedCorpus::build(&pairs())?;
        let (translator, history) = Translator::train(corpus, &config(200))?;
        assert!(history.final_loss().unwrap() < 0.2, "final loss {:?}", history.final_loss());

        assert_eq!(translator.translate("hello")?, "olá");
        assert_eq!(translator.translate("good night")?, "boa noite");
        assert_eq!(translator.translate("Thank you!")?, "muito obrigado");
        Ok(())
    }

    #[test]
    fn test_new_rejects_mismatched_tokenizers() {
        let corpus = PreparedCorpus::build(&pairs()).unwrap();
        let model = Seq2Seq::new(&ModelConfig { embedding_dim: 4, hidden_dim: 4 }, 3, 3, 0).unwrap();
        let result = Translator::new(model, corpus.source_tokenizer, corpus.target_tokenizer, 2, 3);
        assert!(result.is_err());
    }
}
