use std::fs;
use std::io::Read;

use csv::ReaderBuilder;
use log::{info, warn};
use ndarray::Array2;

use crate::config::DatasetConfig;
use crate::error::{Result, TranslatorError};
use crate::sequence::{max_len, pad_sequences, PadOptions};
use crate::tokenizer::{Tokenizer, END_TOKEN, START_TOKEN};

/// One aligned sentence pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    pub source: String,
    pub target: String,
}

impl SentencePair {
    pub fn new(source: &str, target: &str) -> Self {
        Self { source: source.to_string(), target: target.to_string() }
    }
}

/// Reads sentence pairs from the CSV file named in `config`.
pub fn load_pairs(config: &DatasetConfig) -> Result<Vec<SentencePair>> {
    if fs::metadata(&config.path).is_err() {
        return Err(TranslatorError::Dataset(format!("Dataset file not found: {}", config.path)));
    }
    let file = fs::File::open(&config.path)?;
    let pairs = read_pairs(file, config)?;
    info!("Loaded {} sentence pairs from {}", pairs.len(), config.path);
    Ok(pairs)
}

/// Parses pairs out of any CSV source, looking columns up by header name.
///
/// Rows where either side is blank are skipped.
pub fn read_pairs<R: Read>(reader: R, config: &DatasetConfig) -> Result<Vec<SentencePair>> {
    let delimiter = u8::try_from(config.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            TranslatorError::Dataset(format!(
                "CSV delimiter must be a single ASCII character, got {:?}",
                config.delimiter
            ))
        })?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| TranslatorError::Dataset(format!("Column '{}' not found in headers {:?}", name, headers)))
    };
    let source_col = column(&config.source_column)?;
    let target_col = column(&config.target_column)?;

    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    for record in rdr.records() {
        if config.max_pairs.map_or(false, |limit| pairs.len() >= limit) {
            break;
        }
        let record = record?;
        let source = record.get(source_col).unwrap_or("").trim();
        let target = record.get(target_col).unwrap_or("").trim();
        if source.is_empty() || target.is_empty() {
            skipped += 1;
            continue;
        }
        pairs.push(SentencePair::new(source, target));
    }
    if skipped > 0 {
        warn!("Skipped {} rows with a blank side", skipped);
    }
    Ok(pairs)
}

/// Vocabularies and padded index matrices ready for training.
///
/// `decoder_input` rows are `<start> w1 .. wn` and `decoder_target` rows are
/// `w1 .. wn <end>`, both padded to `max_len_target` columns.
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    pub source_tokenizer: Tokenizer,
    pub target_tokenizer: Tokenizer,
    pub encoder_input: Array2<usize>,
    pub decoder_input: Array2<usize>,
    pub decoder_target: Array2<usize>,
    pub max_len_source: usize,
    pub max_len_target: usize,
}

impl PreparedCorpus {
    pub fn build(pairs: &[SentencePair]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(TranslatorError::Dataset("No sentence pairs to train on".to_string()));
        }

        let source_texts: Vec<&str> = pairs.iter().map(|p| p.source.as_str()).collect();
        let mut source_tokenizer = Tokenizer::new();
        source_tokenizer.fit_on_texts(&source_texts)?;

        let mut target_words = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let mut words = vec![START_TOKEN.to_string()];
            words.extend(Tokenizer::split_words(&pair.target)?);
            words.push(END_TOKEN.to_string());
            target_words.push(words);
        }
        let mut target_tokenizer = Tokenizer::new();
        target_tokenizer.fit_on_word_sequences(&target_words);

        let source_sequences = source_tokenizer.texts_to_sequences(&source_texts)?;
        let target_sequences: Vec<Vec<usize>> = target_words
            .iter()
            .map(|words| target_tokenizer.words_to_sequence(words))
            .collect();

        let max_len_source = max_len(&source_sequences).max(1);
        // one position is lost to the shift between decoder input and target
        let max_len_target = max_len(&target_sequences) - 1;

        let (inputs, targets): (Vec<Vec<usize>>, Vec<Vec<usize>>) = target_sequences
            .iter()
            .map(|seq| (seq[..seq.len() - 1].to_vec(), seq[1..].to_vec()))
            .unzip();

        let options = PadOptions::default();
        let corpus = Self {
            encoder_input: pad_sequences(&source_sequences, max_len_source, options),
            decoder_input: pad_sequences(&inputs, max_len_target, options),
            decoder_target: pad_sequences(&targets, max_len_target, options),
            source_tokenizer,
            target_tokenizer,
            max_len_source,
            max_len_target,
        };
        info!(
            "Prepared corpus: {} pairs, source vocab {}, target vocab {}, max lengths {}/{}",
            corpus.len(),
            corpus.source_tokenizer.vocab_size(),
            corpus.target_tokenizer.vocab_size(),
            corpus.max_len_source,
            corpus.max_len_target
        );
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.encoder_input.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
