// English to Portuguese encoder-decoder translator: data loading, vocabularies,
// an LSTM sequence-to-sequence model trained with Adam, greedy decoding and a
// one-page web UI.

pub mod adam;
pub mod config;
pub mod dataset;
pub mod error;
pub mod layers;
pub mod lstm;
pub mod model;
pub mod sequence;
pub mod text_generator;
pub mod tokenizer;
pub mod training;
pub mod ui;

pub use config::TranslatorConfig;
pub use error::{Result, TranslatorError};
pub use text_generator::Translator;
