use thiserror::Error;

/// Errors raised anywhere in the translation pipeline.
#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    #[error("Dataset error: {0}")]
    Dataset(String),
    #[error("Model error: {0}")]
    Model(String),
    /// Raised before the model is touched when the input has no visible text.
    #[error("Please enter a sentence to translate.")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, TranslatorError>;
