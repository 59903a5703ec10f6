use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, TranslatorError};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: String,
    pub source_column: String,
    pub target_column: String,
    pub delimiter: char,
    /// Keep only the first `max_pairs` usable rows.
    pub max_pairs: Option<usize>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: "data/Pt.csv".to_string(),
            source_column: "english".to_string(),
            target_column: "portuguese".to_string(),
            delimiter: ',',
            max_pairs: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(alias = "latent_dim")]
    pub embedding_dim: usize,
    pub hidden_dim: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { embedding_dim: 64, hidden_dim: 64 }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub shuffle: bool,
    pub seed: u64,
    /// Global gradient norm ceiling; `None` disables clipping.
    pub clip_norm: Option<f32>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 2,
            learning_rate: 0.001,
            shuffle: true,
            seed: 42,
            clip_norm: Some(5.0),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, workers: 1 }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TranslatorConfig {
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub server: ServerConfig,
}

impl TranslatorConfig {
    pub fn load(config_path: &str) -> Result<Self> {
        if !Path::new(config_path).exists() {
            return Err(TranslatorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Config file not found at: {}", config_path),
            )));
        }

        let mut file = File::open(config_path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: TranslatorConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.embedding_dim == 0 || self.model.hidden_dim == 0 {
            return Err(TranslatorError::Model("embedding_dim and hidden_dim must be positive".to_string()));
        }
        if self.training.batch_size == 0 {
            return Err(TranslatorError::Model("batch_size must be positive".to_string()));
        }
        if !self.dataset.delimiter.is_ascii() {
            return Err(TranslatorError::Dataset(format!(
                "CSV delimiter must be a single ASCII character, got {:?}",
                self.dataset.delimiter
            )));
        }
        Ok(())
    }
}
