use log::{debug, info};
use ndarray::{Axis, Ix1, Ix2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::adam::Adam;
use crate::config::TrainingConfig;
use crate::dataset::PreparedCorpus;
use crate::error::{Result, TranslatorError};
use crate::lstm::{Lstm, LstmGrads};
use crate::model::{Seq2Seq, Seq2SeqGrads};

struct LstmOptimizer {
    kernel: Adam<Ix2>,
    recurrent: Adam<Ix2>,
    bias: Adam<Ix1>,
}

impl LstmOptimizer {
    fn new(lstm: &Lstm) -> Self {
        Self {
            kernel: Adam::new(lstm.kernel.raw_dim()),
            recurrent: Adam::new(lstm.recurrent.raw_dim()),
            bias: Adam::new(lstm.bias.raw_dim()),
        }
    }

    fn step(&mut self, lstm: &mut Lstm, grads: &LstmGrads, lr: f32) {
        self.kernel.step(&mut lstm.kernel, &grads.kernel, lr);
        self.recurrent.step(&mut lstm.recurrent, &grads.recurrent, lr);
        self.bias.step(&mut lstm.bias, &grads.bias, lr);
    }
}

/// One Adam state per parameter tensor of a [`Seq2Seq`].
pub struct Seq2SeqOptimizer {
    source_embedding: Adam<Ix2>,
    encoder: LstmOptimizer,
    target_embedding: Adam<Ix2>,
    decoder: LstmOptimizer,
    projection_weight: Adam<Ix2>,
    projection_bias: Adam<Ix1>,
    learning_rate: f32,
}

impl Seq2SeqOptimizer {
    pub fn new(model: &Seq2Seq, learning_rate: f32) -> Self {
        Self {
            source_embedding: Adam::new(model.source_embedding.weight.raw_dim()),
            encoder: LstmOptimizer::new(&model.encoder),
            target_embedding: Adam::new(model.target_embedding.weight.raw_dim()),
            decoder: LstmOptimizer::new(&model.decoder),
            projection_weight: Adam::new(model.projection.weight.raw_dim()),
            projection_bias: Adam::new(model.projection.bias.raw_dim()),
            learning_rate,
        }
    }

    pub fn step(&mut self, model: &mut Seq2Seq, grads: &Seq2SeqGrads) {
        let lr = self.learning_rate;
        self.source_embedding.step(&mut model.source_embedding.weight, &grads.source_embedding, lr);
        self.encoder.step(&mut model.encoder, &grads.encoder, lr);
        self.target_embedding.step(&mut model.target_embedding.weight, &grads.target_embedding, lr);
        self.decoder.step(&mut model.decoder, &grads.decoder, lr);
        self.projection_weight.step(&mut model.projection.weight, &grads.projection.weight, lr);
        self.projection_bias.step(&mut model.projection.bias, &grads.projection.bias, lr);
    }
}

/// Mean batch loss per epoch, in training order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epoch_losses: Vec<f32>,
}

impl TrainingHistory {
    pub fn final_loss(&self) -> Option<f32> {
        self.epoch_losses.last().copied()
    }
}

/// Mini-batch trainer: `epochs` passes of Adam over the corpus.
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(TranslatorError::Model("batch_size must be positive".to_string()));
        }
        if !(config.learning_rate > 0.0) {
            return Err(TranslatorError::Model(format!("learning_rate must be positive, got {}", config.learning_rate)));
        }
        Ok(Self { config })
    }

    pub fn fit(&self, model: &mut Seq2Seq, corpus: &PreparedCorpus) -> Result<TrainingHistory> {
        if corpus.is_empty() {
            return Err(TranslatorError::Dataset("Cannot train on an empty corpus".to_string()));
        }

        let mut optimizer = Seq2SeqOptimizer::new(model, self.config.learning_rate);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..corpus.len()).collect();
        let mut history = TrainingHistory::default();

        info!(
            "Training on {} pairs: {} epochs, batch size {}, learning rate {}",
            corpus.len(),
            self.config.epochs,
            self.config.batch_size,
            self.config.learning_rate
        );

        for epoch in 0..self.config.epochs {
            if self.config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut epoch_loss = 0.0f32;
            let mut batches = 0usize;
            for batch in order.chunks(self.config.batch_size) {
                let encoder_input = corpus.encoder_input.select(Axis(0), batch);
                let decoder_input = corpus.decoder_input.select(Axis(0), batch);
                let decoder_target = corpus.decoder_target.select(Axis(0), batch);

                let (loss, mut grads) = model.forward_backward(&encoder_input, &decoder_input, &decoder_target)?;
                if !loss.is_finite() {
                    return Err(TranslatorError::Model(format!("Loss diverged at epoch {}: {}", epoch + 1, loss)));
                }
                if let Some(max_norm) = self.config.clip_norm {
                    let norm = grads.clip_global_norm(max_norm);
                    debug!("epoch {} batch {}: loss {:.4}, grad norm {:.4}", epoch + 1, batches + 1, loss, norm);
                }
                optimizer.step(model, &grads);

                epoch_loss += loss;
                batches += 1;
            }

            let mean_loss = epoch_loss / batches as f32;
            info!("Epoch {}/{} - loss: {:.4}", epoch + 1, self.config.epochs, mean_loss);
            history.epoch_losses.push(mean_loss);
        }
        Ok(history)
    }
}
