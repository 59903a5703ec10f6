use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ModelConfig;
use crate::error::{Result, TranslatorError};
use crate::layers::{softmax_rows, Dense, DenseGrads, Embedding};
use crate::lstm::{Lstm, LstmGrads, LstmState};
use crate::tokenizer::PAD_INDEX;

fn sum_sq<'a>(values: impl Iterator<Item = &'a f32>) -> f32 {
    values.map(|v| v * v).sum()
}

/// Gradients for every parameter tensor of a [`Seq2Seq`], same shapes as the model.
#[derive(Debug, Clone)]
pub struct Seq2SeqGrads {
    pub source_embedding: Array2<f32>,
    pub encoder: LstmGrads,
    pub target_embedding: Array2<f32>,
    pub decoder: LstmGrads,
    pub projection: DenseGrads,
}

impl Seq2SeqGrads {
    pub fn zeros_like(model: &Seq2Seq) -> Self {
        Self {
            source_embedding: Array2::zeros(model.source_embedding.weight.raw_dim()),
            encoder: LstmGrads::zeros_like(&model.encoder),
            target_embedding: Array2::zeros(model.target_embedding.weight.raw_dim()),
            decoder: LstmGrads::zeros_like(&model.decoder),
            projection: DenseGrads::zeros_like(&model.projection),
        }
    }

    pub fn global_norm(&self) -> f32 {
        let total = sum_sq(self.source_embedding.iter())
            + sum_sq(self.encoder.kernel.iter())
            + sum_sq(self.encoder.recurrent.iter())
            + sum_sq(self.encoder.bias.iter())
            + sum_sq(self.target_embedding.iter())
            + sum_sq(self.decoder.kernel.iter())
            + sum_sq(self.decoder.recurrent.iter())
            + sum_sq(self.decoder.bias.iter())
            + sum_sq(self.projection.weight.iter())
            + sum_sq(self.projection.bias.iter());
        total.sqrt()
    }

    pub fn scale(&mut self, factor: f32) {
        self.source_embedding *= factor;
        self.encoder.kernel *= factor;
        self.encoder.recurrent *= factor;
        self.encoder.bias *= factor;
        self.target_embedding *= factor;
        self.decoder.kernel *= factor;
        self.decoder.recurrent *= factor;
        self.decoder.bias *= factor;
        self.projection.weight *= factor;
        self.projection.bias *= factor;
    }

    /// Rescales so the global norm does not exceed `max_norm`. Returns the norm before clipping.
    pub fn clip_global_norm(&mut self, max_norm: f32) -> f32 {
        let norm = self.global_norm();
        if norm > max_norm && norm > 0.0 {
            self.scale(max_norm / norm);
        }
        norm
    }
}

/// Encoder-decoder network.
///
/// The source sentence is embedded and run through the encoder LSTM; its final
/// `(h, c)` seeds the decoder LSTM, whose outputs are projected to target
/// vocabulary logits.
#[derive(Debug, Clone)]
pub struct Seq2Seq {
    pub source_embedding: Embedding,
    pub encoder: Lstm,
    pub target_embedding: Embedding,
    pub decoder: Lstm,
    pub projection: Dense,
}

impl Seq2Seq {
    pub fn new(config: &ModelConfig, source_vocab: usize, target_vocab: usize, seed: u64) -> Result<Self> {
        if config.embedding_dim == 0 || config.hidden_dim == 0 {
            return Err(TranslatorError::Model("embedding_dim and hidden_dim must be positive".to_string()));
        }
        if source_vocab < 2 || target_vocab < 2 {
            return Err(TranslatorError::Model(format!(
                "Vocabularies need at least one word besides padding (source {}, target {})",
                source_vocab, target_vocab
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let model = Self {
            source_embedding: Embedding::new(&mut rng, source_vocab, config.embedding_dim),
            encoder: Lstm::new(&mut rng, config.embedding_dim, config.hidden_dim),
            target_embedding: Embedding::new(&mut rng, target_vocab, config.embedding_dim),
            decoder: Lstm::new(&mut rng, config.embedding_dim, config.hidden_dim),
            projection: Dense::new(&mut rng, config.hidden_dim, target_vocab),
        };
        log::debug!("Built Seq2Seq with {} parameters", model.parameter_count());
        Ok(model)
    }

    pub fn hidden_dim(&self) -> usize {
        self.encoder.hidden_dim()
    }

    pub fn source_vocab_size(&self) -> usize {
        self.source_embedding.vocab_size()
    }

    pub fn target_vocab_size(&self) -> usize {
        self.target_embedding.vocab_size()
    }

    pub fn parameter_count(&self) -> usize {
        let lstm = |l: &Lstm| l.kernel.len() + l.recurrent.len() + l.bias.len();
        self.source_embedding.weight.len()
            + lstm(&self.encoder)
            + self.target_embedding.weight.len()
            + lstm(&self.decoder)
            + self.projection.weight.len()
            + self.projection.bias.len()
    }

    fn check_tokens<'a>(tokens: impl IntoIterator<Item = &'a usize>, vocab: usize, what: &str) -> Result<()> {
        match tokens.into_iter().find(|&&t| t >= vocab) {
            Some(t) => Err(TranslatorError::Model(format!("{} token {} is outside vocabulary of {}", what, t, vocab))),
            None => Ok(()),
        }
    }

    fn check_batch(
        &self,
        encoder_input: &Array2<usize>,
        decoder_input: &Array2<usize>,
        decoder_target: &Array2<usize>,
    ) -> Result<()> {
        if encoder_input.nrows() == 0 || encoder_input.ncols() == 0 {
            return Err(TranslatorError::Model("Encoder input batch is empty".to_string()));
        }
        if decoder_input.dim() != decoder_target.dim() || decoder_input.nrows() != encoder_input.nrows() {
            return Err(TranslatorError::Model(format!(
                "Batch shapes disagree: encoder {:?}, decoder input {:?}, decoder target {:?}",
                encoder_input.dim(),
                decoder_input.dim(),
                decoder_target.dim()
            )));
        }
        Self::check_tokens(encoder_input.iter(), self.source_vocab_size(), "Source")?;
        Self::check_tokens(decoder_input.iter(), self.target_vocab_size(), "Target")?;
        Self::check_tokens(decoder_target.iter(), self.target_vocab_size(), "Target")
    }

    /// Masked sparse categorical cross-entropy and its gradients for one batch.
    ///
    /// Positions whose target is padding contribute neither loss nor gradient;
    /// the loss is averaged over the remaining positions.
    pub fn forward_backward(
        &self,
        encoder_input: &Array2<usize>,
        decoder_input: &Array2<usize>,
        decoder_target: &Array2<usize>,
    ) -> Result<(f32, Seq2SeqGrads)> {
        self.check_batch(encoder_input, decoder_input, decoder_target)?;
        let batch = encoder_input.nrows();
        let hidden = self.hidden_dim();

        let source_steps: Vec<Array2<f32>> = encoder_input
            .axis_iter(Axis(1))
            .map(|column| self.source_embedding.forward(column))
            .collect();
        let (_, encoder_state, encoder_trace) = self.encoder.forward(&source_steps, &LstmState::zeros(batch, hidden));

        let target_steps: Vec<Array2<f32>> = decoder_input
            .axis_iter(Axis(1))
            .map(|column| self.target_embedding.forward(column))
            .collect();
        let (decoder_outputs, _, decoder_trace) = self.decoder.forward(&target_steps, &encoder_state);

        let active = decoder_target.iter().filter(|&&t| t != PAD_INDEX).count();
        let scale = 1.0 / active.max(1) as f32;

        let mut grads = Seq2SeqGrads::zeros_like(self);
        let mut loss = 0.0f32;
        let mut grad_outputs = Vec::with_capacity(decoder_outputs.len());
        for (t, hidden_out) in decoder_outputs.iter().enumerate() {
            let probs = softmax_rows(&self.projection.forward(hidden_out));
            let mut grad_logits = probs.clone();
            for b in 0..batch {
                let target = decoder_target[[b, t]];
                if target == PAD_INDEX {
                    grad_logits.row_mut(b).fill(0.0);
                    continue;
                }
                loss -= probs[[b, target]].max(1e-12).ln();
                grad_logits[[b, target]] -= 1.0;
            }
            grad_logits *= scale;
            grad_outputs.push(self.projection.backward(hidden_out, &grad_logits, &mut grads.projection));
        }

        let (grad_target_steps, grad_encoder_state) = self.decoder.backward(
            &decoder_trace,
            Some(grad_outputs.as_slice()),
            &LstmState::zeros(batch, hidden),
            &mut grads.decoder,
        )?;
        for (column, grad) in decoder_input.axis_iter(Axis(1)).zip(&grad_target_steps) {
            self.target_embedding.backward(column, grad, &mut grads.target_embedding);
        }

        let (grad_source_steps, _) =
            self.encoder.backward(&encoder_trace, None, &grad_encoder_state, &mut grads.encoder)?;
        for (column, grad) in encoder_input.axis_iter(Axis(1)).zip(&grad_source_steps) {
            self.source_embedding.backward(column, grad, &mut grads.source_embedding);
        }

        Ok((loss * scale, grads))
    }

    /// Loss only; same masking as [`Seq2Seq::forward_backward`].
    pub fn loss(
        &self,
        encoder_input: &Array2<usize>,
        decoder_input: &Array2<usize>,
        decoder_target: &Array2<usize>,
    ) -> Result<f32> {
        self.check_batch(encoder_input, decoder_input, decoder_target)?;
        let state = self.encode_batch(encoder_input);
        let target_steps: Vec<Array2<f32>> = decoder_input
            .axis_iter(Axis(1))
            .map(|column| self.target_embedding.forward(column))
            .collect();
        let (decoder_outputs, _, _) = self.decoder.forward(&target_steps, &state);

        let mut loss = 0.0f32;
        let mut active = 0usize;
        for (t, hidden_out) in decoder_outputs.iter().enumerate() {
            let probs = softmax_rows(&self.projection.forward(hidden_out));
            for (b, &target) in decoder_target.column(t).iter().enumerate() {
                if target != PAD_INDEX {
                    loss -= probs[[b, target]].max(1e-12).ln();
                    active += 1;
                }
            }
        }
        Ok(loss / active.max(1) as f32)
    }

    fn encode_batch(&self, encoder_input: &Array2<usize>) -> LstmState {
        let mut state = LstmState::zeros(encoder_input.nrows(), self.hidden_dim());
        for column in encoder_input.axis_iter(Axis(1)) {
            state = self.encoder.step(&self.source_embedding.forward(column), &state);
        }
        state
    }

    /// Encodes one padded source row into the decoder's initial state.
    pub fn encode(&self, source: &[usize]) -> Result<LstmState> {
        Self::check_tokens(source, self.source_vocab_size(), "Source")?;
        let row = Array2::from_shape_vec((1, source.len()), source.to_vec())?;
        Ok(self.encode_batch(&row))
    }

    /// Feeds one target token and returns the next-token logits with the new state.
    pub fn decode_step(&self, token: usize, state: &LstmState) -> Result<(Array1<f32>, LstmState)> {
        Self::check_tokens(&[token], self.target_vocab_size(), "Target")?;
        let embedded = self.target_embedding.forward(Array1::from_elem(1, token).view());
        let next = self.decoder.step(&embedded, state);
        let logits = self.projection.forward(&next.h).row(0).to_owned();
        Ok((logits, next))
    }
}
