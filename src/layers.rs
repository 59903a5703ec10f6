use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::Rng;

pub(crate) fn sigmoid(x: f32) -> f32 {
    let x = x.clamp(-50.0, 50.0);
    1.0 / (1.0 + (-x).exp())
}

/// Glorot/Xavier uniform initialisation for a `(fan_in, fan_out)` matrix.
pub(crate) fn glorot_uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Array2<f32> {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    Array2::from_shape_simple_fn((fan_in, fan_out), || rng.gen_range(-limit..limit))
}

/// Row-wise softmax, stable against large logits.
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Token embedding table. Row `i` is the vector for vocabulary index `i`.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub weight: Array2<f32>,
}

impl Embedding {
    pub fn new(rng: &mut StdRng, vocab_size: usize, dim: usize) -> Self {
        let weight = Array2::from_shape_simple_fn((vocab_size, dim), || rng.gen_range(-0.05..0.05));
        Self { weight }
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.nrows()
    }

    pub fn dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Gathers one row per token: `(len(tokens), dim)`.
    ///
    /// Callers must keep every token below `vocab_size()`.
    pub fn forward(&self, tokens: ArrayView1<usize>) -> Array2<f32> {
        let indices = tokens.to_vec();
        self.weight.select(Axis(0), &indices)
    }

    /// Scatter-adds `grad_out` rows back onto the rows that were gathered.
    pub fn backward(&self, tokens: ArrayView1<usize>, grad_out: &Array2<f32>, grad_weight: &mut Array2<f32>) {
        for (&token, grad_row) in tokens.iter().zip(grad_out.axis_iter(Axis(0))) {
            let mut row = grad_weight.row_mut(token);
            row += &grad_row;
        }
    }
}

/// Affine projection `x · W + b` producing vocabulary logits.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl DenseGrads {
    pub fn zeros_like(dense: &Dense) -> Self {
        Self { weight: Array2::zeros(dense.weight.raw_dim()), bias: Array1::zeros(dense.bias.raw_dim()) }
    }
}

impl Dense {
    pub fn new(rng: &mut StdRng, input_dim: usize, output_dim: usize) -> Self {
        Self { weight: glorot_uniform(rng, input_dim, output_dim), bias: Array1::zeros(output_dim) }
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weight) + &self.bias
    }

    /// Accumulates parameter gradients and returns the gradient w.r.t. `x`.
    pub fn backward(&self, x: &Array2<f32>, grad_out: &Array2<f32>, grads: &mut DenseGrads) -> Array2<f32> {
        grads.weight += &x.t().dot(grad_out);
        grads.bias += &grad_out.sum_axis(Axis(0));
        grad_out.dot(&self.weight.t())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let probs = softmax_rows(&array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 0.0]]);
        for row in probs.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(probs[[1, 0]], 0.5, epsilon = 1e-6);
        assert!(probs[[0, 2]] > probs[[0, 1]]);
    }

    #[test]
    fn test_embedding_lookup_and_scatter() {
        let mut rng = StdRng::seed_from_u64(7);
        let embedding = Embedding::new(&mut rng, 5, 3);
        let tokens = array![4usize, 0, 4];

        let out = embedding.forward(tokens.view());
        assert_eq!(out.dim(), (3, 3));
        assert_eq!(out.row(0), embedding.weight.row(4));
        assert_eq!(out.row(1), embedding.weight.row(0));

        let mut grad = Array2::zeros((5, 3));
        embedding.backward(tokens.view(), &Array2::ones((3, 3)), &mut grad);
        assert_eq!(grad.row(4).to_vec(), vec![2.0, 2.0, 2.0]);
        assert_eq!(grad.row(0).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(grad.row(1).sum(), 0.0);
    }

    #[test]
    fn test_embedding_init_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let embedding = Embedding::new(&mut rng, 10, 8);
        assert!(embedding.weight.iter().all(|v| v.abs() <= 0.05));
    }

    #[test]
    fn test_dense_backward_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let dense = Dense::new(&mut rng, 4, 6);
        let x = Array2::ones((2, 4));
        assert_eq!(dense.forward(&x).dim(), (2, 6));

        let mut grads = DenseGrads::zeros_like(&dense);
        let dx = dense.backward(&x, &Array2::ones((2, 6)), &mut grads);
        assert_eq!(dx.dim(), (2, 4));
        assert_abs_diff_eq!(grads.bias[0], 2.0);
        assert_abs_diff_eq!(grads.weight[[0, 0]], 2.0);
    }
}
