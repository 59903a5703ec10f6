use ndarray::{concatenate, s, Array1, Array2, Axis};
use rand::rngs::StdRng;

use crate::error::Result;
use crate::layers::{glorot_uniform, sigmoid};

/// Hidden and cell state for a batch, each `(batch, hidden)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmState {
    pub h: Array2<f32>,
    pub c: Array2<f32>,
}

impl LstmState {
    pub fn zeros(batch: usize, hidden: usize) -> Self {
        Self { h: Array2::zeros((batch, hidden)), c: Array2::zeros((batch, hidden)) }
    }
}

/// Activations kept from one forward step for backpropagation.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array2<f32>,
    h_prev: Array2<f32>,
    c_prev: Array2<f32>,
    i: Array2<f32>,
    f: Array2<f32>,
    g: Array2<f32>,
    o: Array2<f32>,
    tanh_c: Array2<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct LstmTrace {
    steps: Vec<StepCache>,
}

impl LstmTrace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LstmGrads {
    pub kernel: Array2<f32>,
    pub recurrent: Array2<f32>,
    pub bias: Array1<f32>,
}

impl LstmGrads {
    pub fn zeros_like(lstm: &Lstm) -> Self {
        Self {
            kernel: Array2::zeros(lstm.kernel.raw_dim()),
            recurrent: Array2::zeros(lstm.recurrent.raw_dim()),
            bias: Array1::zeros(lstm.bias.raw_dim()),
        }
    }
}

/// Single-layer LSTM with fused gate weights.
///
/// Gate blocks along the last axis are ordered input, forget, candidate, output:
/// `kernel` is `(input_dim, 4H)`, `recurrent` is `(H, 4H)`, `bias` is `(4H)`.
#[derive(Debug, Clone)]
pub struct Lstm {
    pub kernel: Array2<f32>,
    pub recurrent: Array2<f32>,
    pub bias: Array1<f32>,
    hidden: usize,
}

impl Lstm {
    pub fn new(rng: &mut StdRng, input_dim: usize, hidden: usize) -> Self {
        let mut bias = Array1::zeros(4 * hidden);
        // unit forget bias
        bias.slice_mut(s![hidden..2 * hidden]).fill(1.0);
        Self {
            kernel: glorot_uniform(rng, input_dim, 4 * hidden),
            recurrent: glorot_uniform(rng, hidden, 4 * hidden),
            bias,
            hidden,
        }
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden
    }

    pub fn input_dim(&self) -> usize {
        self.kernel.nrows()
    }

    /// Advances one time step, discarding the activations.
    pub fn step(&self, x: &Array2<f32>, state: &LstmState) -> LstmState {
        self.step_cached(x, state).0
    }

    fn step_cached(&self, x: &Array2<f32>, state: &LstmState) -> (LstmState, StepCache) {
        let h = self.hidden;
        let z = x.dot(&self.kernel) + state.h.dot(&self.recurrent) + &self.bias;

        let i = z.slice(s![.., 0..h]).mapv(sigmoid);
        let f = z.slice(s![.., h..2 * h]).mapv(sigmoid);
        let g = z.slice(s![.., 2 * h..3 * h]).mapv(f32::tanh);
        let o = z.slice(s![.., 3 * h..4 * h]).mapv(sigmoid);

        let c = &f * &state.c + &i * &g;
        let tanh_c = c.mapv(f32::tanh);
        let h_new = &o * &tanh_c;

        let cache = StepCache {
            x: x.clone(),
            h_prev: state.h.clone(),
            c_prev: state.c.clone(),
            i,
            f,
            g,
            o,
            tanh_c,
        };
        (LstmState { h: h_new, c }, cache)
    }

    /// Runs the whole sequence. Returns the hidden output of every step, the
    /// final state and the trace needed by [`Lstm::backward`].
    pub fn forward(&self, inputs: &[Array2<f32>], initial: &LstmState) -> (Vec<Array2<f32>>, LstmState, LstmTrace) {
        let mut state = initial.clone();
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut trace = LstmTrace { steps: Vec::with_capacity(inputs.len()) };

        for x in inputs {
            let (next, cache) = self.step_cached(x, &state);
            outputs.push(next.h.clone());
            trace.steps.push(cache);
            state = next;
        }
        (outputs, state, trace)
    }

    /// Backpropagation through time.
    ///
    /// `grad_outputs` holds the loss gradient for each step's hidden output
    /// (`None` when only the final state feeds the loss). `grad_final` is the
    /// gradient w.r.t. the final state. Parameter gradients are accumulated into
    /// `grads`; the gradients w.r.t. the inputs and the initial state are returned.
    pub fn backward(
        &self,
        trace: &LstmTrace,
        grad_outputs: Option<&[Array2<f32>]>,
        grad_final: &LstmState,
        grads: &mut LstmGrads,
    ) -> Result<(Vec<Array2<f32>>, LstmState)> {
        let mut dh = grad_final.h.clone();
        let mut dc = grad_final.c.clone();
        let mut grad_inputs = vec![Array2::zeros((0, 0)); trace.steps.len()];

        for (t, step) in trace.steps.iter().enumerate().rev() {
            if let Some(outputs) = grad_outputs {
                dh += &outputs[t];
            }
            let dc_total = &dc + &(&dh * &step.o * step.tanh_c.mapv(|v| 1.0 - v * v));

            let dz_i = &dc_total * &step.g * step.i.mapv(|v| v * (1.0 - v));
            let dz_f = &dc_total * &step.c_prev * step.f.mapv(|v| v * (1.0 - v));
            let dz_g = &dc_total * &step.i * step.g.mapv(|v| 1.0 - v * v);
            let dz_o = &dh * &step.tanh_c * step.o.mapv(|v| v * (1.0 - v));
            let dz = concatenate(Axis(1), &[dz_i.view(), dz_f.view(), dz_g.view(), dz_o.view()])?;

            grads.kernel += &step.x.t().dot(&dz);
            grads.recurrent += &step.h_prev.t().dot(&dz);
            grads.bias += &dz.sum_axis(Axis(0));

            grad_inputs[t] = dz.dot(&self.kernel.t());
            dh = dz.dot(&self.recurrent.t());
            dc = &dc_total * &step.f;
        }
        Ok((grad_inputs, LstmState { h: dh, c: dc }))
    }
}
