use ndarray::{Array, Dimension, Zip};

/// Adam optimiser state for one parameter tensor.
///
/// `m` and `v` are the first and second moment estimates; `timestep` counts
/// the updates applied so far and drives the bias correction.
#[derive(Debug, Clone)]
pub struct Adam<D: Dimension> {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    timestep: i32,
    pub m: Array<f32, D>,
    pub v: Array<f32, D>,
}

impl<D: Dimension> Adam<D> {
    pub fn new(shape: D) -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            timestep: 0,
            m: Array::zeros(shape.clone()),
            v: Array::zeros(shape),
        }
    }

    pub fn timestep(&self) -> i32 {
        self.timestep
    }

    /// Applies one update: `θ ← θ − lr · m̂ / (√v̂ + ε)`.
    pub fn step(&mut self, params: &mut Array<f32, D>, grads: &Array<f32, D>, lr: f32) {
        self.timestep += 1;

        let (beta1, beta2) = (self.beta1, self.beta2);
        Zip::from(&mut self.m).and(grads).for_each(|m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        Zip::from(&mut self.v).and(grads).for_each(|v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let m_correction = 1.0 - self.beta1.powi(self.timestep);
        let v_correction = 1.0 - self.beta2.powi(self.timestep);
        let epsilon = self.epsilon;

        Zip::from(params).and(&self.m).and(&self.v).for_each(|p, &m, &v| {
            let m_hat = m / m_correction;
            let v_hat = v / v_correction;
            *p -= lr * m_hat / (v_hat.sqrt() + epsilon);
        });
    }
}
