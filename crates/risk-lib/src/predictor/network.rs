//! Feed-forward scoring network
//!
//! A small dense network trained with binary cross-entropy and Adam.
//! Hidden layers may carry an L2 weight penalty and inverted dropout;
//! dropout is only active while fitting.

use crate::error::ModelError;
use crate::models::FEATURE_COUNT;
use ndarray::{s, Array, Array1, Array2, ArrayView1, Axis, Dimension, Zip};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Probability clamp used by the loss
const LOSS_EPSILON: f64 = 1e-7;

/// Decision threshold for accuracy
const POSITIVE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(&self, z: f64) -> f64 {
        match self {
            // NaN propagates
            Activation::Relu => {
                if z < 0.0 {
                    0.0
                } else {
                    z
                }
            }
            Activation::Sigmoid => sigmoid(z),
        }
    }

    fn derivative(&self, z: f64) -> f64 {
        match self {
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => {
                let s = sigmoid(z);
                s * (1.0 - s)
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Shape and regularization of one dense layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec {
    pub units: usize,
    pub activation: Activation,
    pub l2: f64,
    pub dropout: f64,
}

impl LayerSpec {
    pub const fn hidden(units: usize, l2: f64, dropout: f64) -> Self {
        Self {
            units,
            activation: Activation::Relu,
            l2,
            dropout,
        }
    }

    pub const fn output() -> Self {
        Self {
            units: 1,
            activation: Activation::Sigmoid,
            l2: 0.0,
            dropout: 0.0,
        }
    }
}

/// 5 → 64 → 32 → 16 → 1
pub const DEFAULT_ARCHITECTURE: [LayerSpec; 4] = [
    LayerSpec::hidden(64, 0.01, 0.4),
    LayerSpec::hidden(32, 0.01, 0.3),
    LayerSpec::hidden(16, 0.0, 0.0),
    LayerSpec::output(),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// `inputs x units`
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
    #[serde(default)]
    pub l2: f64,
    #[serde(default)]
    pub dropout: f64,
}

impl DenseLayer {
    /// He-uniform weights, zero bias
    fn init(inputs: usize, spec: &LayerSpec, rng: &mut StdRng) -> Self {
        let limit = (6.0 / inputs.max(1) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, spec.units), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(spec.units),
            activation: spec.activation,
            l2: spec.l2,
            dropout: spec.dropout,
        }
    }

    fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    fn units(&self) -> usize {
        self.weights.ncols()
    }

    fn pre_activation(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }

    fn penalty(&self) -> f64 {
        if self.l2 == 0.0 {
            0.0
        } else {
            self.l2 * self.weights.iter().map(|w| w * w).sum::<f64>()
        }
    }
}

/// Fitting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Fraction of rows, taken from the tail, held out for validation
    pub validation_split: f64,
    pub learning_rate: f64,
    pub seed: Option<u64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Outcome of [`RiskNetwork::fit`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub train_samples: usize,
    pub validation_samples: usize,
    pub history: Vec<EpochMetrics>,
    /// Mean of last-epoch train and validation accuracy
    pub accuracy: f64,
}

impl FitReport {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.history.last()
    }
}

struct LayerCache {
    input: Array2<f64>,
    pre_activation: Array2<f64>,
    mask: Option<Array2<f64>>,
}

struct Moments {
    weights: (Array2<f64>, Array2<f64>),
    bias: (Array1<f64>, Array1<f64>),
}

/// Adam with the bias-corrected step size folded into the learning rate
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    fn new(learning_rate: f64, layers: &[DenseLayer]) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            moments: layers
                .iter()
                .map(|l| Moments {
                    weights: (Array2::zeros(l.weights.dim()), Array2::zeros(l.weights.dim())),
                    bias: (Array1::zeros(l.bias.len()), Array1::zeros(l.bias.len())),
                })
                .collect(),
        }
    }

    fn update(&mut self, layers: &mut [DenseLayer], grads: &[(Array2<f64>, Array1<f64>)]) {
        self.step += 1;
        let lr = self.learning_rate * (1.0 - self.beta2.powi(self.step)).sqrt()
            / (1.0 - self.beta1.powi(self.step));

        for ((layer, (gw, gb)), moments) in layers.iter_mut().zip(grads).zip(&mut self.moments) {
            let (mw, vw) = &mut moments.weights;
            adam_step(&mut layer.weights, gw, mw, vw, lr, self.beta1, self.beta2, self.epsilon);
            let (mb, vb) = &mut moments.bias;
            adam_step(&mut layer.bias, gb, mb, vb, lr, self.beta1, self.beta2, self.epsilon);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn adam_step<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            *p -= lr * *m / (v.sqrt() + epsilon);
        });
}

/// Dense binary classifier over the risk feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskNetwork {
    layers: Vec<DenseLayer>,
}

impl RiskNetwork {
    /// Network with [`DEFAULT_ARCHITECTURE`]
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_architecture(FEATURE_COUNT, &DEFAULT_ARCHITECTURE, seed)
    }

    pub fn with_architecture(inputs: usize, specs: &[LayerSpec], seed: Option<u64>) -> Self {
        let mut rng = rng_from(seed);
        let mut fan_in = inputs;
        let layers = specs
            .iter()
            .map(|spec| {
                let layer = DenseLayer::init(fan_in, spec, &mut rng);
                fan_in = spec.units;
                layer
            })
            .collect();
        Self { layers }
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::inputs).unwrap_or(0)
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }

    /// Inference pass over `n x inputs` rows; returns `n` probabilities
    pub fn forward(&self, input: &Array2<f64>) -> Array1<f64> {
        let mut activations = input.to_owned();
        for layer in &self.layers {
            let mut z = layer.pre_activation(&activations);
            z.mapv_inplace(|v| layer.activation.apply(v));
            activations = z;
        }
        activations.column(0).to_owned()
    }

    /// Probability for a single normalized feature vector
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let input = ArrayView1::from(&features[..])
            .insert_axis(Axis(0))
            .to_owned();
        self.forward(&input)[0]
    }

    /// Train on `x` (rows of normalized features) against 0/1 labels `y`
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        options: &FitOptions,
    ) -> Result<FitReport, ModelError> {
        let n = x.nrows();
        if n == 0 {
            return Err(ModelError::EmptyDataset);
        }
        if x.ncols() != self.input_dim() || y.len() != n {
            return Err(ModelError::Shape(format!(
                "expected {} x {} inputs with {} labels, got {:?} with {}",
                n,
                self.input_dim(),
                n,
                x.dim(),
                y.len()
            )));
        }

        let split = options.validation_split.clamp(0.0, 1.0);
        let mut split_at = (n as f64 * (1.0 - split)) as usize;
        if split_at == 0 {
            split_at = n;
        }
        let x_train = x.slice(s![..split_at, ..]).to_owned();
        let y_train = y.slice(s![..split_at]).to_owned();
        let x_val = x.slice(s![split_at.., ..]).to_owned();
        let y_val = y.slice(s![split_at..]).to_owned();

        let mut rng = rng_from(options.seed.map(|s| s.wrapping_add(1)));
        let mut optimizer = Adam::new(options.learning_rate, &self.layers);
        let mut indices: Vec<usize> = (0..split_at).collect();
        let batch_size = options.batch_size.max(1);
        let mut history = Vec::with_capacity(options.epochs);

        for epoch in 1..=options.epochs {
            indices.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            let mut correct = 0usize;
            for batch in indices.chunks(batch_size) {
                let xb = x_train.select(Axis(0), batch);
                let yb = y_train.select(Axis(0), batch);

                let (output, caches) = self.forward_train(&xb, &mut rng);
                loss_sum += self.loss(&output, &yb) * batch.len() as f64;
                correct += count_correct(&output, &yb);

                let grads = self.backward(&output, &yb, &caches);
                optimizer.update(&mut self.layers, &grads);
            }

            let loss = loss_sum / split_at as f64;
            if !loss.is_finite() {
                return Err(ModelError::Diverged { epoch });
            }

            let (val_loss, val_accuracy) = if x_val.nrows() > 0 {
                let output = self.forward(&x_val);
                (
                    Some(self.loss(&output, &y_val)),
                    Some(count_correct(&output, &y_val) as f64 / y_val.len() as f64),
                )
            } else {
                (None, None)
            };

            let metrics = EpochMetrics {
                epoch,
                loss,
                accuracy: correct as f64 / split_at as f64,
                val_loss,
                val_accuracy,
            };
            if epoch % 10 == 0 {
                debug!(
                    epoch,
                    loss = metrics.loss,
                    accuracy = metrics.accuracy,
                    val_accuracy = ?metrics.val_accuracy,
                    "Training progress"
                );
            }
            history.push(metrics);
        }

        let accuracy = history
            .last()
            .map(|m| (m.accuracy + m.val_accuracy.unwrap_or(m.accuracy)) / 2.0)
            .unwrap_or(0.0);

        Ok(FitReport {
            train_samples: split_at,
            validation_samples: n - split_at,
            history,
            accuracy,
        })
    }

    fn forward_train(&self, input: &Array2<f64>, rng: &mut StdRng) -> (Array1<f64>, Vec<LayerCache>) {
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut activations = input.to_owned();

        for layer in &self.layers {
            let z = layer.pre_activation(&activations);
            let mut a = z.mapv(|v| layer.activation.apply(v));

            let mask = if layer.dropout > 0.0 {
                let keep = 1.0 - layer.dropout;
                let mask = Array2::from_shape_fn(a.dim(), |_| {
                    if rng.gen::<f64>() < layer.dropout {
                        0.0
                    } else {
                        1.0 / keep
                    }
                });
                a *= &mask;
                Some(mask)
            } else {
                None
            };

            caches.push(LayerCache {
                input: activations,
                pre_activation: z,
                mask,
            });
            activations = a;
        }

        (activations.column(0).to_owned(), caches)
    }

    /// Gradients per layer; assumes a sigmoid output with cross-entropy loss
    fn backward(
        &self,
        output: &Array1<f64>,
        labels: &Array1<f64>,
        caches: &[LayerCache],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let m = output.len() as f64;
        let mut delta = ((output - labels) / m).insert_axis(Axis(1));
        let mut grads = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate().rev() {
            let cache = &caches[index];
            let mut grad_w = cache.input.t().dot(&delta);
            if layer.l2 > 0.0 {
                grad_w.scaled_add(2.0 * layer.l2, &layer.weights);
            }
            let grad_b = delta.sum_axis(Axis(0));

            if index > 0 {
                let previous = &self.layers[index - 1];
                let previous_cache = &caches[index - 1];
                let mut upstream = delta.dot(&layer.weights.t());
                if let Some(mask) = &previous_cache.mask {
                    upstream *= mask;
                }
                upstream.zip_mut_with(&previous_cache.pre_activation, |g, &z| {
                    *g *= previous.activation.derivative(z)
                });
                delta = upstream;
            }

            grads.push((grad_w, grad_b));
        }

        grads.reverse();
        grads
    }

    fn loss(&self, output: &Array1<f64>, labels: &Array1<f64>) -> f64 {
        let cross_entropy = Zip::from(output)
            .and(labels)
            .fold(0.0, |acc, &p, &y| {
                let p = p.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON);
                acc - (y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            / output.len().max(1) as f64;
        cross_entropy + self.layers.iter().map(DenseLayer::penalty).sum::<f64>()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize and check that layer shapes chain from the feature
    /// vector to a single output
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let network: Self = serde_json::from_slice(bytes)?;
        network.validate()?;
        Ok(network)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::Shape("network has no layers".to_string()));
        }
        if self.input_dim() != FEATURE_COUNT {
            return Err(ModelError::Shape(format!(
                "first layer takes {} inputs, expected {}",
                self.input_dim(),
                FEATURE_COUNT
            )));
        }
        let mut fan_in = FEATURE_COUNT;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.inputs() != fan_in || layer.bias.len() != layer.units() {
                return Err(ModelError::Shape(format!(
                    "layer {} is {}x{} with {} biases, expected {} inputs",
                    i,
                    layer.inputs(),
                    layer.units(),
                    layer.bias.len(),
                    fan_in
                )));
            }
            fan_in = layer.units();
        }
        if fan_in != 1 {
            return Err(ModelError::Shape(format!(
                "network has {} outputs, expected 1",
                fan_in
            )));
        }
        Ok(())
    }
}

fn count_correct(output: &Array1<f64>, labels: &Array1<f64>) -> usize {
    output
        .iter()
        .zip(labels)
        .filter(|(p, y)| (**p >= POSITIVE_THRESHOLD) == (**y >= POSITIVE_THRESHOLD))
        .count()
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
