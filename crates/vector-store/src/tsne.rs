use crate::error::{Result, VectorStoreError};
use log::debug;
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MACHINE_EPSILON: f64 = f64::EPSILON;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 100;
const MIN_GRAD_NORM: f64 = 1e-7;

#[derive(Debug, Clone, Copy)]
pub struct TsneConfig {
    /// Upper bound for perplexity; the effective value is `min(max, N - 1)`.
    pub max_perplexity: f64,
    pub seed: u64,
    pub early_exaggeration: f64,
    pub max_iter: usize,
    /// Iterations run with early exaggeration and low momentum.
    pub exploration_iter: usize,
    pub min_gain: f64,
    pub init_std: f64,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            max_perplexity: 30.0,
            seed: 42,
            early_exaggeration: 12.0,
            max_iter: 1_000,
            exploration_iter: 250,
            min_gain: 0.01,
            init_std: 1e-4,
        }
    }
}

/// Exact t-SNE projection to two dimensions.
///
/// Cost is quadratic in the number of rows per iteration and the whole
/// corpus is re-projected on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsneEmbedder {
    config: TsneConfig,
}

impl TsneEmbedder {
    #[must_use]
    pub const fn new(config: TsneConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &TsneConfig {
        &self.config
    }

    /// Perplexity used for `n_samples` rows; always below the sample count.
    #[must_use]
    pub fn perplexity_for(&self, n_samples: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let cap = n_samples.saturating_sub(1) as f64;
        self.config.max_perplexity.min(cap)
    }

    /// Projects every row of `vectors` to `(x, y)`, preserving row order.
    ///
    /// A single row is placed at the origin without running the optimizer.
    pub fn embed(&self, vectors: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let n = vectors.nrows();
        if n <= 1 {
            return Ok(Array2::zeros((n, 2)));
        }

        let perplexity = self.perplexity_for(n);
        debug!("t-SNE over {n} samples (perplexity {perplexity})");

        let distances = squared_distances(vectors);
        let conditional = conditional_affinities(&distances, perplexity);
        let joint = joint_probabilities(&conditional);

        let mut optimizer = Optimizer::new(n, &self.config);
        #[allow(clippy::cast_precision_loss)]
        let learning_rate = (n as f64 / self.config.early_exaggeration / 4.0).max(50.0);
        let exploration = self.config.exploration_iter.min(self.config.max_iter);
        optimizer.run(
            &joint,
            exploration,
            0.5,
            self.config.early_exaggeration,
            learning_rate,
        );
        optimizer.run(
            &joint,
            self.config.max_iter - exploration,
            0.8,
            1.0,
            learning_rate,
        );

        let embedding = optimizer.into_embedding();
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(VectorStoreError::EmbeddingError(
                "t-SNE produced non-finite coordinates".to_string(),
            ));
        }
        Ok(embedding)
    }
}

fn squared_distances(vectors: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = vectors.nrows();
    let mut out = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d: f64 = vectors
                .row(i)
                .iter()
                .zip(vectors.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            out[[i, j]] = d;
            out[[j, i]] = d;
        }
    }
    out
}

/// Row-stochastic Gaussian affinities whose entropy matches `ln(perplexity)`.
fn conditional_affinities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let desired_entropy = perplexity.ln();
    let mut out = Array2::zeros((n, n));

    for i in 0..n {
        let mut beta = 1.0f64;
        let mut beta_min = f64::NEG_INFINITY;
        let mut beta_max = f64::INFINITY;
        let mut row = vec![0.0f64; n];

        for _ in 0..PERPLEXITY_STEPS {
            let mut sum_p = 0.0;
            for j in 0..n {
                row[j] = if j == i {
                    0.0
                } else {
                    (-distances[[i, j]] * beta).exp()
                };
                sum_p += row[j];
            }
            if sum_p == 0.0 {
                sum_p = 1e-8;
            }
            let mut weighted = 0.0;
            for j in 0..n {
                row[j] /= sum_p;
                weighted += distances[[i, j]] * row[j];
            }
            let entropy = sum_p.ln() + beta * weighted;
            let diff = entropy - desired_entropy;
            if diff.abs() <= PERPLEXITY_TOLERANCE {
                break;
            }
            if diff > 0.0 {
                beta_min = beta;
                beta = if beta_max.is_infinite() {
                    beta * 2.0
                } else {
                    (beta + beta_max) / 2.0
                };
            } else {
                beta_max = beta;
                beta = if beta_min.is_infinite() {
                    beta / 2.0
                } else {
                    (beta + beta_min) / 2.0
                };
            }
        }

        for j in 0..n {
            out[[i, j]] = row[j];
        }
    }
    out
}

fn joint_probabilities(conditional: &Array2<f64>) -> Array2<f64> {
    let n = conditional.nrows();
    let mut joint = conditional + &conditional.t();
    let total = joint.sum().max(MACHINE_EPSILON);
    joint.mapv_inplace(|p| (p / total).max(MACHINE_EPSILON));
    for i in 0..n {
        joint[[i, i]] = 0.0;
    }
    joint
}

struct Optimizer {
    embedding: Array2<f64>,
    update: Array2<f64>,
    gains: Array2<f64>,
    min_gain: f64,
}

impl Optimizer {
    fn new(n: usize, config: &TsneConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let embedding =
            Array2::from_shape_fn((n, 2), |_| standard_normal(&mut rng) * config.init_std);
        Self {
            embedding,
            update: Array2::zeros((n, 2)),
            gains: Array2::ones((n, 2)),
            min_gain: config.min_gain,
        }
    }

    fn run(
        &mut self,
        joint: &Array2<f64>,
        iterations: usize,
        momentum: f64,
        exaggeration: f64,
        learning_rate: f64,
    ) {
        for _ in 0..iterations {
            let grad = self.gradient(joint, exaggeration);
            let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            if grad_norm < MIN_GRAD_NORM {
                break;
            }
            for ((gain, update), g) in self
                .gains
                .iter_mut()
                .zip(self.update.iter_mut())
                .zip(grad.iter())
            {
                if *update * g < 0.0 {
                    *gain += 0.2;
                } else {
                    *gain *= 0.8;
                }
                *gain = gain.max(self.min_gain);
                *update = momentum * *update - learning_rate * *gain * g;
            }
            self.embedding += &self.update;
        }
    }

    /// Gradient of KL(P || Q) with a Student-t kernel of one degree of freedom.
    fn gradient(&self, joint: &Array2<f64>, exaggeration: f64) -> Array2<f64> {
        let n = self.embedding.nrows();
        let mut kernel = Array2::<f64>::zeros((n, n));
        let mut kernel_sum = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = self.embedding[[i, 0]] - self.embedding[[j, 0]];
                let dy = self.embedding[[i, 1]] - self.embedding[[j, 1]];
                let k = 1.0 / (1.0 + dx * dx + dy * dy);
                kernel[[i, j]] = k;
                kernel[[j, i]] = k;
                kernel_sum += 2.0 * k;
            }
        }
        let kernel_sum = kernel_sum.max(MACHINE_EPSILON);

        let mut grad = Array2::<f64>::zeros((n, 2));
        for i in 0..n {
            let (mut gx, mut gy) = (0.0, 0.0);
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (kernel[[i, j]] / kernel_sum).max(MACHINE_EPSILON);
                let force = (exaggeration * joint[[i, j]] - q) * kernel[[i, j]];
                gx += force * (self.embedding[[i, 0]] - self.embedding[[j, 0]]);
                gy += force * (self.embedding[[i, 1]] - self.embedding[[j, 1]]);
            }
            grad[[i, 0]] = 4.0 * gx;
            grad[[i, 1]] = 4.0 * gy;
        }
        grad
    }

    fn into_embedding(self) -> Array2<f64> {
        self.embedding
    }
}

fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn distance(points: &Array2<f64>, a: usize, b: usize) -> f64 {
        let dx = points[[a, 0]] - points[[b, 0]];
        let dy = points[[a, 1]] - points[[b, 1]];
        dx.hypot(dy)
    }

    #[test]
    fn perplexity_is_capped_below_sample_count() {
        let embedder = TsneEmbedder::default();
        assert_eq!(embedder.perplexity_for(2), 1.0);
        assert_eq!(embedder.perplexity_for(10), 9.0);
        assert_eq!(embedder.perplexity_for(31), 30.0);
        assert_eq!(embedder.perplexity_for(500), 30.0);
    }

    #[test]
    fn single_sample_is_placed_at_origin() {
        let out = TsneEmbedder::default().embed(array![[0.3, 0.7]].view()).unwrap();
        assert_eq!(out, array![[0.0, 0.0]]);
    }

    #[test]
    fn no_samples_yield_empty_embedding() {
        let vectors = Array2::<f64>::zeros((0, 4));
        let out = TsneEmbedder::default().embed(vectors.view()).unwrap();
        assert_eq!(out.dim(), (0, 2));
    }

    #[test]
    fn identical_pair_does_not_fail() {
        let vectors = array![[0.6, 0.8], [0.6, 0.8]];
        let out = TsneEmbedder::default().embed(vectors.view()).unwrap();
        assert_eq!(out.dim(), (2, 2));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_width_vectors_still_embed() {
        let vectors = Array2::<f64>::zeros((3, 0));
        let out = TsneEmbedder::default().embed(vectors.view()).unwrap();
        assert_eq!(out.dim(), (3, 2));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn same_seed_same_layout() {
        let vectors = array![
            [1.0, 0.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0]
        ];
        let embedder = TsneEmbedder::default();
        let a = embedder.embed(vectors.view()).unwrap();
        let b = embedder.embed(vectors.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn conditional_rows_hit_target_perplexity() {
        let vectors = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.3],
            [1.0, 1.0],
            [0.5, 0.2]
        ];
        let distances = squared_distances(vectors.view());
        let p = conditional_affinities(&distances, 3.0);
        for i in 0..5 {
            let row = p.row(i);
            assert_eq!(row[i], 0.0);
            assert!((row.sum() - 1.0).abs() < 1e-9);
            let entropy: f64 = row.iter().filter(|&&v| v > 0.0).map(|&v| -v * v.ln()).sum();
            assert!((entropy.exp() - 3.0).abs() < 1e-3, "row {i}: {entropy}");
        }
    }

    #[test]
    fn separated_clusters_stay_separated() {
        let mut vectors = Array2::<f64>::zeros((10, 3));
        for k in 0..5 {
            #[allow(clippy::cast_precision_loss)]
            let offset = 0.05 * k as f64;
            vectors[[k, 0]] = 1.0;
            vectors[[k, 2]] = offset;
            vectors[[k + 5, 1]] = 1.0;
            vectors[[k + 5, 2]] = offset;
        }
        let config = TsneConfig {
            max_perplexity: 3.0,
            ..TsneConfig::default()
        };
        let out = TsneEmbedder::new(config).embed(vectors.view()).unwrap();

        let (mut intra, mut inter) = (Vec::new(), Vec::new());
        for a in 0..10 {
            for b in (a + 1)..10 {
                if (a < 5) == (b < 5) {
                    intra.push(distance(&out, a, b));
                } else {
                    inter.push(distance(&out, a, b));
                }
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        assert!(
            mean(&intra) < mean(&inter),
            "intra {} vs inter {}",
            mean(&intra),
            mean(&inter)
        );
    }
}
