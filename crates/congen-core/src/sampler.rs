use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::energy::EnergyModel;
use crate::error::OracleError;
use crate::oracle::{SampleSet, SamplingOracle, TunedResult};

/// Classical variational sampler over product distributions.
///
/// Each variable carries one rotation angle `θ_i`; bit `i` is 1 with
/// probability `sin²(θ_i/2)`, so the expected spin is `cos θ_i`. Tuning runs
/// gradient descent on the exact expected energy of the model.
pub struct ProductStateSampler {
    rng: StdRng,
    /// Step size relative to the model's gradient scale
    learning_rate: f64,
    /// Maximum gradient steps per tuning call
    max_iterations: usize,
    /// Convergence threshold on the scaled gradient norm
    tolerance: f64,
    /// Floor/ceiling applied to every bit probability when sampling
    exploration: f64,
}

impl ProductStateSampler {
    pub fn new(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            learning_rate: 0.5,
            max_iterations: 500,
            tolerance: 1e-6,
            exploration: 0.05,
        }
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_exploration(mut self, exploration: f64) -> Self {
        self.exploration = exploration.clamp(0.0, 0.5);
        self
    }
}

/// Expected energy of `model` when spin `i` has mean `means[i]` independently
pub fn expected_energy(model: &EnergyModel, means: &[f64]) -> f64 {
    let mut quadratic = 0.0;
    for (i, row) in model.coupling.iter().enumerate() {
        for (j, &jij) in row.iter().enumerate() {
            // σ_i² = 1 on the diagonal
            quadratic += if i == j { jij } else { jij * means[i] * means[j] };
        }
    }
    let linear: f64 = model.field.iter().zip(means).map(|(h, m)| h * m).sum();
    -quadratic - model.mu * linear + model.constant
}

/// Gradient of the expected energy with respect to the spin means
fn mean_gradient(model: &EnergyModel, means: &[f64]) -> Vec<f64> {
    let n = means.len();
    (0..n)
        .map(|k| {
            let mut coupled = 0.0;
            for j in 0..n {
                if j != k {
                    coupled += (model.coupling[k][j] + model.coupling[j][k]) * means[j];
                }
            }
            -coupled - model.mu * model.field[k]
        })
        .collect()
}

/// Upper bound on the gradient magnitude, used to normalize the step size
fn gradient_scale(model: &EnergyModel) -> f64 {
    let widest = model
        .coupling
        .iter()
        .zip(&model.field)
        .map(|(row, h)| 2.0 * row.iter().map(|v| v.abs()).sum::<f64>() + (model.mu * h).abs())
        .fold(0.0, f64::max);
    1.0 + widest
}

impl SamplingOracle for ProductStateSampler {
    fn param_count(&self, num_spins: usize) -> usize {
        num_spins
    }

    fn tune(
        &mut self,
        model: &EnergyModel,
        _sample_size: usize,
        initial_params: &[f64],
    ) -> Result<TunedResult, OracleError> {
        let n = model.num_spins();
        if initial_params.len() != n {
            return Err(OracleError::Tuning(format!(
                "expected {} parameters, got {}",
                n,
                initial_params.len()
            )));
        }

        let scale = gradient_scale(model);
        let step = self.learning_rate / scale;
        let mut theta = initial_params.to_vec();
        let mut success = false;

        for iteration in 0..self.max_iterations {
            let means: Vec<f64> = theta.iter().map(|t| t.cos()).collect();
            let grad_means = mean_gradient(model, &means);

            let mut largest = 0.0_f64;
            for (k, g) in grad_means.iter().enumerate() {
                // d cos θ / dθ = −sin θ
                let g_theta = -g * theta[k].sin();
                largest = largest.max(g_theta.abs());
                theta[k] -= step * g_theta;
            }

            if !largest.is_finite() {
                return Err(OracleError::Tuning("gradient diverged".to_string()));
            }
            if largest / scale < self.tolerance {
                debug!(iteration, "product-state tuning converged");
                success = true;
                break;
            }
        }

        let means: Vec<f64> = theta.iter().map(|t| t.cos()).collect();
        Ok(TunedResult {
            success,
            objective: expected_energy(model, &means),
            params: theta,
        })
    }

    fn sample(&mut self, tuned: &TunedResult, sample_size: usize) -> Result<SampleSet, OracleError> {
        let floor = self.exploration;
        let probabilities = tuned
            .params
            .iter()
            .map(|theta| {
                let p = (theta / 2.0).sin().powi(2);
                if p.is_finite() {
                    Ok(p.clamp(floor, 1.0 - floor))
                } else {
                    Err(OracleError::Sampling(format!("invalid rotation angle {}", theta)))
                }
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let mut samples = SampleSet::new();
        for _ in 0..sample_size {
            let bits = probabilities
                .iter()
                .map(|&p| u8::from(self.rng.gen_bool(p)))
                .collect();
            samples.record(bits);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_only_model() -> EnergyModel {
        // E = ½·(2σ₀ + 4σ₁) + 3, minimized at σ = (−1, −1), i.e. x = (1, 1)
        EnergyModel::new(vec![vec![0.0; 2]; 2], vec![2.0, 4.0], -0.5, 3.0).unwrap()
    }

    #[test]
    fn test_expected_energy_matches_pure_states() {
        let model = EnergyModel::new(
            vec![vec![-1.0, 0.5], vec![0.5, -2.0]],
            vec![1.0, -3.0],
            -0.5,
            2.0,
        )
        .unwrap();
        for spins in [[1.0, 1.0], [1.0, -1.0], [-1.0, 1.0], [-1.0, -1.0]] {
            let exact = model.energy(&spins);
            let expected = expected_energy(&model, &spins);
            assert!((exact - expected).abs() < 1e-12, "{:?}: {} vs {}", spins, exact, expected);
        }
    }

    #[test]
    fn test_tuning_lowers_expected_energy() {
        let model = field_only_model();
        let mut sampler = ProductStateSampler::new(11);
        let initial = vec![1.0, 1.0];
        let start = expected_energy(&model, &[1.0_f64.cos(), 1.0_f64.cos()]);

        let tuned = sampler.tune(&model, 100, &initial).unwrap();

        assert!(tuned.success, "field-only model should converge");
        assert!(tuned.objective < start);
        assert!((tuned.objective - 0.0).abs() < 1e-6, "minimum is 3 − 3 = 0, got {}", tuned.objective);
    }

    #[test]
    fn test_sampling_follows_tuned_distribution() {
        let model = field_only_model();
        let mut sampler = ProductStateSampler::new(5);
        let tuned = sampler.tune(&model, 1000, &[1.0, 1.0]).unwrap();
        let samples = sampler.sample(&tuned, 1000).unwrap();

        assert_eq!(samples.total_weight(), 1000);
        let (top, count) = samples.most_frequent(1)[0];
        assert_eq!(top, &[1, 1]);
        assert!(count > 800, "count = {}", count);
    }

    #[test]
    fn test_same_seed_same_samples() {
        let tuned = TunedResult {
            success: true,
            params: vec![0.3, 2.0, 1.4],
            objective: 0.0,
        };
        let a = ProductStateSampler::new(9).sample(&tuned, 200).unwrap();
        let b = ProductStateSampler::new(9).sample(&tuned, 200).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tune_rejects_wrong_param_count() {
        let model = field_only_model();
        let err = ProductStateSampler::new(1).tune(&model, 10, &[0.5]).unwrap_err();
        assert!(matches!(err, OracleError::Tuning(_)));
    }

    #[test]
    fn test_sample_rejects_nan_angle() {
        let tuned = TunedResult {
            success: false,
            params: vec![f64::NAN],
            objective: 0.0,
        };
        let err = ProductStateSampler::new(1).sample(&tuned, 10).unwrap_err();
        assert!(matches!(err, OracleError::Sampling(_)));
    }
}
