use tracing::debug;

use crate::error::ProblemError;
use crate::problem::LinearProgram;

/// Bias applied to the field term when mapping `x ∈ {0,1}` to `σ = 1 − 2x`
pub const FIELD_BIAS: f64 = -0.5;

/// Ising-type energy `E(σ) = −Σ J[i,j]σ[i]σ[j] − μ·Σ h[i]σ[i] + const` over
/// spins `σ ∈ {−1,+1}ⁿ`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyModel {
    /// Symmetric coupling matrix
    pub coupling: Vec<Vec<f64>>,
    /// Local field vector
    pub field: Vec<f64>,
    /// Field scale factor
    pub mu: f64,
    /// Additive offset restoring the objective's scale
    pub constant: f64,
}

impl EnergyModel {
    pub fn new(coupling: Vec<Vec<f64>>, field: Vec<f64>, mu: f64, constant: f64) -> Result<Self, ProblemError> {
        let n = field.len();
        if coupling.len() != n {
            return Err(ProblemError::DimensionMismatch {
                what: "coupling matrix rows",
                expected: n,
                found: coupling.len(),
            });
        }
        for row in &coupling {
            if row.len() != n {
                return Err(ProblemError::DimensionMismatch {
                    what: "coupling matrix columns",
                    expected: n,
                    found: row.len(),
                });
            }
        }
        Ok(Self {
            coupling,
            field,
            mu,
            constant,
        })
    }

    /// Reduce the active sub-problem of `program` to an energy model.
    ///
    /// With `Q = ÂᵀÂ` and `r = b̂ᵀÂ`:
    /// `J = −¼·M·Q`, `h = c − (2M·r + M·1ᵀQ)`,
    /// `const = ¼·M·1ᵀQ1 + ½·1ᵀc + M·r·1 + M·b̂ᵀb̂`.
    pub fn from_program(program: &LinearProgram) -> Result<Self, ProblemError> {
        let a_hat = program.a_hat();
        let b_hat = program.b_hat();
        let c = program.c();
        let m = program.penalty();
        let n = c.len();

        if b_hat.len() != a_hat.len() {
            return Err(ProblemError::DimensionMismatch {
                what: "active right-hand side",
                expected: a_hat.len(),
                found: b_hat.len(),
            });
        }

        let mut gram = vec![vec![0.0; n]; n];
        let mut rhs_proj = vec![0.0; n];

        for (row, &rhs) in a_hat.iter().zip(b_hat) {
            if row.len() != n {
                return Err(ProblemError::DimensionMismatch {
                    what: "active constraint row",
                    expected: n,
                    found: row.len(),
                });
            }
            for (i, &ai) in row.iter().enumerate() {
                if ai == 0.0 {
                    continue;
                }
                rhs_proj[i] += rhs * ai;
                for (j, &aj) in row.iter().enumerate() {
                    gram[i][j] += ai * aj;
                }
            }
        }

        // 1ᵀQ, i.e. column sums of the Gram matrix
        let mut col_sums = vec![0.0; n];
        for row in &gram {
            for (j, &v) in row.iter().enumerate() {
                col_sums[j] += v;
            }
        }

        let coupling: Vec<Vec<f64>> = gram
            .iter()
            .map(|row| row.iter().map(|&v| -0.25 * m * v).collect())
            .collect();

        let field: Vec<f64> = (0..n)
            .map(|j| c[j] - (2.0 * m * rhs_proj[j] + m * col_sums[j]))
            .collect();

        let constant = 0.25 * m * col_sums.iter().sum::<f64>()
            + 0.5 * c.iter().sum::<f64>()
            + m * rhs_proj.iter().sum::<f64>()
            + m * b_hat.iter().map(|v| v * v).sum::<f64>();

        debug!(
            variables = n,
            active = program.num_active(),
            constant,
            "built energy model"
        );

        Self::new(coupling, field, FIELD_BIAS, constant)
    }

    pub fn num_spins(&self) -> usize {
        self.field.len()
    }

    /// Energy of a spin configuration (entries must be ±1)
    pub fn energy(&self, spins: &[f64]) -> f64 {
        let mut quadratic = 0.0;
        for (i, row) in self.coupling.iter().enumerate() {
            for (j, &jij) in row.iter().enumerate() {
                quadratic += jij * spins[i] * spins[j];
            }
        }
        let linear: f64 = self.field.iter().zip(spins).map(|(h, s)| h * s).sum();
        -quadratic - self.mu * linear + self.constant
    }

    /// Energy of a binary assignment under `σ = 1 − 2x`
    pub fn energy_of_bits(&self, bits: &[u8]) -> f64 {
        let spins: Vec<f64> = bits.iter().map(|&b| spin_of_bit(b)).collect();
        self.energy(&spins)
    }
}

/// `x = 0 ↦ +1`, `x = 1 ↦ −1`
pub fn spin_of_bit(bit: u8) -> f64 {
    1.0 - 2.0 * f64::from(bit)
}
