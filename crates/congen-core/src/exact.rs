use tracing::info;

use crate::error::SolveError;
use crate::problem::LinearProgram;
use crate::solution::{Solution, SolutionStatus};

/// Exact branch-and-bound solver for small binary programs.
///
/// Used only as a baseline; it never participates in constraint generation.
pub struct ExhaustiveSolver {
    /// Refuse problems with more variables than this
    max_variables: usize,
    /// Slack allowed when pruning on partial row sums
    tolerance: f64,
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self {
            max_variables: 30,
            tolerance: 1e-9,
        }
    }
}

impl ExhaustiveSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_variables(mut self, max: usize) -> Self {
        self.max_variables = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Solve `min cᵀx s.t. Ax = b, x ∈ {0,1}ⁿ` over the full constraint set
    pub fn solve(&self, program: &LinearProgram) -> Result<Solution, SolveError> {
        let n = program.num_variables();
        if n > self.max_variables {
            return Err(SolveError::TooManyVariables {
                n,
                limit: self.max_variables,
            });
        }

        let mut search = Search::new(program, self.tolerance);
        search.descend(0, 0.0);

        let solution = match search.best {
            Some((values, objective_value)) => Solution {
                status: SolutionStatus::Optimal,
                values,
                objective_value,
            },
            None => Solution::infeasible(),
        };
        info!(
            status = ?solution.status,
            value = solution.objective_value,
            nodes = search.nodes,
            "exact reference solve finished"
        );
        Ok(solution)
    }
}

struct Search<'a> {
    program: &'a LinearProgram,
    tolerance: f64,
    /// `row_low[i][k]`: sum of negative coefficients of row `i` from column `k` on
    row_low: Vec<Vec<f64>>,
    /// `row_high[i][k]`: sum of positive coefficients of row `i` from column `k` on
    row_high: Vec<Vec<f64>>,
    /// Sum of negative costs from column `k` on
    cost_low: Vec<f64>,
    lhs: Vec<f64>,
    bits: Vec<u8>,
    best: Option<(Vec<u8>, f64)>,
    nodes: u64,
}

impl<'a> Search<'a> {
    fn new(program: &'a LinearProgram, tolerance: f64) -> Self {
        let n = program.num_variables();
        let suffix = |values: &[f64], keep: fn(f64) -> f64| {
            let mut out = vec![0.0; n + 1];
            for k in (0..n).rev() {
                out[k] = out[k + 1] + keep(values[k]);
            }
            out
        };

        Self {
            row_low: program.a().iter().map(|row| suffix(row.as_slice(), |v| v.min(0.0))).collect(),
            row_high: program.a().iter().map(|row| suffix(row.as_slice(), |v| v.max(0.0))).collect(),
            cost_low: suffix(program.c(), |v| v.min(0.0)),
            lhs: vec![0.0; program.num_constraints()],
            bits: vec![0; n],
            best: None,
            nodes: 0,
            program,
            tolerance,
        }
    }

    fn can_reach(&self, k: usize) -> bool {
        let b = self.program.b();
        (0..self.lhs.len()).all(|i| {
            let low = self.lhs[i] + self.row_low[i][k];
            let high = self.lhs[i] + self.row_high[i][k];
            b[i] >= low - self.tolerance && b[i] <= high + self.tolerance
        })
    }

    fn descend(&mut self, k: usize, cost: f64) {
        self.nodes += 1;

        if let Some((_, best)) = &self.best {
            if cost + self.cost_low[k] >= *best {
                return;
            }
        }
        if !self.can_reach(k) {
            return;
        }

        let n = self.bits.len();
        if k == n {
            if self.accepts(&self.bits) {
                self.best = Some((self.bits.clone(), cost));
            }
            return;
        }

        // Try the cheaper branch first
        let order: [u8; 2] = if self.program.c()[k] < 0.0 { [1, 0] } else { [0, 1] };
        for value in order {
            self.assign(k, value);
            self.descend(k + 1, cost + self.program.c()[k] * f64::from(value));
            self.assign(k, 0);
        }
    }

    fn assign(&mut self, k: usize, value: u8) {
        if self.bits[k] == value {
            return;
        }
        let sign = if value == 1 { 1.0 } else { -1.0 };
        for (i, row) in self.program.a().iter().enumerate() {
            self.lhs[i] += sign * row[k];
        }
        self.bits[k] = value;
    }

    fn accepts(&self, bits: &[u8]) -> bool {
        matches!(self.program.is_feasible(bits), Ok(true))
    }
}
