use tracing::{debug, info};

use crate::error::ProblemError;
use crate::oracle::SampleSet;
use crate::solution::Feasibility;

/// Absolute tolerance used when testing `A·x = b` row by row
pub const FEASIBILITY_TOLERANCE: f64 = 1e-10;

/// A binary linear program `min cᵀx s.t. Ax = b, x ∈ {0,1}ⁿ` together with the
/// sub-problem revealed so far.
///
/// Rows of `a_hat`/`b_hat` mirror `a`/`b` exactly where the row is active and
/// are zero everywhere else. Cloning yields an independent copy of the
/// revealed state.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    c: Vec<f64>,
    active: Vec<bool>,
    a_hat: Vec<Vec<f64>>,
    b_hat: Vec<f64>,
    /// Penalty weight `ceil(Σ|c_j|)`, fixed at construction
    penalty: f64,
}

impl LinearProgram {
    /// Build a program from an `m×n` matrix, an `m`-vector and an `n`-vector.
    /// All constraints start inactive.
    pub fn new(a: Vec<Vec<f64>>, b: Vec<f64>, c: Vec<f64>) -> Result<Self, ProblemError> {
        let n = c.len();
        let m = a.len();

        if b.len() != m {
            return Err(ProblemError::DimensionMismatch {
                what: "right-hand side",
                expected: m,
                found: b.len(),
            });
        }
        for row in &a {
            if row.len() != n {
                return Err(ProblemError::DimensionMismatch {
                    what: "constraint row",
                    expected: n,
                    found: row.len(),
                });
            }
        }

        let penalty = c.iter().map(|v| v.abs()).sum::<f64>().ceil();

        Ok(Self {
            a_hat: vec![vec![0.0; n]; m],
            b_hat: vec![0.0; m],
            active: vec![false; m],
            a,
            b,
            c,
            penalty,
        })
    }

    pub fn num_variables(&self) -> usize {
        self.c.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.a.len()
    }

    pub fn num_active(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    pub fn a(&self) -> &[Vec<f64>] {
        &self.a
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn c(&self) -> &[f64] {
        &self.c
    }

    pub fn a_hat(&self) -> &[Vec<f64>] {
        &self.a_hat
    }

    pub fn b_hat(&self) -> &[f64] {
        &self.b_hat
    }

    pub fn active(&self) -> &[bool] {
        &self.active
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    /// True once every constraint row has been revealed
    pub fn is_complete(&self) -> bool {
        self.active.iter().all(|&a| a)
    }

    /// Fraction of non-zero entries in `A`
    pub fn density(&self) -> f64 {
        let total = self.num_constraints() * self.num_variables();
        if total == 0 {
            return 0.0;
        }
        let nonzero = self.a.iter().flatten().filter(|v| **v != 0.0).count();
        nonzero as f64 / total as f64
    }

    /// Reveal constraint `index`. Returns `false` if it was already active.
    pub fn activate(&mut self, index: usize) -> Result<bool, ProblemError> {
        if index >= self.num_constraints() {
            return Err(ProblemError::ConstraintIndex {
                index,
                count: self.num_constraints(),
            });
        }
        if self.active[index] {
            return Ok(false);
        }
        self.active[index] = true;
        self.a_hat[index].copy_from_slice(&self.a[index]);
        self.b_hat[index] = self.b[index];
        Ok(true)
    }

    /// Reveal every constraint
    pub fn activate_all(&mut self) {
        for i in 0..self.num_constraints() {
            self.active[i] = true;
            self.a_hat[i].copy_from_slice(&self.a[i]);
            self.b_hat[i] = self.b[i];
        }
    }

    /// Activate every inactive row whose score is at least `threshold`.
    /// Returns the newly activated indices in ascending order.
    pub fn activate_by_threshold(&mut self, scores: &[f64], threshold: f64) -> Result<Vec<usize>, ProblemError> {
        self.activate_where(scores, |score| score >= threshold)
    }

    /// Activate every inactive row with a strictly positive score.
    pub fn activate_positive(&mut self, scores: &[f64]) -> Result<Vec<usize>, ProblemError> {
        self.activate_where(scores, |score| score > 0.0)
    }

    fn activate_where(&mut self, scores: &[f64], keep: impl Fn(f64) -> bool) -> Result<Vec<usize>, ProblemError> {
        if scores.len() != self.num_constraints() {
            return Err(ProblemError::DimensionMismatch {
                what: "violation scores",
                expected: self.num_constraints(),
                found: scores.len(),
            });
        }

        let mut added = Vec::new();
        for (i, &score) in scores.iter().enumerate() {
            if !self.active[i] && keep(score) && self.activate(i)? {
                added.push(i);
            }
        }
        Ok(added)
    }

    /// Objective value `cᵀx`
    pub fn objective_value(&self, x: &[u8]) -> f64 {
        self.c.iter().zip(x).map(|(c, &v)| c * f64::from(v)).sum()
    }

    /// Whether `x` satisfies row `i` of the original constraints
    fn satisfies_row(&self, i: usize, x: &[u8]) -> bool {
        let lhs: f64 = self.a[i].iter().zip(x).map(|(a, &v)| a * f64::from(v)).sum();
        (lhs - self.b[i]).abs() <= FEASIBILITY_TOLERANCE
    }

    /// Whether `x` satisfies every original constraint
    pub fn is_feasible(&self, x: &[u8]) -> Result<bool, ProblemError> {
        self.validate_candidate(x)?;
        Ok((0..self.num_constraints()).all(|i| self.satisfies_row(i, x)))
    }

    fn validate_candidate(&self, x: &[u8]) -> Result<(), ProblemError> {
        if x.len() != self.num_variables() {
            return Err(ProblemError::CandidateLength {
                expected: self.num_variables(),
                found: x.len(),
            });
        }
        if let Some((position, &value)) = x.iter().enumerate().find(|(_, v)| **v > 1) {
            return Err(ProblemError::NonBinaryEntry { position, value });
        }
        Ok(())
    }

    /// Find the cheapest candidate satisfying the full original `A·x = b`.
    ///
    /// Candidates that only satisfy the active rows do not count. Ties keep the
    /// first candidate seen.
    pub fn check_feasibility<'a, I>(&self, candidates: I) -> Result<Feasibility, ProblemError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut best = Feasibility::not_found();

        for x in candidates {
            if !self.is_feasible(x)? {
                continue;
            }
            let value = self.objective_value(x);
            info!(solution = ?x, value, "found feasible candidate");
            if !best.found || value < best.value {
                best = Feasibility {
                    found: true,
                    solution: x.to_vec(),
                    value,
                };
            }
        }

        Ok(best)
    }

    /// Weighted fraction of candidates violating each original row.
    ///
    /// `total_weight` normalizes the scores; a non-positive total yields all zeros.
    pub fn violation_scores<'a, I>(&self, weighted: I, total_weight: f64) -> Result<Vec<f64>, ProblemError>
    where
        I: IntoIterator<Item = (&'a [u8], f64)>,
    {
        let m = self.num_constraints();
        let mut violated = vec![0.0; m];

        for (x, weight) in weighted {
            self.validate_candidate(x)?;
            for (i, total) in violated.iter_mut().enumerate() {
                if !self.satisfies_row(i, x) {
                    *total += weight;
                }
            }
        }

        if total_weight <= 0.0 {
            debug!("empty sample population, all violation scores are zero");
            return Ok(vec![0.0; m]);
        }

        Ok(violated.into_iter().map(|v| v / total_weight).collect())
    }

    /// Violation scores over a sample multiset, weighted by occurrence counts
    pub fn sample_violation_scores(&self, samples: &SampleSet) -> Result<Vec<f64>, ProblemError> {
        self.violation_scores(samples.weighted(), samples.total_weight() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_partition() -> LinearProgram {
        // Sets {0}, {1}, {2} over three elements
        LinearProgram::new(
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            vec![1.0, 1.0, 1.0],
            vec![1.0, 1.0, 1.0],
        )
        .unwrap()
    }

    fn small_partition() -> LinearProgram {
        // Elements {0,1,2}; sets {0,1}, {2}, {0}, {1,2}
        LinearProgram::new(
            vec![
                vec![1.0, 0.0, 1.0, 0.0],
                vec![1.0, 0.0, 0.0, 1.0],
                vec![0.0, 1.0, 0.0, 1.0],
            ],
            vec![1.0, 1.0, 1.0],
            vec![3.0, 2.0, 1.0, -2.5],
        )
        .unwrap()
    }

    fn assert_hat_invariant(lp: &LinearProgram) {
        for i in 0..lp.num_constraints() {
            if lp.active()[i] {
                assert_eq!(lp.a_hat()[i], lp.a()[i], "active row {} must mirror A", i);
                assert_eq!(lp.b_hat()[i], lp.b()[i]);
            } else {
                assert!(lp.a_hat()[i].iter().all(|v| *v == 0.0), "inactive row {} must be zero", i);
                assert_eq!(lp.b_hat()[i], 0.0);
            }
        }
    }

    #[test]
    fn test_construction_rejects_bad_dimensions() {
        let err = LinearProgram::new(vec![vec![1.0, 0.0]], vec![1.0, 2.0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, ProblemError::DimensionMismatch { what: "right-hand side", .. }));

        let err = LinearProgram::new(vec![vec![1.0]], vec![1.0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, ProblemError::DimensionMismatch { what: "constraint row", .. }));
    }

    #[test]
    fn test_penalty_is_ceiled_absolute_cost_sum() {
        let lp = small_partition();
        // |3| + |2| + |1| + |-2.5| = 8.5
        assert_eq!(lp.penalty(), 9.0);
        assert_eq!(lp.num_variables(), 4);
        assert_eq!(lp.num_constraints(), 3);
        assert!(!lp.is_complete());
    }

    #[test]
    fn test_activation_keeps_hat_invariant() {
        let mut lp = small_partition();
        assert_hat_invariant(&lp);
        for &i in &[2, 0, 2, 1] {
            lp.activate(i).unwrap();
            assert_hat_invariant(&lp);
        }
        assert!(lp.is_complete());
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut once = small_partition();
        assert!(once.activate(1).unwrap());

        let mut twice = small_partition();
        assert!(twice.activate(1).unwrap());
        assert!(!twice.activate(1).unwrap(), "second activation adds nothing");

        assert_eq!(once, twice);
    }

    #[test]
    fn test_activate_out_of_range() {
        let mut lp = small_partition();
        assert_eq!(
            lp.activate(3),
            Err(ProblemError::ConstraintIndex { index: 3, count: 3 })
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let mut lp = small_partition();
        lp.activate(0).unwrap();
        let mut copy = lp.clone();
        copy.activate_all();

        assert!(copy.is_complete());
        assert_eq!(lp.num_active(), 1);
        assert_eq!(lp.penalty(), copy.penalty());
        assert_hat_invariant(&lp);
        assert_hat_invariant(&copy);
    }

    #[test]
    fn test_scenario_identity_feasibility() {
        let lp = identity_partition();

        let result = lp.check_feasibility([[1u8, 1, 1].as_slice()]).unwrap();
        assert!(result.found);
        assert_eq!(result.solution, vec![1, 1, 1]);
        assert_eq!(result.value, 3.0);

        let result = lp.check_feasibility([[1u8, 0, 0].as_slice()]).unwrap();
        assert!(!result.found);
        assert!(result.solution.is_empty());
        assert_eq!(result.value, f64::INFINITY);
    }

    #[test]
    fn test_feasibility_uses_full_matrix() {
        let mut lp = small_partition();
        lp.activate(0).unwrap();
        // Satisfies row 0 only
        let candidate = [1u8, 0, 0, 0];
        let result = lp.check_feasibility([candidate.as_slice()]).unwrap();
        assert!(!result.found);
    }

    #[test]
    fn test_feasibility_picks_cheapest() {
        let lp = small_partition();
        let candidates: Vec<Vec<u8>> = vec![
            vec![0, 0, 0, 0], // infeasible
            vec![1, 1, 0, 0], // cost 5
            vec![0, 0, 1, 1], // cost -1.5
        ];
        let result = lp
            .check_feasibility(candidates.iter().map(Vec::as_slice))
            .unwrap();
        assert!(result.found);
        assert_eq!(result.solution, vec![0, 0, 1, 1]);
        assert!((result.value + 1.5).abs() < 1e-12, "value = {}", result.value);
    }

    #[test]
    fn test_feasibility_rejects_wrong_length() {
        let lp = small_partition();
        let err = lp.check_feasibility([[1u8, 0].as_slice()]).unwrap_err();
        assert_eq!(err, ProblemError::CandidateLength { expected: 4, found: 2 });
    }

    #[test]
    fn test_violation_scores_weighted() {
        let lp = small_partition();
        let a = [1u8, 0, 0, 0]; // violates row 2
        let b = [0u8, 1, 0, 0]; // violates rows 0 and 1
        let scores = lp
            .violation_scores([(a.as_slice(), 3.0), (b.as_slice(), 1.0)], 4.0)
            .unwrap();
        assert_eq!(scores, vec![0.25, 0.25, 0.75]);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_violation_scores_ignore_activation() {
        let mut lp = small_partition();
        let x = [1u8, 0, 0, 0];
        let before = lp.violation_scores([(x.as_slice(), 1.0)], 1.0).unwrap();
        lp.activate(1).unwrap();
        lp.activate(2).unwrap();
        let after = lp.violation_scores([(x.as_slice(), 1.0)], 1.0).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_violation_scores_empty_population() {
        let lp = small_partition();
        let scores = lp.violation_scores(std::iter::empty::<(&[u8], f64)>(), 0.0).unwrap();
        assert_eq!(scores, vec![0.0; 3]);
    }

    #[test]
    fn test_activate_by_threshold() {
        let mut lp = small_partition();
        lp.activate(1).unwrap();

        let added = lp.activate_by_threshold(&[0.5, 0.9, 0.5], 0.5).unwrap();
        assert_eq!(added, vec![0, 2], "already active row 1 is skipped");

        let added = lp.activate_by_threshold(&[1.0, 1.0, 1.0], 0.0).unwrap();
        assert!(added.is_empty());
        assert!(lp.is_complete());
    }

    #[test]
    fn test_activate_positive_skips_zero_scores() {
        let mut lp = small_partition();
        lp.activate(0).unwrap();

        let added = lp.activate_positive(&[1.0, 1e-12, 0.0]).unwrap();
        assert_eq!(added, vec![1]);
        assert!(!lp.is_active(2));
    }

    #[test]
    fn test_activate_by_threshold_checks_length() {
        let mut lp = small_partition();
        assert!(lp.activate_by_threshold(&[1.0], 0.0).is_err());
    }
}
