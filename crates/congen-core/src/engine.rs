use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::energy::EnergyModel;
use crate::error::{EngineError, OracleError, ProblemError};
use crate::oracle::{SampleSet, SamplingOracle, TunedResult};
use crate::problem::LinearProgram;
use crate::solution::{Feasibility, GenerationOutcome, Termination};

/// Number of 0.1 steps the threshold multiplier takes from 1.0 down to 0.0
const MULTIPLIER_STEPS: u32 = 10;

/// Row-generation loop that reveals constraints to a sampling oracle only when
/// the samples show they are violated.
#[derive(Debug, Clone)]
pub struct ConstraintGeneration {
    /// Total draws requested from the oracle per iteration
    sample_size: usize,
    /// Nominal activation threshold; each iteration derives its own
    threshold: f64,
    /// Maximum oracle round trips before giving up
    max_iterations: usize,
    /// Seed for the initial parameter draw
    seed: Option<u64>,
}

impl Default for ConstraintGeneration {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            threshold: 0.0,
            max_iterations: 1000,
            seed: None,
        }
    }
}

impl ConstraintGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn initial_params<O: SamplingOracle + ?Sized>(&self, oracle: &O, num_spins: usize) -> Vec<f64> {
        let mut rng = self.rng();
        (0..oracle.param_count(num_spins))
            .map(|_| rng.gen_range(0.0..1.0))
            .collect()
    }

    /// Run constraint generation on `program`, activating rows in place.
    pub fn run<O: SamplingOracle + ?Sized>(
        &self,
        program: &mut LinearProgram,
        oracle: &mut O,
    ) -> Result<GenerationOutcome, EngineError> {
        info!(
            variables = program.num_variables(),
            constraints = program.num_constraints(),
            density = program.density(),
            sample_size = self.sample_size,
            threshold = self.threshold,
            max_iterations = self.max_iterations,
            "starting constraint generation"
        );

        let mut params = self.initial_params(oracle, program.num_variables());
        let mut activated = Vec::new();

        for iteration in 0..self.max_iterations {
            info!(iteration, active = program.num_active(), "iteration");

            let (tuned, samples) = self.round_trip(program, oracle, &params)?;

            let best = program.check_feasibility(samples.unique())?;
            if best.found {
                info!(solution = ?best.solution, value = best.value, iteration, "feasible solution found");
                return Ok(GenerationOutcome {
                    termination: Termination::FeasibleFound,
                    best,
                    iterations: iteration + 1,
                    activated,
                });
            }

            info!("no feasible sample in this iteration");
            if program.is_complete() {
                info!("all constraints active, stopping");
                return Ok(GenerationOutcome {
                    termination: Termination::ExhaustedConstraints,
                    best,
                    iterations: iteration + 1,
                    activated,
                });
            }

            let scores = program.sample_violation_scores(&samples)?;
            let added = activate_adaptively(program, &scores)?;
            activated.extend(added);

            params = tuned.params;
        }

        info!(iterations = self.max_iterations, "iteration budget exhausted without a feasible solution");
        Ok(GenerationOutcome {
            termination: Termination::MaxItersReached,
            best: Feasibility::not_found(),
            iterations: self.max_iterations,
            activated,
        })
    }

    /// Baseline run: every constraint active from the start, one oracle round
    /// trip and one feasibility check. `program` itself is left untouched.
    pub fn run_reference<O: SamplingOracle + ?Sized>(
        &self,
        program: &LinearProgram,
        oracle: &mut O,
    ) -> Result<GenerationOutcome, EngineError> {
        let mut full = program.clone();
        full.activate_all();
        info!(
            variables = full.num_variables(),
            constraints = full.num_constraints(),
            sample_size = self.sample_size,
            "starting reference run with all constraints"
        );

        let params = self.initial_params(oracle, full.num_variables());
        let (_, samples) = self.round_trip(&full, oracle, &params)?;
        let best = full.check_feasibility(samples.unique())?;

        let termination = if best.found {
            info!(solution = ?best.solution, value = best.value, "reference run found a feasible solution");
            Termination::FeasibleFound
        } else {
            info!("reference run found no feasible solution");
            Termination::ExhaustedConstraints
        };

        Ok(GenerationOutcome {
            termination,
            best,
            iterations: 1,
            activated: Vec::new(),
        })
    }

    /// Build the energy model, tune the oracle against it and draw samples
    fn round_trip<O: SamplingOracle + ?Sized>(
        &self,
        program: &LinearProgram,
        oracle: &mut O,
        params: &[f64],
    ) -> Result<(TunedResult, SampleSet), EngineError> {
        let model = EnergyModel::from_program(program)?;

        let tuned = oracle.tune(&model, self.sample_size, params)?;
        if tuned.success {
            debug!(objective = tuned.objective, "oracle tuning converged");
        } else {
            warn!(objective = tuned.objective, "oracle tuning did not converge");
        }

        let samples = oracle.sample(&tuned, self.sample_size)?;
        let n = program.num_variables();
        if let Some(bad) = samples.unique().find(|bits| bits.len() != n) {
            return Err(OracleError::SampleLength {
                expected: n,
                found: bad.len(),
            }
            .into());
        }

        log_sample_statistics(&samples);
        Ok((tuned, samples))
    }
}

/// Activate constraints against a threshold that relaxes from `max(scores)`
/// in steps of 0.1 of the maximum until at least one row is added.
///
/// Once the multiplier bottoms out, every inactive row with a positive score
/// is activated. Returns an empty list only when no inactive row was violated
/// by any sample.
pub fn activate_adaptively(program: &mut LinearProgram, scores: &[f64]) -> Result<Vec<usize>, ProblemError> {
    let max_score = scores.iter().copied().fold(0.0, f64::max);
    if max_score <= 0.0 {
        info!("no constraint is violated by any sample, nothing to activate");
        return Ok(Vec::new());
    }

    for step in (1..=MULTIPLIER_STEPS).rev() {
        let multiplier = f64::from(step) / f64::from(MULTIPLIER_STEPS);
        let threshold = multiplier * max_score;
        let added = program.activate_by_threshold(scores, threshold)?;
        if !added.is_empty() {
            info!(count = added.len(), constraints = ?added, threshold, "activated constraints");
            return Ok(added);
        }
        debug!(multiplier, "no constraint cleared the threshold, lowering multiplier");
    }

    let added = program.activate_positive(scores)?;
    if added.is_empty() {
        info!("no inactive constraint is violated by any sample, nothing to activate");
    } else {
        info!(count = added.len(), constraints = ?added, "activated every violated constraint");
    }
    Ok(added)
}

fn log_sample_statistics(samples: &SampleSet) {
    let total = samples.total_weight();
    debug!(unique = samples.len(), total, "sampled candidates");
    for (rank, (bits, count)) in samples.most_frequent(5).into_iter().enumerate() {
        let share = if total > 0 { count as f64 / total as f64 * 100.0 } else { 0.0 };
        debug!(rank = rank + 1, count, share, sample = ?bits, "frequent sample");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns pre-scripted sample sets, repeating the last one
    struct ScriptedOracle {
        rounds: Vec<SampleSet>,
        calls: usize,
        seen_params: Vec<Vec<f64>>,
    }

    impl ScriptedOracle {
        fn new(rounds: Vec<SampleSet>) -> Self {
            Self {
                rounds,
                calls: 0,
                seen_params: Vec::new(),
            }
        }
    }

    impl SamplingOracle for ScriptedOracle {
        fn param_count(&self, _num_spins: usize) -> usize {
            4
        }

        fn tune(
            &mut self,
            _model: &EnergyModel,
            _sample_size: usize,
            initial_params: &[f64],
        ) -> Result<TunedResult, OracleError> {
            self.seen_params.push(initial_params.to_vec());
            Ok(TunedResult {
                success: self.calls % 2 == 0,
                params: vec![self.calls as f64 + 10.0; 4],
                objective: 0.0,
            })
        }

        fn sample(&mut self, _tuned: &TunedResult, _sample_size: usize) -> Result<SampleSet, OracleError> {
            let idx = self.calls.min(self.rounds.len() - 1);
            self.calls += 1;
            Ok(self.rounds[idx].clone())
        }
    }

    struct FailingOracle;

    impl SamplingOracle for FailingOracle {
        fn param_count(&self, num_spins: usize) -> usize {
            num_spins
        }

        fn tune(&mut self, _: &EnergyModel, _: usize, initial: &[f64]) -> Result<TunedResult, OracleError> {
            Ok(TunedResult {
                success: true,
                params: initial.to_vec(),
                objective: 0.0,
            })
        }

        fn sample(&mut self, _: &TunedResult, _: usize) -> Result<SampleSet, OracleError> {
            Err(OracleError::Sampling("backend unavailable".to_string()))
        }
    }

    fn samples(entries: &[(&[u8], u64)]) -> SampleSet {
        entries.iter().map(|(bits, count)| (bits.to_vec(), *count)).collect()
    }

    fn identity_partition() -> LinearProgram {
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

    #[test]
    fn test_feasible_on_first_iteration() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![samples(&[(&[1, 1, 1], 900), (&[0, 1, 0], 100)])]);

        let outcome = ConstraintGeneration::new()
            .with_seed(7)
            .run(&mut lp, &mut oracle)
            .unwrap();

        assert_eq!(outcome.termination, Termination::FeasibleFound);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.activated.is_empty());
        assert_eq!(lp.num_active(), 0, "no constraint revealed once feasible");
        assert_eq!(outcome.best.solution, vec![1, 1, 1]);
        assert_eq!(outcome.best.value, 3.0);
    }

    #[test]
    fn test_zero_signal_runs_to_iteration_budget() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![SampleSet::new()]);

        let outcome = ConstraintGeneration::new()
            .with_max_iterations(5)
            .run(&mut lp, &mut oracle)
            .unwrap();

        assert_eq!(outcome.termination, Termination::MaxItersReached);
        assert_eq!(outcome.iterations, 5);
        assert!(outcome.activated.is_empty());
        assert!(!outcome.found());
        assert_eq!(outcome.best.value, f64::INFINITY);
        assert_eq!(oracle.calls, 5);
    }

    #[test]
    fn test_exhausts_constraints() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![samples(&[(&[0, 0, 0], 10)])]);

        let outcome = ConstraintGeneration::new().run(&mut lp, &mut oracle).unwrap();

        assert_eq!(outcome.termination, Termination::ExhaustedConstraints);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.activated, vec![0, 1, 2]);
        assert!(lp.is_complete());
    }

    #[test]
    fn test_activates_most_violated_first_then_finds_solution() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![
            // Row 0 violated by every draw, row 2 by a quarter
            samples(&[(&[0, 1, 1], 3), (&[0, 1, 0], 1)]),
            samples(&[(&[1, 1, 0], 4)]),
            samples(&[(&[1, 1, 1], 4)]),
        ]);

        let outcome = ConstraintGeneration::new()
            .with_seed(1)
            .run(&mut lp, &mut oracle)
            .unwrap();

        assert_eq!(outcome.termination, Termination::FeasibleFound);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.activated, vec![0, 2]);
        assert_eq!(lp.active(), &[true, false, true]);
    }

    #[test]
    fn test_params_are_carried_forward() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![SampleSet::new()]);

        ConstraintGeneration::new()
            .with_seed(3)
            .with_max_iterations(3)
            .run(&mut lp, &mut oracle)
            .unwrap();

        let first = &oracle.seen_params[0];
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|p| (0.0..1.0).contains(p)));
        assert_eq!(oracle.seen_params[1], vec![10.0; 4]);
        assert_eq!(oracle.seen_params[2], vec![11.0; 4]);
    }

    #[test]
    fn test_seeded_initial_params_are_reproducible() {
        let run = || {
            let mut lp = identity_partition();
            let mut oracle = ScriptedOracle::new(vec![SampleSet::new()]);
            ConstraintGeneration::new()
                .with_seed(42)
                .with_max_iterations(1)
                .run(&mut lp, &mut oracle)
                .unwrap();
            oracle.seen_params[0].clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let mut lp = identity_partition();
        let err = ConstraintGeneration::new()
            .run(&mut lp, &mut FailingOracle)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Oracle(OracleError::Sampling("backend unavailable".to_string()))
        );
    }

    #[test]
    fn test_rejects_wrong_sample_length() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![samples(&[(&[1, 1], 5)])]);
        let err = ConstraintGeneration::new().run(&mut lp, &mut oracle).unwrap_err();
        assert_eq!(
            err,
            EngineError::Oracle(OracleError::SampleLength { expected: 3, found: 2 })
        );
    }

    #[test]
    fn test_zero_iteration_budget() {
        let mut lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![SampleSet::new()]);
        let outcome = ConstraintGeneration::new()
            .with_max_iterations(0)
            .run(&mut lp, &mut oracle)
            .unwrap();
        assert_eq!(outcome.termination, Termination::MaxItersReached);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(oracle.calls, 0);
    }

    #[test]
    fn test_reference_run_leaves_program_untouched() {
        let lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![samples(&[(&[1, 1, 1], 1), (&[1, 0, 1], 9)])]);

        let outcome = ConstraintGeneration::new().run_reference(&lp, &mut oracle).unwrap();

        assert_eq!(outcome.termination, Termination::FeasibleFound);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.best.value, 3.0);
        assert_eq!(lp.num_active(), 0);
        assert_eq!(oracle.calls, 1);
    }

    #[test]
    fn test_reference_run_without_feasible_sample() {
        let lp = identity_partition();
        let mut oracle = ScriptedOracle::new(vec![samples(&[(&[0, 0, 0], 5)])]);
        let outcome = ConstraintGeneration::new().run_reference(&lp, &mut oracle).unwrap();
        assert_eq!(outcome.termination, Termination::ExhaustedConstraints);
        assert!(!outcome.found());
    }

    #[test]
    fn test_adaptive_threshold_relaxes() {
        let mut lp = identity_partition();
        lp.activate(0).unwrap();

        // Top score belongs to an active row; row 1 clears the threshold at 0.3
        let added = activate_adaptively(&mut lp, &[1.0, 0.35, 0.0]).unwrap();
        assert_eq!(added, vec![1]);
        assert!(!lp.is_active(2));
    }

    #[test]
    fn test_adaptive_threshold_reveals_weak_violation() {
        let mut lp = identity_partition();
        lp.activate(0).unwrap();

        // Row 1 never clears a decile of the maximum but is still violated
        let added = activate_adaptively(&mut lp, &[1.0, 0.05, 0.0]).unwrap();
        assert_eq!(added, vec![1]);
        assert!(!lp.is_active(2), "zero-score rows stay hidden");
    }

    #[test]
    fn test_progress_whenever_an_inactive_row_is_violated() {
        let mut lp = identity_partition();
        lp.activate(0).unwrap();
        lp.activate(1).unwrap();

        let added = activate_adaptively(&mut lp, &[1.0, 0.9, 1e-6]).unwrap();
        assert_eq!(added, vec![2]);
        assert!(lp.is_complete());
    }

    #[test]
    fn test_adaptive_threshold_tolerates_no_progress() {
        let mut lp = identity_partition();
        lp.activate(0).unwrap();

        let added = activate_adaptively(&mut lp, &[0.5, 0.0, 0.0]).unwrap();
        assert!(added.is_empty());

        let added = activate_adaptively(&mut lp, &[0.0, 0.0, 0.0]).unwrap();
        assert!(added.is_empty());
        assert_eq!(lp.num_active(), 1);
    }
}
