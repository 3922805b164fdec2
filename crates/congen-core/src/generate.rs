use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::GenerateError;
use crate::problem::LinearProgram;

/// Attempts at drawing whole partitions of the universe
const PARTITION_ATTEMPTS: usize = 10;
/// Attempts at drawing extra random sets afterwards
const TOP_UP_ATTEMPTS: usize = 100;

/// Parameters for a random set-partitioning instance
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SetPartitionParams {
    /// Number of sets, i.e. variables
    pub n_sets: usize,
    /// Number of elements, i.e. constraints
    pub n_elements: usize,
    pub min_set_size: usize,
    pub max_set_size: usize,
    pub min_cost: i64,
    pub max_cost: i64,
}

impl Default for SetPartitionParams {
    fn default() -> Self {
        Self {
            n_sets: 15,
            n_elements: 25,
            min_set_size: 1,
            max_set_size: 10,
            min_cost: 1,
            max_cost: 100,
        }
    }
}

/// A generated instance together with the assignments known to be feasible
#[derive(Debug, Clone)]
pub struct GeneratedInstance {
    pub program: LinearProgram,
    /// Elements covered by each column
    pub sets: Vec<BTreeSet<usize>>,
    /// One assignment per partition used during construction
    pub known_solutions: Vec<Vec<u8>>,
}

/// Split `elements` into random disjoint subsets with sizes in `[min, max]`
/// where possible; the last subset absorbs any remainder.
fn partition_set<R: Rng + ?Sized>(
    elements: &BTreeSet<usize>,
    min_size: usize,
    max_size: usize,
    rng: &mut R,
) -> Vec<BTreeSet<usize>> {
    let mut result = Vec::new();
    let mut remaining: Vec<usize> = elements.iter().copied().collect();

    while !remaining.is_empty() {
        if remaining.len() <= max_size {
            result.push(remaining.drain(..).collect());
            break;
        }
        let max_current = max_size.min(remaining.len() - min_size);
        if max_current < min_size {
            result.push(remaining.drain(..).collect());
            break;
        }
        let size = rng.gen_range(min_size..=max_current);
        let subset: BTreeSet<usize> = remaining.choose_multiple(rng, size).copied().collect();
        remaining.retain(|e| !subset.contains(e));
        result.push(subset);
    }

    result
}

/// Build a set-partitioning program `min cᵀx s.t. Ax = 1` that is feasible by
/// construction: whole partitions of the universe are drawn first, then random
/// sets pad the column count.
pub fn generate_set_partition<R: Rng + ?Sized>(
    params: &SetPartitionParams,
    rng: &mut R,
) -> Result<GeneratedInstance, GenerateError> {
    if params.n_sets < 1 || params.n_elements < 1 {
        return Err(GenerateError::InvalidParameters(
            "n_sets and n_elements must be at least 1".to_string(),
        ));
    }
    if params.min_set_size < 1 {
        return Err(GenerateError::InvalidParameters("min_set_size must be at least 1".to_string()));
    }
    if params.min_set_size > params.max_set_size {
        return Err(GenerateError::InvalidParameters("min_set_size must be <= max_set_size".to_string()));
    }
    if params.min_cost > params.max_cost {
        return Err(GenerateError::InvalidParameters("min_cost must be <= max_cost".to_string()));
    }
    let max_set_size = params.max_set_size.min(params.n_elements);
    if params.min_set_size > max_set_size {
        return Err(GenerateError::InvalidParameters(
            "min_set_size exceeds the number of elements".to_string(),
        ));
    }

    let universe: BTreeSet<usize> = (0..params.n_elements).collect();
    let mut all_sets: Vec<BTreeSet<usize>> = Vec::new();
    let mut partitions: Vec<Vec<BTreeSet<usize>>> = Vec::new();

    for _ in 0..PARTITION_ATTEMPTS {
        if all_sets.len() >= params.n_sets {
            break;
        }
        let partition = partition_set(&universe, params.min_set_size, max_set_size, rng);
        if all_sets.len() + partition.len() <= params.n_sets {
            for s in &partition {
                if !all_sets.contains(s) {
                    all_sets.push(s.clone());
                }
            }
            partitions.push(partition);
        }
    }

    let universe_vec: Vec<usize> = universe.iter().copied().collect();
    for _ in 0..TOP_UP_ATTEMPTS {
        if all_sets.len() >= params.n_sets {
            break;
        }
        let size = rng.gen_range(params.min_set_size..=max_set_size);
        let candidate: BTreeSet<usize> = universe_vec.choose_multiple(rng, size).copied().collect();
        if !all_sets.contains(&candidate) {
            all_sets.push(candidate);
        }
    }

    if all_sets.len() < params.n_sets {
        return Err(GenerateError::NotEnoughSets {
            requested: params.n_sets,
            found: all_sets.len(),
        });
    }

    all_sets.shuffle(rng);
    let costs: Vec<f64> = (0..params.n_sets)
        .map(|_| rng.gen_range(params.min_cost..=params.max_cost) as f64)
        .collect();

    let mut a = vec![vec![0.0; params.n_sets]; params.n_elements];
    for (j, set) in all_sets.iter().enumerate() {
        for &element in set {
            a[element][j] = 1.0;
        }
    }
    let b = vec![1.0; params.n_elements];
    let program = LinearProgram::new(a, b, costs)?;

    let known_solutions: Vec<Vec<u8>> = partitions
        .iter()
        .map(|partition| {
            let mut x = vec![0u8; params.n_sets];
            for set in partition {
                if let Some(j) = all_sets.iter().position(|s| s == set) {
                    x[j] = 1;
                }
            }
            x
        })
        .collect();

    debug!(
        sets = params.n_sets,
        elements = params.n_elements,
        partitions = partitions.len(),
        "generated set partitioning instance"
    );

    Ok(GeneratedInstance {
        program,
        sets: all_sets,
        known_solutions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::oracle::SampleSet;

    #[test]
    fn test_partition_covers_universe_once() {
        let mut rng = StdRng::seed_from_u64(3);
        let universe: BTreeSet<usize> = (0..20).collect();
        let parts = partition_set(&universe, 2, 5, &mut rng);

        let mut seen = BTreeSet::new();
        for part in &parts {
            for &e in part {
                assert!(seen.insert(e), "element {} appears twice", e);
            }
        }
        assert_eq!(seen, universe);
    }

    #[test]
    fn test_generated_instance_shape() {
        let mut rng = StdRng::seed_from_u64(17);
        let params = SetPartitionParams {
            n_sets: 12,
            n_elements: 8,
            min_set_size: 1,
            max_set_size: 4,
            min_cost: 5,
            max_cost: 9,
        };
        let instance = generate_set_partition(&params, &mut rng).unwrap();
        let lp = &instance.program;

        assert_eq!(lp.num_variables(), 12);
        assert_eq!(lp.num_constraints(), 8);
        assert!(lp.b().iter().all(|&v| v == 1.0));
        assert!(lp.c().iter().all(|&c| (5.0..=9.0).contains(&c)));
        assert_eq!(instance.sets.len(), 12);
        for (j, set) in instance.sets.iter().enumerate() {
            assert!(!set.is_empty());
            for i in 0..8 {
                let expected = if set.contains(&i) { 1.0 } else { 0.0 };
                assert_eq!(lp.a()[i][j], expected);
            }
        }
    }

    #[test]
    fn test_known_solutions_are_feasible() {
        let mut rng = StdRng::seed_from_u64(99);
        let params = SetPartitionParams {
            n_sets: 15,
            n_elements: 10,
            ..SetPartitionParams::default()
        };
        let instance = generate_set_partition(&params, &mut rng).unwrap();
        assert!(!instance.known_solutions.is_empty());

        let lp = &instance.program;
        let known = &instance.known_solutions[0];
        let noise: Vec<Vec<u8>> = vec![vec![0; 15], vec![1; 15]];

        let candidates: Vec<&[u8]> = noise
            .iter()
            .map(Vec::as_slice)
            .chain(std::iter::once(known.as_slice()))
            .collect();
        let result = lp.check_feasibility(candidates).unwrap();

        assert!(result.found);
        assert_eq!(result.value, lp.objective_value(&result.solution));
        assert!(lp.objective_value(known) >= result.value);
        for x in &instance.known_solutions {
            assert!(lp.is_feasible(x).unwrap());
        }
    }

    #[test]
    fn test_sampled_violation_scores_are_frequencies() {
        let mut rng = StdRng::seed_from_u64(5);
        let params = SetPartitionParams {
            n_sets: 15,
            n_elements: 10,
            ..SetPartitionParams::default()
        };
        let instance = generate_set_partition(&params, &mut rng).unwrap();
        let lp = &instance.program;

        let mut samples = SampleSet::new();
        for _ in 0..500 {
            let bits: Vec<u8> = (0..15).map(|_| u8::from(rng.gen_bool(0.3))).collect();
            samples.record(bits);
        }
        samples.record_many(instance.known_solutions[0].clone(), 250);

        let scores = lp.sample_violation_scores(&samples).unwrap();
        assert_eq!(scores.len(), 10);
        assert!(
            scores.iter().all(|s| (0.0..=1.0).contains(s)),
            "scores out of range: {:?}",
            scores
        );
        // A third of the population is feasible, so no row is violated by every draw
        assert!(scores.iter().all(|&s| s <= 500.0 / 750.0 + 1e-12));

        let feasible_only: SampleSet = std::iter::once((instance.known_solutions[0].clone(), 7)).collect();
        assert_eq!(lp.sample_violation_scores(&feasible_only).unwrap(), vec![0.0; 10]);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        let params = SetPartitionParams {
            min_cost: 10,
            max_cost: 1,
            ..SetPartitionParams::default()
        };
        assert!(matches!(
            generate_set_partition(&params, &mut rng),
            Err(GenerateError::InvalidParameters(_))
        ));

        let params = SetPartitionParams {
            n_sets: 0,
            ..SetPartitionParams::default()
        };
        assert!(generate_set_partition(&params, &mut rng).is_err());
    }

    #[test]
    fn test_not_enough_unique_sets() {
        let mut rng = StdRng::seed_from_u64(0);
        // Only three distinct singletons exist over three elements
        let params = SetPartitionParams {
            n_sets: 5,
            n_elements: 3,
            min_set_size: 1,
            max_set_size: 1,
            min_cost: 1,
            max_cost: 1,
        };
        assert_eq!(
            generate_set_partition(&params, &mut rng).unwrap_err(),
            GenerateError::NotEnoughSets { requested: 5, found: 3 }
        );
    }
}
