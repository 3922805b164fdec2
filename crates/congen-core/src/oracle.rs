use std::collections::BTreeMap;

use crate::energy::EnergyModel;
use crate::error::OracleError;

/// Outcome of tuning an oracle's variational parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TunedResult {
    /// `false` signals non-convergence; the parameters are still usable
    pub success: bool,
    /// Parameters to sample with, opaque to the engine
    pub params: Vec<f64>,
    /// Final value of the tuning objective
    pub objective: f64,
}

/// A multiset of bit-vectors, stored as unique vectors with occurrence counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    counts: BTreeMap<Vec<u8>, u64>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one draw of `bits`
    pub fn record(&mut self, bits: Vec<u8>) {
        self.record_many(bits, 1);
    }

    pub fn record_many(&mut self, bits: Vec<u8>, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(bits).or_insert(0) += count;
    }

    /// Number of unique bit-vectors
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all occurrence counts
    pub fn total_weight(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, bits: &[u8]) -> u64 {
        self.counts.get(bits).copied().unwrap_or(0)
    }

    /// Unique bit-vectors in lexicographic order
    pub fn unique(&self) -> impl Iterator<Item = &[u8]> {
        self.counts.keys().map(Vec::as_slice)
    }

    /// Unique bit-vectors paired with their counts as weights
    pub fn weighted(&self) -> impl Iterator<Item = (&[u8], f64)> {
        self.counts.iter().map(|(bits, &count)| (bits.as_slice(), count as f64))
    }

    /// The `k` most frequent samples, most frequent first
    pub fn most_frequent(&self, k: usize) -> Vec<(&[u8], u64)> {
        let mut entries: Vec<_> = self.counts.iter().map(|(b, &c)| (b.as_slice(), c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(k);
        entries
    }
}

impl FromIterator<(Vec<u8>, u64)> for SampleSet {
    fn from_iter<T: IntoIterator<Item = (Vec<u8>, u64)>>(iter: T) -> Self {
        let mut set = SampleSet::new();
        for (bits, count) in iter {
            set.record_many(bits, count);
        }
        set
    }
}

/// A combinatorial sampler proposing candidate assignments for an energy model.
///
/// Calls are blocking; a failed call is propagated by the engine without retry.
pub trait SamplingOracle {
    /// Number of variational parameters used for a model over `num_spins` spins
    fn param_count(&self, num_spins: usize) -> usize;

    /// Minimize the expected energy of `model`, starting from `initial_params`
    fn tune(
        &mut self,
        model: &EnergyModel,
        sample_size: usize,
        initial_params: &[f64],
    ) -> Result<TunedResult, OracleError>;

    /// Draw `sample_size` bit-vectors from the distribution defined by `tuned`
    fn sample(&mut self, tuned: &TunedResult, sample_size: usize) -> Result<SampleSet, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_set_coalesces_duplicates() {
        let mut set = SampleSet::new();
        set.record(vec![1, 0]);
        set.record(vec![0, 1]);
        set.record(vec![1, 0]);
        set.record_many(vec![1, 1], 0);

        assert_eq!(set.len(), 2);
        assert_eq!(set.total_weight(), 3);
        assert_eq!(set.count(&[1, 0]), 2);
        assert_eq!(set.count(&[1, 1]), 0);
        assert_eq!(set.most_frequent(1), vec![([1u8, 0].as_slice(), 2)]);
    }

    #[test]
    fn test_sample_set_from_iter() {
        let set: SampleSet = vec![(vec![0, 0], 4), (vec![0, 0], 1), (vec![1, 0], 5)]
            .into_iter()
            .collect();
        assert_eq!(set.total_weight(), 10);
        let unique: Vec<_> = set.unique().collect();
        assert_eq!(unique, vec![[0u8, 0].as_slice(), [1u8, 0].as_slice()]);
    }
}
