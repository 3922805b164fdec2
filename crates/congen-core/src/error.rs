use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Constraint index {index} out of range for {count} constraints")]
    ConstraintIndex { index: usize, count: usize },
    #[error("Candidate has {found} entries but the program has {expected} variables")]
    CandidateLength { expected: usize, found: usize },
    #[error("Candidate entry {value} at position {position} is not binary")]
    NonBinaryEntry { position: usize, value: u8 },
}

/// Failures reported by a sampling oracle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Parameter tuning failed: {0}")]
    Tuning(String),
    #[error("Sampling failed: {0}")]
    Sampling(String),
    #[error("Oracle returned a sample of length {found}, expected {expected}")]
    SampleLength { expected: usize, found: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Exhaustive search over {n} variables exceeds the limit of {limit}")]
    TooManyVariables { n: usize, limit: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    #[error("Invalid generator parameters: {0}")]
    InvalidParameters(String),
    #[error("Could not generate {requested} unique sets, only found {found}. Try widening the set size range.")]
    NotEnoughSets { requested: usize, found: usize },
    #[error(transparent)]
    Problem(#[from] ProblemError),
}
