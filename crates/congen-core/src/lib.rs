mod energy;
mod engine;
mod error;
mod exact;
mod generate;
mod oracle;
mod problem;
mod sampler;
mod solution;

pub use energy::{EnergyModel, FIELD_BIAS, spin_of_bit};
pub use engine::{ConstraintGeneration, activate_adaptively};
pub use error::{EngineError, GenerateError, OracleError, ProblemError, SolveError};
pub use exact::ExhaustiveSolver;
pub use generate::{GeneratedInstance, SetPartitionParams, generate_set_partition};
pub use oracle::{SampleSet, SamplingOracle, TunedResult};
pub use problem::{FEASIBILITY_TOLERANCE, LinearProgram};
pub use sampler::{ProductStateSampler, expected_energy};
pub use solution::{Feasibility, GenerationOutcome, Solution, SolutionStatus, Termination, relative_gap};
