/// Best feasible candidate found in a batch.
///
/// When nothing is feasible, `solution` is empty and `value` is `f64::INFINITY`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Feasibility {
    pub found: bool,
    pub solution: Vec<u8>,
    pub value: f64,
}

impl Feasibility {
    pub fn not_found() -> Self {
        Self {
            found: false,
            solution: Vec::new(),
            value: f64::INFINITY,
        }
    }
}

/// Terminal state of a constraint generation run
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A sample satisfied every original constraint
    FeasibleFound,
    /// Every constraint was active and no sample was feasible
    ExhaustedConstraints,
    /// The iteration budget ran out
    MaxItersReached,
}

/// Result of a constraint generation or reference-mode run
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub termination: Termination,
    /// Best feasible sample, or the not-found sentinel
    pub best: Feasibility,
    /// Completed oracle round trips
    pub iterations: usize,
    /// Constraint indices in the order they were activated
    pub activated: Vec<usize>,
}

impl GenerationOutcome {
    pub fn found(&self) -> bool {
        self.best.found
    }
}

/// Result of an exact reference solve
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal assignment (empty when infeasible)
    pub values: Vec<u8>,
    /// Optimal objective value
    pub objective_value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// No binary assignment satisfies the constraints
    Infeasible,
}

impl Solution {
    pub fn infeasible() -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::INFINITY,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }
}

/// Relative gap of `value` to `reference`, in percent.
/// Infinite when the reference is zero.
pub fn relative_gap(value: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return f64::INFINITY;
    }
    (value - reference) / reference * 100.0
}
