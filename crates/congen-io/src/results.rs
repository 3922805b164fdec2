//! Per-run `result.json` records and summaries over result directories.

use std::fmt;
use std::path::{Path, PathBuf};

use congen_core::{GenerationOutcome, Solution, Termination, relative_gap};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::IoError;

pub const RESULT_FILE: &str = "result.json";

/// Outcome of one solution method on one instance.
///
/// `value` is `None` when nothing feasible was found, since JSON has no infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub found: bool,
    pub solution: Vec<u8>,
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
}

impl MethodResult {
    pub fn from_outcome(outcome: &GenerationOutcome) -> Self {
        Self {
            found: outcome.found(),
            solution: outcome.best.solution.clone(),
            value: outcome.found().then_some(outcome.best.value),
            iterations: Some(outcome.iterations),
            activated: Some(outcome.activated.clone()),
            termination: Some(outcome.termination),
        }
    }

    pub fn from_solution(solution: &Solution) -> Self {
        Self {
            found: solution.is_optimal(),
            solution: solution.values.clone(),
            value: solution.is_optimal().then_some(solution.objective_value),
            iterations: None,
            activated: None,
            termination: None,
        }
    }
}

/// Everything recorded about a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub instance: String,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub sample_size: usize,
    pub threshold: f64,
    #[serde(default)]
    pub constraint_generation: Option<MethodResult>,
    #[serde(default)]
    pub reference: Option<MethodResult>,
    #[serde(default)]
    pub exact: Option<MethodResult>,
}

/// Serialize `value` as pretty JSON into `path`
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let text = std::fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `record` as `result.json` inside `run_dir`, creating the directory
pub fn write_record(run_dir: &Path, record: &RunRecord) -> Result<PathBuf, IoError> {
    std::fs::create_dir_all(run_dir).map_err(|source| IoError::Write {
        path: run_dir.to_path_buf(),
        source,
    })?;
    let path = run_dir.join(RESULT_FILE);
    write_json(&path, record)?;
    debug!(path = %path.display(), "wrote run record");
    Ok(path)
}

/// Every `result.json` below `dir`, in sorted path order
pub fn find_records(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| IoError::Read {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| IoError::Read {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.file_name().is_some_and(|name| name == RESULT_FILE) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Aggregate over one solution method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
    pub name: &'static str,
    /// Runs in which the method was executed
    pub attempted: usize,
    pub feasible: usize,
    pub mean_value: Option<f64>,
    /// Mean relative gap to the exact solver in percent, over runs where both succeeded
    pub mean_gap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub runs: usize,
    pub methods: Vec<MethodSummary>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn summarize_method(
    name: &'static str,
    records: &[RunRecord],
    pick: fn(&RunRecord) -> Option<&MethodResult>,
) -> MethodSummary {
    let mut attempted = 0;
    let mut values = Vec::new();
    let mut gaps = Vec::new();

    for record in records {
        let Some(result) = pick(record) else {
            continue;
        };
        attempted += 1;
        let Some(value) = result.value.filter(|_| result.found) else {
            continue;
        };
        values.push(value);

        if let Some(exact) = record.exact.as_ref().and_then(|e| e.value) {
            let gap = relative_gap(value, exact);
            if gap.is_finite() {
                gaps.push(gap);
            }
        }
    }

    MethodSummary {
        name,
        attempted,
        feasible: values.len(),
        mean_value: mean(&values),
        mean_gap: mean(&gaps),
    }
}

/// Summarize a set of run records per method
pub fn summarize(records: &[RunRecord]) -> Summary {
    Summary {
        runs: records.len(),
        methods: vec![
            summarize_method("constraint_generation", records, |r| r.constraint_generation.as_ref()),
            summarize_method("reference", records, |r| r.reference.as_ref()),
            summarize_method("exact", records, |r| r.exact.as_ref()),
        ],
    }
}

/// Read every `result.json` below `dir` and summarize them.
///
/// Unreadable records are skipped with a warning.
pub fn analyze_dir(dir: &Path) -> Result<Summary, IoError> {
    let mut records = Vec::new();
    for path in find_records(dir)? {
        match read_json::<RunRecord>(&path) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, "skipping unreadable run record"),
        }
    }
    Ok(summarize(&records))
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, suffix),
        None => "-".to_string(),
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Runs: {}", self.runs)?;
        writeln!(
            f,
            "{:<24} {:>9} {:>9} {:>12} {:>10}",
            "method", "attempted", "feasible", "mean value", "mean gap"
        )?;
        for m in &self.methods {
            writeln!(
                f,
                "{:<24} {:>9} {:>9} {:>12} {:>10}",
                m.name,
                m.attempted,
                m.feasible,
                fmt_opt(m.mean_value, ""),
                fmt_opt(m.mean_gap, "%"),
            )?;
        }
        Ok(())
    }
}
