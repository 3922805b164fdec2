use std::path::{Path, PathBuf};

use congen_core::{
    ConstraintGeneration, EngineError, ExhaustiveSolver, GenerateError, LinearProgram, ProductStateSampler,
    generate_set_partition, relative_gap,
};
use congen_io::{
    Config, InputType, IoError, MethodResult, RunConfig, RunRecord, read_mps, write_json, write_mps, write_record,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("Instance generation failed: {0}")]
    Generate(#[from] GenerateError),
    #[error("Constraint generation failed: {0}")]
    Engine(#[from] EngineError),
    #[error("{failed} of {total} runs failed")]
    Batch { failed: usize, total: usize },
}

/// Command-line overrides shared by every run of a configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub threshold: f64,
    pub max_iterations: usize,
    /// Only run the exact solver
    pub use_ref: bool,
    /// Also run reference mode for comparison
    pub compare_ref: bool,
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            max_iterations: 1000,
            use_ref: false,
            compare_ref: true,
            seed: None,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl RunOptions {
    fn sampler(&self) -> ProductStateSampler {
        match self.seed {
            Some(seed) => ProductStateSampler::new(seed),
            None => ProductStateSampler::from_entropy(),
        }
    }

    fn engine(&self, sample_size: usize) -> ConstraintGeneration {
        let engine = ConstraintGeneration::new()
            .with_sample_size(sample_size)
            .with_threshold(self.threshold)
            .with_max_iterations(self.max_iterations);
        match self.seed {
            Some(seed) => engine.with_seed(seed),
            None => engine,
        }
    }
}

/// Local time stamp used to name result directories
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Create a fresh directory `name` under `parent`, appending `_1`, `_2`, ...
/// when an earlier run already claimed it.
fn claim_dir(parent: &Path, name: &str) -> Result<PathBuf, RunError> {
    std::fs::create_dir_all(parent).map_err(|source| IoError::Write {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut suffix = 0;
    loop {
        let candidate = match suffix {
            0 => parent.join(name),
            n => parent.join(format!("{}_{}", name, n)),
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(source) => {
                return Err(IoError::Write {
                    path: candidate,
                    source,
                }
                .into());
            }
        }
    }
}

/// Execute every run in `config`, writing each into its own directory.
///
/// Failed runs in a batch are logged and counted; the rest still execute.
pub fn run_config(config: &Config, options: &RunOptions, stamp: &str) -> Result<Vec<RunRecord>, RunError> {
    match config {
        Config::Single(run) => {
            let dir = claim_dir(&options.output_dir, stamp)?;
            Ok(vec![run_single(run, options, &dir)?])
        }
        Config::Batch(batch) => {
            let batch_dir = claim_dir(&options.output_dir, &batch.batch_dir(stamp))?;
            let mut records = Vec::new();
            let mut failed = 0;
            for (i, run) in batch.configs.iter().enumerate() {
                info!(run = i + 1, total = batch.configs.len(), "starting batch run");
                match run_single(run, options, &batch_dir.join((i + 1).to_string())) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        error!(run = i + 1, error = %e, "run failed");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(RunError::Batch {
                    failed,
                    total: batch.configs.len(),
                });
            }
            Ok(records)
        }
    }
}

fn load_program(run: &RunConfig, options: &RunOptions, run_dir: &Path) -> Result<(String, LinearProgram), RunError> {
    match run.input_type {
        InputType::Mps => {
            // Validated configs always carry a path for MPS input
            let path = run.input_file_path.clone().unwrap_or_default();
            let model = read_mps(&path)?;
            let name = model
                .name
                .clone()
                .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "instance".to_string());
            Ok((name, model.program))
        }
        InputType::Random => {
            let random = run.random_instance_or_default();
            let mut rng = match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let instance = generate_set_partition(&random.params, &mut rng)?;
            let path = run_dir.join(format!("{}.mps", random.instance_name));
            write_mps(&instance.program, &random.instance_name, &path)?;
            info!(path = %path.display(), "wrote generated instance");
            Ok((random.instance_name, instance.program))
        }
    }
}

fn exact_solve(program: &LinearProgram) -> Option<MethodResult> {
    match ExhaustiveSolver::new().solve(program) {
        Ok(solution) => Some(MethodResult::from_solution(&solution)),
        Err(e) => {
            warn!(error = %e, "skipping exact reference solve");
            None
        }
    }
}

fn log_gap(label: &str, value: Option<f64>, reference: Option<&MethodResult>) {
    if let (Some(value), Some(reference)) = (value, reference.and_then(|r| r.value)) {
        info!(gap = %format!("{:.2}%", relative_gap(value, reference)), "gap to {}", label);
    }
}

/// Solve one configured instance and write `result.json` into `run_dir`
pub fn run_single(run: &RunConfig, options: &RunOptions, run_dir: &Path) -> Result<RunRecord, RunError> {
    std::fs::create_dir_all(run_dir).map_err(|source| IoError::Write {
        path: run_dir.to_path_buf(),
        source,
    })?;
    write_json(&run_dir.join("config.json"), run)?;

    let (instance, mut program) = load_program(run, options, run_dir)?;
    info!(
        instance = %instance,
        variables = program.num_variables(),
        constraints = program.num_constraints(),
        density = %format!("{:.2}%", program.density() * 100.0),
        "problem loaded"
    );

    let mut record = RunRecord {
        instance,
        num_variables: program.num_variables(),
        num_constraints: program.num_constraints(),
        sample_size: run.sample_size,
        threshold: options.threshold,
        constraint_generation: None,
        reference: None,
        exact: None,
    };

    if options.use_ref {
        record.exact = exact_solve(&program);
        write_record(run_dir, &record)?;
        return Ok(record);
    }

    let engine = options.engine(run.sample_size);
    if options.compare_ref {
        let outcome = engine.run_reference(&program, &mut options.sampler())?;
        record.reference = Some(MethodResult::from_outcome(&outcome));
    }
    record.exact = exact_solve(&program);

    let outcome = engine.run(&mut program, &mut options.sampler())?;
    let result = MethodResult::from_outcome(&outcome);
    info!(
        found = result.found,
        value = ?result.value,
        termination = ?outcome.termination,
        iterations = outcome.iterations,
        activated = outcome.activated.len(),
        "constraint generation finished"
    );
    log_gap("exact solver", result.value, record.exact.as_ref());
    log_gap("reference mode", result.value, record.reference.as_ref());
    record.constraint_generation = Some(result);

    write_record(run_dir, &record)?;
    Ok(record)
}
