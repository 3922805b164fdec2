mod logging;
mod runner;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;

use logging::{LogFormat, LoggingConfig};
use runner::RunOptions;

#[derive(Parser)]
#[command(name = "congen")]
#[command(about = "Constraint generation for binary linear programs with a sampling oracle", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log level filter (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run constraint generation on every instance of a JSON config
    Run {
        /// The configuration file (single run or batch)
        config: PathBuf,
        /// Nominal activation threshold
        #[arg(short, long, default_value_t = 0.0)]
        threshold: f64,
        /// Maximum constraint generation iterations
        #[arg(long = "max-iters", default_value_t = 1000)]
        max_iters: usize,
        /// Only run the exact reference solver
        #[arg(long = "ref")]
        use_ref: bool,
        /// Skip the all-constraints reference run
        #[arg(long)]
        no_compare_ref: bool,
        /// Seed for instance generation, initial parameters and sampling
        #[arg(long)]
        seed: Option<u64>,
        /// Directory receiving run results
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Summarize every result.json under a directory
    Analyze {
        /// The results directory
        dir: PathBuf,
    },
    /// Check an MPS file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
    /// Generate a random set partitioning instance as MPS
    Generate {
        /// Number of sets (variables)
        #[arg(long)]
        sets: usize,
        /// Number of elements (constraints)
        #[arg(long)]
        elements: usize,
        #[arg(long, default_value_t = 1)]
        min_size: usize,
        #[arg(long, default_value_t = 10)]
        max_size: usize,
        #[arg(long, default_value_t = 1)]
        min_cost: i64,
        #[arg(long, default_value_t = 100)]
        max_cost: i64,
        #[arg(long)]
        seed: Option<u64>,
        /// Output file
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
    }
    .init();

    match cli.command {
        Commands::Run {
            config,
            threshold,
            max_iters,
            use_ref,
            no_compare_ref,
            seed,
            output_dir,
        } => {
            let config = match congen_io::Config::load(&config) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Config error: {}", e);
                    std::process::exit(1);
                }
            };

            let options = RunOptions {
                threshold,
                max_iterations: max_iters,
                use_ref,
                compare_ref: !no_compare_ref,
                seed,
                output_dir,
            };

            match runner::run_config(&config, &options, &runner::timestamp()) {
                Ok(records) => {
                    for record in &records {
                        let found = |r: &Option<congen_io::MethodResult>| match r {
                            Some(m) if m.found => m.value.map(|v| format!("{}", v)).unwrap_or_default(),
                            Some(_) => "no feasible solution".to_string(),
                            None => "-".to_string(),
                        };
                        println!("{} ({} variables, {} constraints)", record.instance, record.num_variables, record.num_constraints);
                        println!("  constraint generation: {}", found(&record.constraint_generation));
                        println!("  reference mode:        {}", found(&record.reference));
                        println!("  exact:                 {}", found(&record.exact));
                    }
                }
                Err(e) => {
                    eprintln!("Run error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Analyze { dir } => match congen_io::analyze_dir(&dir) {
            Ok(summary) => print!("{}", summary),
            Err(e) => {
                eprintln!("Analyze error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Check { file } => match congen_io::read_mps(&file) {
            Ok(model) => {
                let program = &model.program;
                println!("✓ {} is valid", file.display());
                if let Some(name) = &model.name {
                    println!("  name {}", name);
                }
                println!("  {} constraints", program.num_constraints());
                println!("  {} variables", program.num_variables());
                println!("  {:.2}% density", program.density() * 100.0);
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file.display());
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        },
        Commands::Generate {
            sets,
            elements,
            min_size,
            max_size,
            min_cost,
            max_cost,
            seed,
            out,
        } => {
            let params = congen_core::SetPartitionParams {
                n_sets: sets,
                n_elements: elements,
                min_set_size: min_size,
                max_set_size: max_size,
                min_cost,
                max_cost,
            };
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let instance = match congen_core::generate_set_partition(&params, &mut rng) {
                Ok(i) => i,
                Err(e) => {
                    eprintln!("Generate error: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = congen_io::write_mps(&instance.program, "SET_PARTITION", &out) {
                eprintln!("Error writing file: {}", e);
                std::process::exit(1);
            }

            println!("✓ wrote {}", out.display());
            println!("  {} sets, {} elements", sets, elements);
            println!("  {} known feasible partitions", instance.known_solutions.len());
        }
    }
}
