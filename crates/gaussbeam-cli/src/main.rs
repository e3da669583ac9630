//! gaussbeam command-line interface.
//!
//! Propagate, analyse and optimise optical benches described in TOML:
//! ```sh
//! gaussbeam-cli run job.toml
//! gaussbeam-cli validate job.toml
//! gaussbeam-cli optics
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gaussbeam_core::OpticsType;

#[derive(Parser)]
#[command(name = "gaussbeam-cli")]
#[command(about = "gaussbeam: Gaussian beam propagation through ABCD optics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tasks of a TOML job file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for the magic waist search (overrides config file setting).
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a job file and the bench it describes without running tasks.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the element types a job file can use.
    Optics,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output, seed } => {
            println!("gaussbeam bench runner");
            println!("======================");
            let mut job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());
            if seed.is_some() {
                job.tasks.seed = seed;
            }

            let result = runner::run_job(&job)?;
            if let Some(residue) = result.fit_residue {
                log::info!("fit residue {:.3e}", residue);
            }
            if result.magic_waist == Some(false) || result.local_optimum == Some(false) {
                log::warn!("target overlap {} not reached", result.bench.target_overlap());
            }

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.beams_csv {
                runner::write_beams_csv(&result.bench, &out_dir.join("beams.csv"), &job)?;
            }
            if job.output.snapshot_json {
                runner::write_snapshot_json(&result.bench, &out_dir.join("bench.json"))?;
            }

            println!("Run complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let bench = runner::build_bench(&job)?;
            println!(
                "Configuration is valid: {} ({} elements, {} fits)",
                config.display(),
                bench.n_optics(),
                bench.n_fits()
            );
            Ok(())
        }
        Commands::Optics => {
            println!("Element types (`type = ...` in [[optics]]):");
            println!();
            for optics_type in [
                OpticsType::CreateBeam,
                OpticsType::FreeSpace,
                OpticsType::Lens,
                OpticsType::FlatMirror,
                OpticsType::CurvedMirror,
                OpticsType::FlatInterface,
                OpticsType::CurvedInterface,
                OpticsType::DielectricSlab,
                OpticsType::GenericAbcd,
            ] {
                println!("  {:<18} {}", runner::type_tag(optics_type), runner::type_fields(optics_type));
            }
            Ok(())
        }
    }
}
