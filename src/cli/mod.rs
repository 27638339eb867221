// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for command-line use, built with clap.
// All experiment logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `run`  — load a spec, run it, write the result tables
//   2. `plan` — load a spec and list its work units

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PlanArgs, RunArgs};

use crate::application::spec_loader::ExperimentSpec;
use crate::domain::table::OutputTable;

#[derive(Parser, Debug)]
#[command(
    name = "rec-eval",
    version,
    about = "Train-test evaluation of recommender algorithms."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the selected subcommand.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args)  => run_experiment(args),
            Commands::Plan(args) => plan_experiment(args),
        }
    }
}

fn run_experiment(args: RunArgs) -> Result<()> {
    let mut spec = ExperimentSpec::load(&args.spec)?;
    args.apply_to(&mut spec);

    let experiment = spec.into_builder()?.build();
    let result = experiment.run()?;

    if experiment.output_file().is_none() {
        print_table(&result.global);
    }

    let summary = result.summary;
    println!(
        "\n{} units: {} completed, {} failed ({} models built, {} cache hits)",
        summary.units, summary.completed, summary.failed, summary.model_builds, summary.cache_hits
    );
    if let Some(path) = experiment.output_file() {
        println!("Results written to '{}'", path.display());
    }
    if let Some(path) = experiment.user_output_file() {
        println!("Per-user results written to '{}'", path.display());
    }
    for failure in &result.failures {
        eprintln!("FAILED {}", failure);
    }
    Ok(())
}

fn plan_experiment(args: PlanArgs) -> Result<()> {
    let experiment = ExperimentSpec::load(&args.spec)?.into_builder()?.build();

    for unit in experiment.plan()? {
        println!("{:<48} model {}", unit.to_string(), unit.cache_key());
    }
    Ok(())
}

fn print_table(table: &OutputTable) {
    println!("{}", table.columns().join("\t"));
    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        println!("{}", cells.join("\t"));
    }
}
