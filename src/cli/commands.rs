// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `run` and `plan`, and their
// flags. Flags given on the command line override the values
// in the experiment spec file.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::spec_loader::ExperimentSpec;

/// The top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a train-test experiment and write its result tables
    Run(RunArgs),

    /// List the work units an experiment would execute
    Plan(PlanArgs),
}

/// Arguments for the `run` command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Experiment spec (JSON)
    #[arg(long)]
    pub spec: PathBuf,

    /// Global results CSV, overriding the spec's output_file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Per-user results CSV, overriding the spec's user_output_file
    #[arg(long)]
    pub user_output: Option<PathBuf>,

    /// Persistent model cache directory, overriding the spec's cache_directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    pub threads: Option<usize>,
}

impl RunArgs {
    /// Apply command-line overrides to a loaded spec.
    pub fn apply_to(&self, spec: &mut ExperimentSpec) {
        if let Some(output) = &self.output {
            spec.output_file = Some(output.clone());
        }
        if let Some(user_output) = &self.user_output {
            spec.user_output_file = Some(user_output.clone());
        }
        if let Some(cache_dir) = &self.cache_dir {
            spec.cache_directory = Some(cache_dir.clone());
        }
        if let Some(threads) = self.threads {
            spec.threads = Some(threads);
        }
    }
}

/// Arguments for the `plan` command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Experiment spec (JSON)
    #[arg(long)]
    pub spec: PathBuf,
}
