//! Runs a tree-ensemble inference pipeline over a file of feature vectors.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::{error, warn};
use treebench::{
    config::{load_config, PartialConfig},
    logging::init_tracing,
    model::EnsembleDescription,
    orchestrator::Orchestrator,
    testbench::{run_testbench, TestbenchError, TestbenchPaths},
};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Streaming dataflow testbench for tree-ensemble inference")]
struct Cli {
    /// Feature vectors, one record per line.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Ensemble description (JSON). Fixes the number of trees and classes.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Extra configuration file (TOML), applied over any treebench.toml found.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where class scores are written.
    #[arg(long)]
    results: Option<PathBuf>,

    /// Where raw per-tree scores are written.
    #[arg(long)]
    verbose_log: Option<PathBuf>,

    /// Use the co-simulation log names.
    #[arg(long)]
    cosim: bool,

    /// Number of banks distributing samples to trees.
    #[arg(long)]
    banks: Option<usize>,

    /// Number of sample ids in flight.
    #[arg(long)]
    max_parallel_samples: Option<usize>,

    /// Also write a JSON run report here.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn paths(&self) -> TestbenchPaths {
        let standard = TestbenchPaths::standard(self.cosim);
        TestbenchPaths {
            input: self.input.clone().unwrap_or(standard.input),
            results: self.results.clone().unwrap_or(standard.results),
            verbose_log: self.verbose_log.clone().unwrap_or(standard.verbose_log),
            report: self.report.clone(),
        }
    }

    fn overrides(&self) -> PartialConfig {
        PartialConfig {
            bank_count: self.banks,
            max_parallel_samples: self.max_parallel_samples,
            ..Default::default()
        }
    }
}

fn run(cli: &Cli) -> Result<(), TestbenchError> {
    let mut config = load_config(cli.config.as_deref())?;
    let model = cli
        .model
        .as_deref()
        .map(EnsembleDescription::load)
        .transpose()?;
    if let Some(model) = &model {
        config.apply_model(model);
    }
    config.update(cli.overrides());
    config.validate()?;

    let mut orchestrator = Orchestrator::new(config);
    if let Some(model) = &model {
        orchestrator = orchestrator.with_model(model);
    }
    let report = run_testbench(orchestrator, &cli.paths())?;
    for entry in &report.diagnostics {
        warn!(stage = %entry.stage, "{}", entry.diagnostic);
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
