//! File-backed runs: the layout and behaviour of the command line testbench.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::{
    config::ConfigError,
    model::ModelError,
    orchestrator::{Orchestrator, OrchestratorError, RunReport},
};

const DATA_DIR: &str = "tb_data";

#[derive(Debug, Error)]
pub enum TestbenchError {
    #[error("CRITICAL: Unable to open input file {path}: {source}")]
    InputUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to create {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to write run report {path}: {source}")]
    Report {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestbenchPaths {
    pub input: PathBuf,
    pub results: PathBuf,
    pub verbose_log: PathBuf,
    pub report: Option<PathBuf>,
}

impl TestbenchPaths {
    /// The conventional layout under `tb_data/`. Co-simulation runs log under their own names.
    pub fn standard(cosim: bool) -> Self {
        let prefix = if cosim { "cosim" } else { "csim" };
        let data = Path::new(DATA_DIR);
        Self {
            input: data.join("tb_input_features.dat"),
            results: data.join(format!("{prefix}_results.log")),
            verbose_log: data.join(format!("{prefix}_tree_results.log")),
            report: None,
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, TestbenchError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| TestbenchError::Output {
            path: path.to_path_buf(),
            source,
        })
}

/// Runs one batch from files. Nothing is written if the input cannot be opened.
pub fn run_testbench(
    orchestrator: Orchestrator,
    paths: &TestbenchPaths,
) -> Result<RunReport, TestbenchError> {
    let input = File::open(&paths.input).map_err(|source| TestbenchError::InputUnavailable {
        path: paths.input.clone(),
        source,
    })?;
    orchestrator.config().validate()?;

    let mut results = create(&paths.results)?;
    let mut verbose = create(&paths.verbose_log)?;
    let report = orchestrator.execute(BufReader::new(input), &mut results, &mut verbose)?;
    info!(
        "Saved inference results to file: {}",
        paths.results.display()
    );

    if let Some(path) = &paths.report {
        let mut writer = create(path)?;
        serde_json::to_writer_pretty(&mut writer, &report).map_err(|source| {
            TestbenchError::Report {
                path: path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(|source| TestbenchError::Output {
            path: path.clone(),
            source,
        })?;
    }
    Ok(report)
}
