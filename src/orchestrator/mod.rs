//! Drives a built pipeline: assigns sample ids, submits records, logs per-tree scores, then closes the pipeline
//! with sentinels and drains the class scores.

mod drain;
mod records;

use std::io::{BufRead, Write};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use drain::Drain;
pub use records::{format_scores, parse_record, RecordError};

use crate::{
    channel::EnqueueError,
    config::{ConfigError, TestbenchConfig},
    context::Diagnostic,
    datastructures::{Identifiable, VerboseIdentifier},
    model::{EnsembleDescription, Evaluator},
    packet::{Packet, Score, TreeScorePacket},
    routing::{tee, TeeError},
    simulation::{
        Executed, InitializationError, InitializationOptions, ProgramBuilder, RunOptions,
    },
    topology::{BankPlan, DriverPorts, Topology, TopologyBuilder, TopologyError},
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error("unable to read input: {0}")]
    Input(std::io::Error),

    #[error("unable to write output: {0}")]
    Output(std::io::Error),

    #[error("pipeline stopped accepting packets: {0}")]
    Enqueue(#[from] EnqueueError),

    #[error("pipeline stopped producing tree scores: {0}")]
    Tee(#[from] TeeError),

    #[error("{failed} stage(s) failed, first was {first}")]
    Stages { failed: usize, first: String },

    #[error("the pipeline runner panicked")]
    Panicked,
}

/// Round-robin sample identities. The first id handed out is 0 and ids wrap after `budget` of them.
#[derive(Debug, Clone)]
pub struct SampleIds {
    budget: usize,
    previous: usize,
}

impl SampleIds {
    pub fn new(budget: usize) -> Self {
        let budget = budget.max(1);
        Self {
            budget,
            previous: budget - 1,
        }
    }
}

impl Iterator for SampleIds {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.previous = (self.previous + 1) % self.budget;
        Some(self.previous)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StageDiagnostic {
    pub stage: VerboseIdentifier,
    pub diagnostic: Diagnostic,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    /// Records that entered the pipeline.
    pub submitted: usize,
    /// Malformed records that were skipped.
    pub skipped: usize,
    pub blank: usize,
    /// Rows written to the results log.
    pub rows: usize,
    /// Result cells rendered as `NaN` because their class had nothing ready.
    pub not_ready: usize,
    pub diagnostics: Vec<StageDiagnostic>,
}

/// Totals collected on the driver side.
#[derive(Debug, Default)]
struct Tally {
    submitted: usize,
    skipped: usize,
    blank: usize,
    rows: usize,
    not_ready: usize,
}

pub struct Orchestrator {
    config: TestbenchConfig,
    evaluators: Option<Vec<Evaluator>>,
    biases: Option<Vec<Score>>,
}

impl Orchestrator {
    pub fn new(config: TestbenchConfig) -> Self {
        Self {
            config,
            evaluators: None,
            biases: None,
        }
    }

    /// Evaluates with the trees and biases of `model`, which also fixes the pipeline width.
    pub fn with_model(mut self, model: &EnsembleDescription) -> Self {
        self.config.apply_model(model);
        self.evaluators = Some(model.evaluators());
        self.biases = Some(
            (0..model.class_streams())
                .map(|class| model.bias(class))
                .collect(),
        );
        self
    }

    pub fn with_evaluators(mut self, evaluators: Vec<Evaluator>) -> Self {
        self.evaluators = Some(evaluators);
        self
    }

    pub fn config(&self) -> &TestbenchConfig {
        &self.config
    }

    /// Builds the pipeline, runs it on its own threads and drives it from the calling thread.
    pub fn execute<R, W, V>(
        self,
        input: R,
        results: &mut W,
        verbose: &mut V,
    ) -> Result<RunReport, OrchestratorError>
    where
        R: BufRead,
        W: Write,
        V: Write,
    {
        self.config.validate()?;

        let mut program = ProgramBuilder::default();
        let mut builder = TopologyBuilder::new(self.config.shape());
        if let Some(evaluators) = self.evaluators {
            builder = builder.with_evaluators(evaluators);
        }
        if let Some(biases) = self.biases {
            builder = builder.with_biases(biases);
        }
        let Topology { ports, plan, .. } = builder.build(&mut program)?;
        let initialized = program.initialize(InitializationOptions::default())?;
        let options = RunOptions {
            mode: self.config.run_mode,
        };

        let config = &self.config;
        let (driven, executed) = std::thread::scope(|s| {
            let running = s.spawn(move || initialized.run(options));
            // Returning drops every port, which lets the program wind down even when driving failed.
            let driven = drive(config, ports, &plan, input, results, verbose);
            (driven, running.join())
        });

        let executed = executed.map_err(|_| OrchestratorError::Panicked)?;
        check_stages(&executed)?;
        let tally = driven?;

        let diagnostics = executed
            .diagnostics()
            .map(|(stage, diagnostic)| StageDiagnostic {
                stage: stage.clone(),
                diagnostic: diagnostic.clone(),
            })
            .collect();
        Ok(RunReport {
            submitted: tally.submitted,
            skipped: tally.skipped,
            blank: tally.blank,
            rows: tally.rows,
            not_ready: tally.not_ready,
            diagnostics,
        })
    }
}

fn check_stages(executed: &Executed) -> Result<(), OrchestratorError> {
    if executed.passed() {
        return Ok(());
    }
    executed.dump_failures();
    let failures = executed.failures();
    Err(OrchestratorError::Stages {
        failed: failures.len(),
        first: failures
            .first()
            .map(|failure| format!("{}: {:#}", failure.id, failure.error))
            .unwrap_or_default(),
    })
}

fn drive<R, W, V>(
    config: &TestbenchConfig,
    ports: DriverPorts,
    plan: &BankPlan,
    input: R,
    results: &mut W,
    verbose: &mut V,
) -> Result<Tally, OrchestratorError>
where
    R: BufRead,
    W: Write,
    V: Write,
{
    let DriverPorts {
        driver,
        samples,
        bank_commands,
        mut tree_scores,
        score_taps,
        class_inputs,
        mut class_scores,
    } = ports;
    debug!(driver = %driver.verbose(), "driving pipeline");

    for command in plan.commands() {
        bank_commands.enqueue(command)?;
    }
    drop(bank_commands);

    let mut tally = Tally::default();
    let mut ids = SampleIds::new(config.max_parallel_samples);
    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(OrchestratorError::Input)?;
        let features = match parse_record(&line, config.n_features) {
            Ok(Some(features)) => features,
            Ok(None) => {
                tally.blank += 1;
                continue;
            }
            Err(err) => {
                warn!(line = index + 1, "{err}, skipping record");
                tally.skipped += 1;
                continue;
            }
        };
        if tally.submitted % config.checkpoint == 0 {
            info!("Processing input {}", tally.submitted);
        }

        let id = ids.next().unwrap_or_default();
        samples.enqueue(Packet::new(id, features.into()))?;

        let mut round = Vec::with_capacity(tree_scores.len());
        for (scores, tap) in tree_scores.iter_mut().zip(&score_taps) {
            round.push(Some(tee(scores, tap)?.score));
        }
        writeln!(verbose, "{}", format_scores(round)).map_err(OrchestratorError::Output)?;
        tally.submitted += 1;
    }

    drop(samples);
    drop(score_taps);
    for (class, input) in class_inputs.into_iter().enumerate() {
        input.enqueue(TreeScorePacket::sentinel().with_dest(class))?;
    }

    for row in Drain::new(&mut class_scores, config.drain_mode, config.completion) {
        tally.not_ready += row.iter().filter(|cell| cell.is_none()).count();
        writeln!(results, "{}", format_scores(row)).map_err(OrchestratorError::Output)?;
        tally.rows += 1;
    }
    results.flush().map_err(OrchestratorError::Output)?;
    verbose.flush().map_err(OrchestratorError::Output)?;

    info!(
        submitted = tally.submitted,
        skipped = tally.skipped,
        rows = tally.rows,
        "drain complete"
    );
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstantScore, FeatureWeight};

    #[test]
    fn ids_cycle_through_the_budget() {
        let ids: Vec<_> = SampleIds::new(3).take(8).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2, 0, 1]);
        assert!(SampleIds::new(1).take(4).all(|id| id == 0));
    }

    fn config(n_trees: usize, n_classes: usize, banks: usize) -> TestbenchConfig {
        TestbenchConfig {
            n_trees,
            n_classes,
            bank_count: banks,
            ..Default::default()
        }
    }

    #[test]
    fn three_records_end_to_end() {
        let evaluators = (0..4)
            .map(|slot| {
                FeatureWeight {
                    feature: slot % 2,
                    weight: (slot + 1) as f64,
                }
                .into()
            })
            .collect();
        let orchestrator = Orchestrator::new(config(2, 2, 2)).with_evaluators(evaluators);

        let input = "1 2\n\n3,4\n5 6\n";
        let mut results = vec![];
        let mut verbose = vec![];
        let report = orchestrator
            .execute(input.as_bytes(), &mut results, &mut verbose)
            .unwrap();

        let verbose = String::from_utf8(verbose).unwrap();
        let lines: Vec<_> = verbose.lines().collect();
        assert_eq!(lines, vec!["1 4 3 8", "3 8 9 16", "5 12 15 24"]);
        let results = String::from_utf8(results).unwrap();
        assert_eq!(results.lines().collect::<Vec<_>>(), vec!["4 12", "12 24", "20 36"]);

        assert_eq!(report.submitted, 3);
        assert_eq!(report.blank, 1);
        assert_eq!(report.rows, 3);
        assert_eq!(report.not_ready, 0);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn skips_malformed_records() {
        let mut cfg = config(1, 1, 1);
        cfg.n_features = Some(2);
        let orchestrator =
            Orchestrator::new(cfg).with_evaluators(vec![ConstantScore(0.5).into()]);
        let mut results = vec![];
        let mut verbose = vec![];
        let report = orchestrator
            .execute("1 2\n1 x\n1 2 3\n4 5\n".as_bytes(), &mut results, &mut verbose)
            .unwrap();
        assert_eq!(report.submitted, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(String::from_utf8(results).unwrap(), "0.5\n0.5\n");
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let mut cfg = config(1, 1, 1);
        cfg.bank_count = 0;
        let result = Orchestrator::new(cfg).execute("1\n".as_bytes(), &mut std::io::sink(), &mut std::io::sink());
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn evaluator_count_must_match() {
        let result = Orchestrator::new(config(2, 1, 1))
            .with_evaluators(vec![ConstantScore(1.0).into()])
            .execute("1\n".as_bytes(), &mut std::io::sink(), &mut std::io::sink());
        assert!(matches!(
            result,
            Err(OrchestratorError::Topology(TopologyError::Arity { .. }))
        ));
    }
}
