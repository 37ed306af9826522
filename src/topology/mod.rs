//! Wiring of the full inference pipeline.
//!
//! ```text
//! samples --crossbar 1:banks--> bank[b] --BankContext--> tree_stream[slot] --TreeUnit--> tree_score[slot]
//! tree_score[slot] --tee (driver)--> score[slot] --crossbar by class--> class_input[c]
//! class_input[c] --VotingStation--> class_score[c]
//! ```
//!
//! Slots are numbered row-major, `slot = tree * n_classes + class`. The driver side of the graph is returned as
//! [DriverPorts]; every other stage is added to the [ProgramBuilder] as a context.

mod bank;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bank::{BankContext, BankPlan};

use crate::{
    channel::{Receiver, Sender},
    datastructures::ExternalEndpoint,
    model::{ConstantScore, Evaluator, TreeUnitContext, VotingStation},
    packet::{BankCommandPacket, ClassScorePacket, InputPacket, Score, TreeScorePacket},
    routing::{CrossbarContext, CrossbarError, FanPolicy},
    simulation::ProgramBuilder,
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("invalid topology shape: {0}")]
    Shape(String),

    #[error("expected {expected} {what}, got {found}")]
    Arity {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Crossbar(#[from] CrossbarError),
}

/// The sizing parameters that fix the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyShape {
    pub n_trees: usize,
    /// Number of class streams, i.e. after collapsing binary classification to one stream.
    pub n_classes: usize,
    pub bank_count: usize,
    pub max_parallel_samples: usize,
    /// Defaults to an even split of the slots over the banks.
    #[serde(default)]
    pub trees_per_bank: Option<usize>,
    /// `None` makes every channel unbounded.
    #[serde(default)]
    pub channel_capacity: Option<usize>,
}

impl TopologyShape {
    pub fn new(
        n_trees: usize,
        n_classes: usize,
        bank_count: usize,
        max_parallel_samples: usize,
    ) -> Self {
        Self {
            n_trees,
            n_classes,
            bank_count,
            max_parallel_samples,
            trees_per_bank: None,
            channel_capacity: Some(DEFAULT_CHANNEL_CAPACITY),
        }
    }

    pub fn slots(&self) -> usize {
        self.n_trees * self.n_classes
    }

    pub fn slot(&self, tree: usize, class: usize) -> usize {
        tree * self.n_classes + class
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        let named = [
            ("n_trees", self.n_trees),
            ("n_classes", self.n_classes),
            ("bank_count", self.bank_count),
            ("max_parallel_samples", self.max_parallel_samples),
        ];
        for (name, value) in named {
            if value == 0 {
                return Err(TopologyError::Shape(format!("{name} must be at least 1")));
            }
        }
        if self.trees_per_bank == Some(0) {
            return Err(TopologyError::Shape("trees_per_bank must be at least 1".into()));
        }
        if self.channel_capacity == Some(0) {
            return Err(TopologyError::Shape("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// A record of one stage and the channels it touches, used to compare topologies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageDescriptor {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub policy: Option<FanPolicy>,
}

impl StageDescriptor {
    fn new(name: impl Into<String>, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            policy: None,
        }
    }

    fn with_policy(mut self, policy: FanPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

fn labels(prefix: &str, indices: impl IntoIterator<Item = usize>) -> Vec<String> {
    indices
        .into_iter()
        .map(|index| format!("{prefix}[{index}]"))
        .collect()
}

/// The channel ends the driver holds. All of them are attached to `driver`.
pub struct DriverPorts {
    pub driver: ExternalEndpoint,
    pub samples: Sender<InputPacket>,
    pub bank_commands: Sender<BankCommandPacket>,
    /// Raw per-slot scores, read through the tee.
    pub tree_scores: Vec<Receiver<TreeScorePacket>>,
    /// Where teed scores continue towards aggregation.
    pub score_taps: Vec<Sender<TreeScorePacket>>,
    /// Driver handles on the aggregation inputs, used for sentinels.
    pub class_inputs: Vec<Sender<TreeScorePacket>>,
    pub class_scores: Vec<Receiver<ClassScorePacket>>,
}

pub struct Topology {
    pub shape: TopologyShape,
    pub plan: BankPlan,
    pub ports: DriverPorts,
    pub stages: Vec<StageDescriptor>,
}

pub struct TopologyBuilder {
    shape: TopologyShape,
    evaluators: Option<Vec<Evaluator>>,
    biases: Option<Vec<Score>>,
}

impl TopologyBuilder {
    pub fn new(shape: TopologyShape) -> Self {
        Self {
            shape,
            evaluators: None,
            biases: None,
        }
    }

    /// One evaluator per slot, row-major. Without them every tree scores 0.
    pub fn with_evaluators(mut self, evaluators: Vec<Evaluator>) -> Self {
        self.evaluators = Some(evaluators);
        self
    }

    /// One bias per class stream. Defaults to 0.
    pub fn with_biases(mut self, biases: Vec<Score>) -> Self {
        self.biases = Some(biases);
        self
    }

    pub fn build(self, program: &mut ProgramBuilder<'_>) -> Result<Topology, TopologyError> {
        let shape = self.shape;
        shape.validate()?;

        let slots = shape.slots();
        let n_classes = shape.n_classes;
        let bank_count = shape.bank_count;
        let capacity = shape.channel_capacity;

        let evaluators = match self.evaluators {
            Some(evaluators) if evaluators.len() != slots => {
                return Err(TopologyError::Arity {
                    what: "evaluators",
                    expected: slots,
                    found: evaluators.len(),
                })
            }
            Some(evaluators) => evaluators,
            None => vec![ConstantScore(0.0).into(); slots],
        };
        let biases = match self.biases {
            Some(biases) if biases.len() != n_classes => {
                return Err(TopologyError::Arity {
                    what: "biases",
                    expected: n_classes,
                    found: biases.len(),
                })
            }
            Some(biases) => biases,
            None => vec![0.0; n_classes],
        };
        let plan = BankPlan::new(slots, bank_count, shape.trees_per_bank)?;

        let driver = program.external("Orchestrator");
        let mut stages = vec![];

        // Samples fan out to every bank.
        let (samples, sample_rcv) = program.channel(capacity);
        samples.attach_sender(&driver);
        let (bank_snds, bank_rcvs): (Vec<_>, Vec<_>) =
            (0..bank_count).map(|_| program.channel(capacity)).unzip();
        let xbar = CrossbarContext::new(vec![sample_rcv], bank_snds)?;
        stages.push(
            StageDescriptor::new(
                "sample_distribution",
                vec!["samples".into()],
                labels("bank", 0..bank_count),
            )
            .with_policy(xbar.policy()),
        );
        program.add_child(xbar);

        // Control traffic is tiny and read out of step with samples, so it never applies backpressure.
        let (bank_commands, command_rcv) = program.unbounded();
        bank_commands.attach_sender(&driver);
        let (command_snds, command_rcvs): (Vec<_>, Vec<_>) =
            (0..bank_count).map(|_| program.unbounded()).unzip();
        let xbar = CrossbarContext::new(vec![command_rcv], command_snds)?;
        stages.push(
            StageDescriptor::new(
                "command_distribution",
                vec!["bank_commands".into()],
                labels("bank_command", 0..bank_count),
            )
            .with_policy(xbar.policy()),
        );
        program.add_child(xbar);

        let (stream_snds, stream_rcvs): (Vec<_>, Vec<_>) =
            (0..slots).map(|_| program.channel(capacity)).unzip();
        for (bank, (bank_samples, commands)) in bank_rcvs.into_iter().zip(command_rcvs).enumerate() {
            program.add_child(BankContext::new(
                bank,
                bank_samples,
                commands,
                stream_snds.clone(),
            ));
            stages.push(StageDescriptor::new(
                format!("bank[{bank}]"),
                vec![format!("bank[{bank}]"), format!("bank_command[{bank}]")],
                labels("tree_stream", plan.slots_for(bank).iter().copied()),
            ));
        }
        drop(stream_snds);

        let mut tree_scores = Vec::with_capacity(slots);
        for (slot, (stream, evaluator)) in stream_rcvs.into_iter().zip(evaluators).enumerate() {
            let (tree, class) = (slot / n_classes, slot % n_classes);
            let (score_snd, score_rcv) = program.channel(capacity);
            score_rcv.attach_receiver(&driver);
            program.add_child(TreeUnitContext::new(
                tree, class, evaluator, stream, score_snd,
            ));
            stages.push(StageDescriptor::new(
                format!("tree_unit[{slot}]"),
                vec![format!("tree_stream[{slot}]")],
                vec![format!("tree_score[{slot}]")],
            ));
            tree_scores.push(score_rcv);
        }

        // Teed scores are routed to their class by `dest`.
        let (score_taps, score_rcvs): (Vec<Sender<TreeScorePacket>>, Vec<_>) =
            (0..slots).map(|_| program.channel(capacity)).unzip();
        score_taps.iter().for_each(|tap| tap.attach_sender(&driver));
        let (class_inputs, class_input_rcvs): (Vec<Sender<TreeScorePacket>>, Vec<_>) =
            (0..n_classes).map(|_| program.channel(capacity)).unzip();
        let xbar = CrossbarContext::new(score_rcvs, class_inputs.clone())?;
        class_inputs.iter().for_each(|input| input.attach_sender(&driver));
        stages.push(
            StageDescriptor::new(
                "score_routing",
                labels("score", 0..slots),
                labels("class_input", 0..n_classes),
            )
            .with_policy(xbar.policy()),
        );
        program.add_child(xbar);

        // Final streams are drained only after submission ends, so they cannot be bounded.
        let (class_score_snds, class_scores): (Vec<_>, Vec<Receiver<ClassScorePacket>>) =
            (0..n_classes).map(|_| program.unbounded()).unzip();
        class_scores
            .iter()
            .for_each(|scores| scores.attach_receiver(&driver));
        for (class, ((input, output), bias)) in class_input_rcvs
            .into_iter()
            .zip(class_score_snds)
            .zip(biases)
            .enumerate()
        {
            program.add_child(VotingStation::new(
                class,
                shape.n_trees,
                bias,
                shape.max_parallel_samples,
                input,
                output,
            ));
            stages.push(StageDescriptor::new(
                format!("voting[{class}]"),
                vec![format!("class_input[{class}]")],
                vec![format!("class_score[{class}]")],
            ));
        }

        Ok(Topology {
            shape,
            plan,
            ports: DriverPorts {
                driver,
                samples,
                bank_commands,
                tree_scores,
                score_taps,
                class_inputs,
                class_scores,
            },
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        model::FeatureWeight,
        packet::Packet,
        routing::tee,
        simulation::{InitializationOptions, RunOptions},
    };

    fn shape() -> TopologyShape {
        TopologyShape::new(2, 2, 2, 4)
    }

    #[test]
    fn builds_are_deterministic() {
        let mut first = ProgramBuilder::default();
        let mut second = ProgramBuilder::default();
        let a = TopologyBuilder::new(shape()).build(&mut first).unwrap();
        let b = TopologyBuilder::new(shape()).build(&mut second).unwrap();
        assert_eq!(a.stages, b.stages);
        assert_eq!(a.plan, b.plan);

        let names: Vec<_> = a.stages.iter().map(|stage| stage.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "sample_distribution",
                "command_distribution",
                "bank[0]",
                "bank[1]",
                "tree_unit[0]",
                "tree_unit[1]",
                "tree_unit[2]",
                "tree_unit[3]",
                "score_routing",
                "voting[0]",
                "voting[1]",
            ]
        );
        assert_eq!(a.stages[0].policy, Some(FanPolicy::Broadcast));
        assert_eq!(a.stages[8].policy, Some(FanPolicy::Demux));
        assert_eq!(a.stages[3].outputs, vec!["tree_stream[2]", "tree_stream[3]"]);
        assert_eq!(a.ports.tree_scores.len(), 4);
        assert_eq!(a.ports.class_scores.len(), 2);
    }

    #[test]
    fn single_class_merges_scores() {
        let mut program = ProgramBuilder::default();
        let topology = TopologyBuilder::new(TopologyShape::new(3, 1, 1, 2))
            .build(&mut program)
            .unwrap();
        let routing = topology
            .stages
            .iter()
            .find(|stage| stage.name == "score_routing")
            .unwrap();
        assert_eq!(routing.policy, Some(FanPolicy::Merge));
    }

    #[test]
    fn rejects_bad_shapes() {
        let mut program = ProgramBuilder::default();
        assert!(matches!(
            TopologyBuilder::new(TopologyShape::new(0, 1, 1, 1)).build(&mut program),
            Err(TopologyError::Shape(_))
        ));
        assert!(matches!(
            TopologyBuilder::new(shape())
                .with_evaluators(vec![ConstantScore(1.0).into()])
                .build(&mut program),
            Err(TopologyError::Arity {
                what: "evaluators",
                expected: 4,
                found: 1
            })
        ));
        let mut capacity = shape();
        capacity.channel_capacity = Some(0);
        assert!(capacity.validate().is_err());
    }

    #[test]
    fn dropping_the_driver_tears_everything_down() {
        let mut program = ProgramBuilder::default();
        let topology = TopologyBuilder::new(shape()).build(&mut program).unwrap();
        let initialized = program
            .initialize(InitializationOptions::default())
            .unwrap();
        drop(topology);

        let executed = initialized.run(RunOptions::default());
        executed.dump_failures();
        assert!(executed.passed());
        // Three crossbars, two banks, four tree units, two voting stations.
        assert_eq!(executed.summaries().len(), 11);
    }

    #[test]
    fn one_sample_flows_end_to_end() {
        let shape = shape();
        let evaluators = (0..shape.slots())
            .map(|slot| {
                FeatureWeight {
                    feature: slot,
                    weight: 1.0,
                }
                .into()
            })
            .collect();
        let mut program = ProgramBuilder::default();
        let Topology { ports, plan, .. } = TopologyBuilder::new(shape)
            .with_evaluators(evaluators)
            .with_biases(vec![10.0, 20.0])
            .build(&mut program)
            .unwrap();
        let initialized = program
            .initialize(InitializationOptions::default())
            .unwrap();

        let DriverPorts {
            driver: _driver,
            samples,
            bank_commands,
            mut tree_scores,
            score_taps,
            class_inputs,
            mut class_scores,
        } = ports;

        std::thread::scope(|s| {
            let running = s.spawn(move || initialized.run(RunOptions::default()));

            for command in plan.commands() {
                bank_commands.enqueue(command).unwrap();
            }
            drop(bank_commands);

            samples
                .enqueue(Packet::new(0, Arc::from(vec![1.0, 2.0, 3.0, 4.0])))
                .unwrap();
            let raw: Vec<_> = tree_scores
                .iter_mut()
                .zip(&score_taps)
                .map(|(scores, tap)| tee(scores, tap).unwrap().score)
                .collect();
            assert_eq!(raw, vec![1.0, 2.0, 3.0, 4.0]);
            drop(samples);
            drop(score_taps);

            for (class, input) in class_inputs.into_iter().enumerate() {
                input
                    .enqueue(TreeScorePacket::sentinel().with_dest(class))
                    .unwrap();
            }

            // Class 0 sums slots 0 and 2, class 1 sums slots 1 and 3.
            let first = class_scores[0].dequeue().unwrap();
            let second = class_scores[1].dequeue().unwrap();
            assert_eq!((first.id, first.data), (0, 14.0));
            assert_eq!((second.id, second.data), (0, 26.0));
            assert!(class_scores[0].dequeue().unwrap().last);
            assert!(class_scores[1].dequeue().unwrap().last);

            let executed = running.join().unwrap();
            executed.dump_failures();
            assert!(executed.passed());
            assert_eq!(executed.diagnostics().count(), 0);
        });
    }
}
