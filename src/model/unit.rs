use tracing::debug;
use treebench_macros::context_internal;

use super::{Evaluator, TreeEvaluator};
use crate::{
    channel::{Receiver, Sender},
    context::{Context, ContextSummary},
    datastructures::Identifiable,
    packet::{InputPacket, Packet, TreeScore, TreeScorePacket},
};

/// Evaluates one tree of one class for every sample on its stream.
/// Scores leave tagged with the tree index and with `dest` set to the class, ready for class routing.
#[context_internal]
pub struct TreeUnitContext {
    tree: usize,
    class: usize,
    evaluator: Evaluator,
    input: Receiver<InputPacket>,
    output: Sender<TreeScorePacket>,
    evaluated: usize,
}

impl TreeUnitContext {
    pub fn new(
        tree: usize,
        class: usize,
        evaluator: Evaluator,
        input: Receiver<InputPacket>,
        output: Sender<TreeScorePacket>,
    ) -> Self {
        let unit = Self {
            tree,
            class,
            evaluator,
            input,
            output,
            evaluated: 0,
            context_info: Default::default(),
        };
        unit.input.attach_receiver(&unit);
        unit.output.attach_sender(&unit);
        unit
    }
}

impl Context for TreeUnitContext {
    fn run(&mut self) -> anyhow::Result<()> {
        while let Ok(sample) = self.input.dequeue() {
            if sample.last {
                debug!(tree = self.tree, class = self.class, "ignoring sentinel on a tree stream");
                continue;
            }
            let score = self.evaluator.evaluate(&sample.data);
            let packet = Packet::new(
                sample.id,
                TreeScore {
                    tree: self.tree,
                    score,
                },
            )
            .with_dest(self.class);
            self.output.enqueue(packet)?;
            self.evaluated += 1;
        }
        Ok(())
    }

    fn summarize(&self) -> ContextSummary {
        let mut summary = ContextSummary::new(self.verbose());
        summary.processed = self.evaluated;
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        model::{ConstantScore, DecisionTree},
        simulation::{InitializationOptions, ProgramBuilder, RunOptions},
        utility_contexts::{CheckerContext, GeneratorContext},
    };

    #[test]
    fn scores_are_tagged_with_tree_and_class() {
        let mut ctx = ProgramBuilder::default();
        let (sample_snd, sample_rcv) = ctx.bounded(2);
        let (score_snd, score_rcv) = ctx.bounded(2);

        let samples = || {
            (0..6usize).map(|i| Packet::new(i % 3, Arc::from(vec![i as f64, 0.0])))
        };
        ctx.add_child(GeneratorContext::new(samples, sample_snd));
        ctx.add_child(TreeUnitContext::new(
            4,
            1,
            DecisionTree::stump(0, 2.5, -1.0, 1.0).into(),
            sample_rcv,
            score_snd,
        ));
        ctx.add_child(CheckerContext::new(
            || {
                (0..6usize).map(|i| {
                    Packet::new(
                        i % 3,
                        TreeScore {
                            tree: 4,
                            score: if i as f64 <= 2.5 { -1.0 } else { 1.0 },
                        },
                    )
                    .with_dest(1)
                })
            },
            score_rcv,
        ));

        let executed = ctx
            .initialize(InitializationOptions::default())
            .unwrap()
            .run(RunOptions::default());
        executed.dump_failures();
        assert!(executed.passed());
        let unit = executed
            .summaries()
            .iter()
            .find(|summary| summary.id.name == "TreeUnitContext")
            .unwrap();
        assert_eq!(unit.processed, 6);
    }

    #[test]
    fn unattached_score_channel_is_rejected() {
        let mut ctx = ProgramBuilder::default();
        let (sample_snd, sample_rcv) = ctx.bounded(2);
        let (score_snd, score_rcv) = ctx.bounded::<TreeScorePacket>(2);
        ctx.add_child(GeneratorContext::new(
            || std::iter::once(Packet::new(0, Arc::from(vec![1.0]))),
            sample_snd,
        ));
        ctx.add_child(TreeUnitContext::new(
            0,
            0,
            ConstantScore(1.0).into(),
            sample_rcv,
            score_snd,
        ));
        // The score channel never got a receiver.
        let initialized = ctx.initialize(InitializationOptions::default());
        assert!(matches!(
            initialized,
            Err(crate::simulation::InitializationError::DisconnectedReceiver(_))
        ));
        drop(score_rcv);
    }
}
