use std::collections::VecDeque;

use tracing::{debug, warn};
use treebench_macros::context_internal;

use crate::{
    channel::{Receiver, Sender},
    context::{Context, ContextSummary, Diagnostic},
    datastructures::Identifiable,
    packet::{ClassScorePacket, Packet, Score, TreeScorePacket},
};

/// The scores one sample id has collected so far.
#[derive(Debug)]
struct Round {
    scores: Vec<Option<Score>>,
    received: usize,
}

impl Round {
    fn new(n_trees: usize) -> Self {
        Self {
            scores: vec![None; n_trees],
            received: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.scores.len()
    }

    fn total(&self) -> Score {
        self.scores.iter().flatten().sum()
    }
}

/// Aggregates the tree scores of one class into class scores.
///
/// Rounds are kept per sample id and keyed by tree, so two samples sharing a recycled id never mix. Class scores
/// are emitted in id-cycle order starting at 0. The `last` sentinel is held back until the input stream closes,
/// which makes it the final packet on the class stream.
#[context_internal]
pub struct VotingStation {
    class: usize,
    bias: Score,
    n_trees: usize,
    input: Receiver<TreeScorePacket>,
    output: Sender<ClassScorePacket>,
    rounds: Vec<VecDeque<Round>>,
    next_id: usize,
    sentinel: Option<usize>,
    detached: bool,
    emitted: usize,
    diagnostics: Vec<Diagnostic>,
}

impl VotingStation {
    pub fn new(
        class: usize,
        n_trees: usize,
        bias: Score,
        max_parallel_samples: usize,
        input: Receiver<TreeScorePacket>,
        output: Sender<ClassScorePacket>,
    ) -> Self {
        let station = Self {
            class,
            bias,
            n_trees,
            input,
            output,
            rounds: (0..max_parallel_samples).map(|_| VecDeque::new()).collect(),
            next_id: 0,
            sentinel: None,
            detached: false,
            emitted: 0,
            diagnostics: vec![],
            context_info: Default::default(),
        };
        station.input.attach_receiver(&station);
        station.output.attach_sender(&station);
        station
    }

    fn accept(&mut self, packet: TreeScorePacket) {
        if packet.last {
            match self.sentinel {
                None => self.sentinel = Some(packet.id),
                Some(_) => {
                    warn!(class = self.class, id = packet.id, "duplicate sentinel");
                    self.diagnostics
                        .push(Diagnostic::DuplicateSentinel { id: packet.id });
                }
            }
            return;
        }

        let (id, tree) = (packet.id, packet.data.tree);
        if id >= self.rounds.len() || tree >= self.n_trees {
            warn!(class = self.class, id, tree, "score outside of the pipeline shape");
            self.diagnostics.push(Diagnostic::StrayScore { id, tree });
            return;
        }

        let n_trees = self.n_trees;
        let pending = &mut self.rounds[id];
        let index = match pending.iter().position(|round| round.scores[tree].is_none()) {
            Some(index) => index,
            None => {
                pending.push_back(Round::new(n_trees));
                pending.len() - 1
            }
        };
        let round = &mut pending[index];
        round.scores[tree] = Some(packet.data.score);
        round.received += 1;
    }

    fn emit(&mut self, id: usize, round: Round) {
        let score = self.bias + round.total();
        if self.detached {
            return;
        }
        if self.output.enqueue(Packet::new(id, score)).is_err() {
            debug!(class = self.class, "class stream has no reader, discarding further scores");
            self.detached = true;
            return;
        }
        self.emitted += 1;
    }

    fn advance(&mut self) {
        self.next_id = (self.next_id + 1) % self.rounds.len();
    }

    /// Emits every complete round that is next in id-cycle order.
    fn release_ready(&mut self) {
        while self.rounds[self.next_id]
            .front()
            .is_some_and(Round::is_complete)
        {
            if let Some(round) = self.rounds[self.next_id].pop_front() {
                self.emit(self.next_id, round);
            }
            self.advance();
        }
    }

    /// Empties every queue in id-cycle order, emitting complete rounds and reporting the rest.
    fn flush(&mut self) {
        while self.rounds.iter().any(|pending| !pending.is_empty()) {
            if let Some(round) = self.rounds[self.next_id].pop_front() {
                if round.is_complete() {
                    self.emit(self.next_id, round);
                } else {
                    warn!(
                        class = self.class,
                        id = self.next_id,
                        received = round.received,
                        expected = self.n_trees,
                        "stream ended before every tree reported"
                    );
                    self.diagnostics.push(Diagnostic::IncompleteRound {
                        id: self.next_id,
                        received: round.received,
                        expected: self.n_trees,
                    });
                }
            }
            self.advance();
        }
    }
}

impl Context for VotingStation {
    fn run(&mut self) -> anyhow::Result<()> {
        if self.rounds.is_empty() {
            anyhow::bail!("voting station for class {} has no sample ids", self.class);
        }
        while let Ok(packet) = self.input.dequeue() {
            self.accept(packet);
            self.release_ready();
        }
        self.flush();
        if let Some(id) = self.sentinel {
            if !self.detached {
                let mut sentinel = ClassScorePacket::sentinel().with_dest(self.class);
                sentinel.id = id;
                self.output.enqueue(sentinel)?;
            }
        }
        Ok(())
    }

    fn summarize(&self) -> ContextSummary {
        let mut summary = ContextSummary::new(self.verbose());
        summary.processed = self.emitted;
        summary.diagnostics = self.diagnostics.clone();
        summary
    }
}
