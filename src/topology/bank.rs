use serde::Serialize;
use tracing::{debug, warn};
use treebench_macros::context_internal;

use super::TopologyError;
use crate::{
    channel::{DequeueError, Receiver, Sender},
    context::{Context, ContextSummary},
    datastructures::Identifiable,
    packet::{BankCommand, BankCommandPacket, InputPacket, Packet},
};

/// Which tree slots each bank serves.
///
/// Slots are dealt round robin over `bank_count * trees_per_bank` partitions, each bank owning `trees_per_bank`
/// consecutive partitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BankPlan {
    bank_count: usize,
    trees_per_bank: usize,
    assignments: Vec<Vec<usize>>,
}

impl BankPlan {
    pub fn new(
        slots: usize,
        bank_count: usize,
        trees_per_bank: Option<usize>,
    ) -> Result<Self, TopologyError> {
        if bank_count == 0 {
            return Err(TopologyError::Shape("bank_count must be at least 1".into()));
        }
        let trees_per_bank = trees_per_bank.unwrap_or_else(|| slots.div_ceil(bank_count).max(1));
        if trees_per_bank == 0 {
            return Err(TopologyError::Shape("trees_per_bank must be at least 1".into()));
        }
        let partitions = bank_count * trees_per_bank;
        let mut assignments = vec![vec![]; bank_count];
        for slot in 0..slots {
            assignments[(slot % partitions) / trees_per_bank].push(slot);
        }
        Ok(Self {
            bank_count,
            trees_per_bank,
            assignments,
        })
    }

    pub fn bank_count(&self) -> usize {
        self.bank_count
    }

    pub fn trees_per_bank(&self) -> usize {
        self.trees_per_bank
    }

    pub fn partitions(&self) -> usize {
        self.bank_count * self.trees_per_bank
    }

    pub fn bank_of(&self, slot: usize) -> usize {
        (slot % self.partitions()) / self.trees_per_bank
    }

    pub fn slots_for(&self, bank: usize) -> &[usize] {
        self.assignments.get(bank).map(Vec::as_slice).unwrap_or_default()
    }

    /// One `Load` per bank, addressed through `dest`.
    pub fn commands(&self) -> impl Iterator<Item = BankCommandPacket> + '_ {
        self.assignments.iter().enumerate().map(|(bank, slots)| {
            Packet::new(
                bank,
                BankCommand::Load {
                    slots: slots.clone(),
                },
            )
            .with_dest(bank)
        })
    }
}

/// Forwards every sample to the tree streams of the slots it has been told to serve.
///
/// Commands are broadcast to every bank; a bank only obeys those addressed to it. It blocks for its first `Load`
/// before touching any sample and picks up later reloads between samples.
#[context_internal]
pub struct BankContext {
    bank: usize,
    samples: Receiver<InputPacket>,
    commands: Receiver<BankCommandPacket>,
    streams: Vec<Sender<InputPacket>>,
    loaded: Vec<usize>,
    forwarded: usize,
}

impl BankContext {
    pub fn new(
        bank: usize,
        samples: Receiver<InputPacket>,
        commands: Receiver<BankCommandPacket>,
        streams: Vec<Sender<InputPacket>>,
    ) -> Self {
        let ctx = Self {
            bank,
            samples,
            commands,
            streams,
            loaded: vec![],
            forwarded: 0,
            context_info: Default::default(),
        };
        ctx.samples.attach_receiver(&ctx);
        ctx.commands.attach_receiver(&ctx);
        ctx.streams.iter().for_each(|stream| stream.attach_sender(&ctx));
        ctx
    }

    fn apply(&mut self, command: BankCommandPacket) -> anyhow::Result<()> {
        if command.dest != self.bank {
            return Ok(());
        }
        match command.data {
            BankCommand::Load { slots } => {
                if let Some(slot) = slots.iter().find(|slot| **slot >= self.streams.len()) {
                    anyhow::bail!(
                        "bank {} was asked to serve slot {slot}, but only {} exist",
                        self.bank,
                        self.streams.len()
                    );
                }
                debug!(bank = self.bank, ?slots, "loaded");
                self.loaded = slots;
            }
        }
        Ok(())
    }

    /// Blocks until a command addressed to this bank arrives. False if the command stream closed first.
    fn await_load(&mut self) -> anyhow::Result<bool> {
        while let Ok(command) = self.commands.dequeue() {
            let mine = command.dest == self.bank;
            self.apply(command)?;
            if mine {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn poll_reload(&mut self) -> anyhow::Result<()> {
        loop {
            match self.commands.pop() {
                Ok(command) => self.apply(command)?,
                Err(DequeueError::Empty(_) | DequeueError::Closed(_)) => return Ok(()),
            }
        }
    }
}

impl Context for BankContext {
    fn run(&mut self) -> anyhow::Result<()> {
        if !self.await_load()? {
            warn!(bank = self.bank, "command stream closed before any load, serving no trees");
        }
        while let Ok(sample) = self.samples.dequeue() {
            self.poll_reload()?;
            for slot in &self.loaded {
                self.streams[*slot].enqueue(sample.clone())?;
            }
            self.forwarded += 1;
        }
        Ok(())
    }

    fn summarize(&self) -> ContextSummary {
        let mut summary = ContextSummary::new(self.verbose());
        summary.processed = self.forwarded;
        summary
    }
}
