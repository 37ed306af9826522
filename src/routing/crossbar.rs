use thiserror::Error;
use tracing::{debug, warn};
use treebench_macros::context_internal;

use crate::{
    channel::{wait_any, DequeueError, EnqueueError, Receiver, Sender},
    context::{Context, ContextSummary, Diagnostic},
    datastructures::Identifiable,
    packet::Routable,
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CrossbarError {
    #[error("A crossbar needs at least one input and one output, got {inputs}:{outputs}")]
    Shape { inputs: usize, outputs: usize },

    #[error(transparent)]
    Enqueue(#[from] EnqueueError),

    #[error("Every output of the broadcast has closed")]
    NoLiveOutputs,
}

/// How packets cross from inputs to outputs. Derived from the port counts alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanPolicy {
    /// One input copied to every output.
    Broadcast,
    /// Many inputs interleaved onto one output.
    Merge,
    /// Each packet goes to the output named by its `dest`.
    Demux,
}

impl FanPolicy {
    pub fn from_shape(inputs: usize, outputs: usize) -> Result<Self, CrossbarError> {
        match (inputs, outputs) {
            (0, _) | (_, 0) => Err(CrossbarError::Shape { inputs, outputs }),
            (1, _) => Ok(FanPolicy::Broadcast),
            (_, 1) => Ok(FanPolicy::Merge),
            _ => Ok(FanPolicy::Demux),
        }
    }
}

/// Routes packets from N inputs to M outputs.
///
/// Inputs are swept in index order, each drained of whatever it holds at the moment of the sweep, so per-input
/// order is kept on every output while interleaving across inputs is unspecified. The context finishes once every
/// input has closed. Outputs close when the context is dropped.
#[context_internal]
pub struct CrossbarContext<P> {
    inputs: Vec<Receiver<P>>,
    outputs: Vec<Sender<P>>,
    policy: FanPolicy,
    open: Vec<bool>,
    live: Vec<bool>,
    routed: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<P: Routable + Clone> CrossbarContext<P> {
    pub fn new(inputs: Vec<Receiver<P>>, outputs: Vec<Sender<P>>) -> Result<Self, CrossbarError> {
        let policy = FanPolicy::from_shape(inputs.len(), outputs.len())?;
        let xbar = Self {
            open: vec![true; inputs.len()],
            live: vec![true; outputs.len()],
            inputs,
            outputs,
            policy,
            routed: 0,
            diagnostics: vec![],
            context_info: Default::default(),
        };
        xbar.inputs.iter().for_each(|rcv| rcv.attach_receiver(&xbar));
        xbar.outputs.iter().for_each(|snd| snd.attach_sender(&xbar));
        Ok(xbar)
    }

    pub fn policy(&self) -> FanPolicy {
        self.policy
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of packets accepted from inputs, dropped ones included.
    pub fn routed(&self) -> usize {
        self.routed
    }

    fn is_finished(&self) -> bool {
        !self.open.iter().any(|open| *open)
    }

    /// One pass over every open input, moving everything currently buffered. Never blocks on an empty input,
    /// though it may block on a full output. Returns the number of packets moved.
    pub fn sweep(&mut self) -> Result<usize, CrossbarError> {
        let mut moved = 0;
        for source in 0..self.inputs.len() {
            if !self.open[source] {
                continue;
            }
            loop {
                match self.inputs[source].pop() {
                    Ok(packet) => {
                        self.route(source, packet)?;
                        moved += 1;
                    }
                    Err(DequeueError::Empty(_)) => break,
                    Err(DequeueError::Closed(channel)) => {
                        debug!(source, %channel, "crossbar input closed");
                        self.open[source] = false;
                        break;
                    }
                }
            }
        }
        Ok(moved)
    }

    fn route(&mut self, source: usize, packet: P) -> Result<(), CrossbarError> {
        self.routed += 1;
        match self.policy {
            FanPolicy::Broadcast => {
                for (output, live) in self.outputs.iter().zip(self.live.iter_mut()) {
                    if *live && output.enqueue(packet.clone()).is_err() {
                        debug!(channel = %output.id(), "broadcast output closed, retiring it");
                        *live = false;
                    }
                }
                if !self.live.iter().any(|live| *live) {
                    return Err(CrossbarError::NoLiveOutputs);
                }
            }
            FanPolicy::Merge => self.outputs[0].enqueue(packet)?,
            FanPolicy::Demux => {
                let dest = packet.dest();
                match self.outputs.get(dest) {
                    Some(output) => output.enqueue(packet)?,
                    None => {
                        warn!(source, dest, "Unable to route packet from stream {source} to stream {dest}");
                        self.diagnostics.push(Diagnostic::Misrouted { source, dest });
                    }
                }
            }
        }
        Ok(())
    }
}

impl<P: Routable + Clone + Send> Context for CrossbarContext<P> {
    fn run(&mut self) -> anyhow::Result<()> {
        while !self.is_finished() {
            if self.sweep()? == 0 && !self.is_finished() {
                wait_any(
                    self.inputs
                        .iter()
                        .zip(&self.open)
                        .filter(|(_, open)| **open)
                        .map(|(input, _)| input),
                );
            }
        }
        Ok(())
    }

    fn summarize(&self) -> ContextSummary {
        let mut summary = ContextSummary::new(self.verbose());
        summary.processed = self.routed;
        summary.diagnostics = self.diagnostics.clone();
        summary
    }
}
