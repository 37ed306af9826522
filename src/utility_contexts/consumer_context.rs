use crate::{
    channel::Receiver,
    context::{Context, ContextSummary},
    datastructures::Identifiable,
};
use treebench_macros::context_internal;

/// A context which simply consumes values out of a channel until it closes.
#[context_internal]
pub struct ConsumerContext<T> {
    chan: Receiver<T>,
    consumed: usize,
}

impl<T: Send> Context for ConsumerContext<T> {
    fn run(&mut self) -> anyhow::Result<()> {
        while self.chan.dequeue().is_ok() {
            self.consumed += 1;
        }
        Ok(())
    }

    fn summarize(&self) -> ContextSummary {
        let mut summary = ContextSummary::new(self.verbose());
        summary.processed = self.consumed;
        summary
    }
}

impl<T> ConsumerContext<T> {
    /// Constructs a context which reads out of a channel
    pub fn new(chan: Receiver<T>) -> Self {
        let s = Self {
            chan,
            consumed: 0,
            context_info: Default::default(),
        };
        s.chan.attach_receiver(&s);
        s
    }
}
