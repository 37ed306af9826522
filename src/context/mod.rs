//! The unit of scheduling. Each context runs on its own thread and talks to the rest of the program only through
//! its channels.

mod summary;

pub use summary::{ContextSummary, Diagnostic};

use crate::datastructures::Identifiable;

pub trait Context: Send + Identifiable {
    /// Called once, after the graph has been validated and before any context starts running.
    fn init(&mut self) {}

    /// The body of the context. Returning an error marks the context as failed without stopping its peers;
    /// dropping its channels on exit lets the failure propagate as closure.
    fn run(&mut self) -> anyhow::Result<()>;

    fn summarize(&self) -> ContextSummary {
        ContextSummary::new(self.verbose())
    }
}
