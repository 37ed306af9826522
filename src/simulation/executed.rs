use tracing::error;

use crate::{
    context::{ContextSummary, Diagnostic},
    datastructures::VerboseIdentifier,
};

#[derive(Debug)]
pub struct ContextFailure {
    pub id: VerboseIdentifier,
    pub error: anyhow::Error,
}

pub struct Executed {
    pub(super) summaries: Vec<ContextSummary>,
    pub(super) failures: Vec<ContextFailure>,
}

impl Executed {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summaries(&self) -> &[ContextSummary] {
        &self.summaries
    }

    pub fn failures(&self) -> &[ContextFailure] {
        &self.failures
    }

    /// Every diagnostic recorded by any context, tagged with its origin.
    pub fn diagnostics(&self) -> impl Iterator<Item = (&VerboseIdentifier, &Diagnostic)> {
        self.summaries.iter().flat_map(|summary| {
            summary
                .diagnostics
                .iter()
                .map(move |diagnostic| (&summary.id, diagnostic))
        })
    }

    pub fn dump_failures(&self) {
        for failure in &self.failures {
            error!(context = %failure.id, "{:#}", failure.error);
        }
    }
}
