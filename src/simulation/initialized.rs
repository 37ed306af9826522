use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam::queue::SegQueue;

use crate::shim::make_builder;

use super::{executed::ContextFailure, programdata::ProgramData, Executed, RunOptions};

pub struct Initialized<'a> {
    pub(super) data: ProgramData<'a>,
}

impl<'a> Initialized<'a> {
    /// Runs every context on its own thread and waits for all of them to return.
    pub fn run(mut self, options: RunOptions) -> Executed {
        let summaries = SegQueue::new();
        let failures = SegQueue::new();

        std::thread::scope(|s| {
            self.data.nodes.drain(..).for_each(|mut child| {
                let verbose = child.verbose();
                let summary_queue = &summaries;
                let failure_queue = &failures;

                let spawned = make_builder(options.mode)
                    .name(format!("{}({})", verbose.id, verbose.name))
                    .spawn_scoped_careless(s, move || {
                        let result = catch_unwind(AssertUnwindSafe(|| child.run()));
                        let error = match result {
                            Ok(Ok(())) => None,
                            Ok(Err(err)) => Some(err),
                            Err(_) => Some(anyhow::anyhow!("context panicked")),
                        };
                        if let Some(error) = error {
                            failure_queue.push(ContextFailure {
                                id: child.verbose(),
                                error,
                            });
                        }
                        summary_queue.push(child.summarize());
                    });

                if let Err(err) = spawned {
                    failures.push(ContextFailure {
                        id: verbose,
                        error: anyhow::Error::new(err).context("failed to spawn context"),
                    });
                }
            });
        });

        let mut summaries: Vec<_> = summaries.into_iter().collect();
        summaries.sort_by_key(|summary| summary.id.id.id);
        Executed {
            summaries,
            failures: failures.into_iter().collect(),
        }
    }
}
