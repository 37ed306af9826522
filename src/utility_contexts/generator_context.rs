use crate::{
    channel::Sender,
    context::{Context, ContextSummary},
    datastructures::Identifiable,
};
use treebench_macros::context_internal;

use super::UtilityError;

/// Pushes every element of an iterator into a channel, then closes it.
#[context_internal]
pub struct GeneratorContext<T, IType, FType>
where
    IType: Iterator<Item = T>,
    FType: FnOnce() -> IType + Send,
{
    iterator: Option<FType>,
    output: Sender<T>,
    produced: usize,
}

impl<T: Send, IType, FType> Context for GeneratorContext<T, IType, FType>
where
    IType: Iterator<Item = T>,
    FType: FnOnce() -> IType + Send,
{
    fn run(&mut self) -> anyhow::Result<()> {
        let func = self.iterator.take().ok_or(UtilityError::DuplicateExec)?;
        for (iteration, val) in func().enumerate() {
            self.output
                .enqueue(val)
                .map_err(|_| UtilityError::Sender {
                    iteration,
                    channel: self.output.id(),
                })?;
            self.produced += 1;
        }
        Ok(())
    }

    fn summarize(&self) -> ContextSummary {
        let mut summary = ContextSummary::new(self.verbose());
        summary.processed = self.produced;
        summary
    }
}

impl<T, IType, FType> GeneratorContext<T, IType, FType>
where
    Self: Context,
    IType: Iterator<Item = T>,
    FType: FnOnce() -> IType + Send,
{
    pub fn new(iterator: FType, output: Sender<T>) -> Self {
        let gc = Self {
            iterator: Some(iterator),
            output,
            produced: 0,
            context_info: Default::default(),
        };
        gc.output.attach_sender(&gc);
        gc
    }
}
