use crate::context::Context;
use treebench_macros::context_internal;

use super::UtilityError;

/// Contains an arbitrarily defined inner body for a context
/// Used mostly for one-off operations, such as test drivers.
/// Channels used by the body must be attached to the context by the caller.
#[context_internal]
pub struct FunctionContext<RT> {
    run_fn: Option<RT>,
}

impl<RT> Context for FunctionContext<RT>
where
    RT: FnOnce() -> anyhow::Result<()> + Send,
{
    fn run(&mut self) -> anyhow::Result<()> {
        let rf = self.run_fn.take().ok_or(UtilityError::DuplicateExec)?;
        rf()
    }
}

impl<RT> FunctionContext<RT>
where
    RT: FnOnce() -> anyhow::Result<()> + Send,
{
    /// Constructs an empty FunctionContext
    pub fn new() -> Self {
        Self {
            run_fn: Default::default(),
            context_info: Default::default(),
        }
    }

    /// Sets the run function for the context.
    pub fn set_run(&mut self, run_fn: RT) {
        self.run_fn = Some(run_fn);
    }
}

impl<RT> Default for FunctionContext<RT>
where
    RT: FnOnce() -> anyhow::Result<()> + Send,
{
    fn default() -> Self {
        Self::new()
    }
}
