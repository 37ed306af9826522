use std::fmt::Debug;

use crate::{channel::Receiver, context::Context};
use treebench_macros::context_internal;

use super::{CheckerError, UtilityError};

/// Compares the contents of a channel against an expected sequence, element by element.
/// Fails on the first mismatch, on early closure, or on anything left over once the sequence ends.
#[context_internal]
pub struct CheckerContext<T, IType, FType>
where
    IType: Iterator<Item = T>,
    FType: FnOnce() -> IType + Send,
{
    iterator: Option<FType>,
    input: Receiver<T>,
}

impl<T, IType, FType> Context for CheckerContext<T, IType, FType>
where
    T: PartialEq + Debug + Send,
    IType: Iterator<Item = T>,
    FType: FnOnce() -> IType + Send,
{
    fn run(&mut self) -> anyhow::Result<()> {
        let iter = self.iterator.take().ok_or(UtilityError::DuplicateExec)?;
        let mut count = 0;
        for (ind, val) in iter().enumerate() {
            let data = self.input.dequeue().map_err(|_| UtilityError::Receiver {
                iteration: ind,
                channel: self.input.id(),
            })?;
            if data != val {
                Err(CheckerError::Mismatch {
                    ind,
                    msg: format!("Expected {val:?} but found {data:?}"),
                })?;
            }
            count += 1;
        }
        if let Ok(extra) = self.input.dequeue() {
            Err(CheckerError::Trailing {
                count,
                msg: format!("{extra:?}"),
            })?;
        }
        Ok(())
    }
}

impl<T, IType, FType> CheckerContext<T, IType, FType>
where
    Self: Context,
    IType: Iterator<Item = T>,
    FType: FnOnce() -> IType + Send,
{
    pub fn new(iterator: FType, input: Receiver<T>) -> Self {
        let cc = Self {
            iterator: Some(iterator),
            input,
            context_info: Default::default(),
        };
        cc.input.attach_receiver(&cc);
        cc
    }
}
