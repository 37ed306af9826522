//! Small stand-alone contexts, mostly used to drive and observe stages in tests.

mod checker_context;
mod consumer_context;
mod function_context;
mod generator_context;

pub use checker_context::CheckerContext;
pub use consumer_context::ConsumerContext;
pub use function_context::FunctionContext;
pub use generator_context::GeneratorContext;
use thiserror::Error;

use crate::channel::ChannelID;

/// A bundle of generic failures for utility contexts.
#[derive(Debug, Error)]
pub enum UtilityError {
    /// A receiver was prematurely closed, which caused the current context to fail.
    #[error("Receiver {channel} was prematurely closed on iteration {iteration}")]
    Receiver {
        /// The logical loop iteration when the failure occurred
        iteration: usize,
        /// The channel ID of the failure
        channel: ChannelID,
    },

    /// A sender lost its receiver before the iterator was exhausted.
    #[error("Sender {channel} lost its receiver on iteration {iteration}")]
    Sender { iteration: usize, channel: ChannelID },

    /// A context was somehow executed twice
    #[error("Cannot execute a context more than once!")]
    DuplicateExec,
}

/// Checker failures
#[derive(Debug, Error)]
pub enum CheckerError {
    /// Mismatch between expected and actual values
    #[error("Mismatched results on iteration {ind:?}: {msg}")]
    Mismatch {
        /// The index of the mismatch
        ind: usize,

        /// The error message. Conversion must happen early in case T contains a reference.
        msg: String,
    },

    /// The checked channel carried more elements than expected.
    #[error("Unexpected trailing element after {count} checked elements: {msg}")]
    Trailing { count: usize, msg: String },
}
