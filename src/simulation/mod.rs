//! Building, validating and running a program made of contexts and channels.
//!
//! A program moves through three states: [ProgramBuilder] (adding channels and contexts), [Initialized]
//! (validated, ready to run) and [Executed] (every context has returned).

mod building;
mod executed;
mod initialized;
mod programdata;

pub use building::ProgramBuilder;
pub use executed::{ContextFailure, Executed};
pub use initialized::Initialized;

pub use crate::shim::RunMode;

use derive_builder::Builder;
use thiserror::Error;

use crate::{
    channel::ChannelID,
    datastructures::{Identifier, VerboseIdentifier},
};

#[derive(Builder, Clone, Debug)]
pub struct InitializationOptions {
    /// Reject programs whose contexts form a cycle. External endpoints do not count.
    #[builder(default = "true")]
    pub check_acyclic: bool,
}

impl Default for InitializationOptions {
    fn default() -> Self {
        Self {
            check_acyclic: true,
        }
    }
}

#[derive(Builder, Clone, Debug, Default)]
pub struct RunOptions {
    #[builder(default)]
    pub mode: RunMode,
}

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("{0:?} has no attached sender")]
    DisconnectedSender(ChannelID),

    #[error("{0:?} has no attached receiver")]
    DisconnectedReceiver(ChannelID),

    #[error("Node {0} is connected to a channel, but isn't registered to this program")]
    UnregisteredNode(Identifier),

    #[error("Contexts form a cycle through {0}")]
    Cycle(VerboseIdentifier),
}
