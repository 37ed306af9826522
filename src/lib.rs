pub mod channel;
pub mod config;
pub mod context;
pub mod datastructures;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod packet;
pub mod routing;
pub mod simulation;
pub mod testbench;
pub mod topology;
pub mod utility_contexts;

mod shim;

pub use treebench_macros;

// Re-exports the common structures needed to build contexts.
pub mod context_tools {
    // Used for reading/writing to channels, and to take/use them as members
    pub use crate::channel::{wait_any, DequeueError, EnqueueError, PeekResult, Receiver, Sender};

    pub use crate::packet::{HasPayload, Packet, Routable};
    pub use treebench_macros::context_macro;

    pub use crate::context::{Context, ContextSummary, Diagnostic};

    pub use crate::datastructures::{Identifiable, Identifier};
}
