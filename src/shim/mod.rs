//! Thread construction for running contexts.

use serde::{Deserialize, Serialize};
use thread_priority::{
    RealtimeThreadSchedulePolicy, ThreadBuilder, ThreadPriority, ThreadPriorityValue,
};

/// Execution mode for each thread
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Execute under the default OS scheduler, such as CFS for Linux
    #[default]
    #[serde(rename = "simple")]
    Simple,

    /// Use FIFO (real-time) scheduling. This is higher performance, but may lead to starvation of other processes.
    #[serde(rename = "fifo")]
    FIFO,
}

/// Constructs a thread builder based on the options specified in the [RunMode]
pub fn make_builder(mode: RunMode) -> ThreadBuilder {
    match mode {
        RunMode::Simple => ThreadBuilder::default(),
        RunMode::FIFO => {
            let builder = ThreadBuilder::default().policy(
                thread_priority::unix::ThreadSchedulePolicy::Realtime(
                    RealtimeThreadSchedulePolicy::Fifo,
                ),
            );
            match ThreadPriorityValue::try_from(10u8) {
                Ok(value) => builder.priority(ThreadPriority::Crossplatform(value)),
                Err(_) => builder,
            }
        }
    }
}
