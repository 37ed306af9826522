use serde::{Deserialize, Serialize};

use crate::datastructures::VerboseIdentifier;

/// A recoverable anomaly absorbed by a stage. These never stop a run; they are reported afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A demux packet named an output that does not exist and was dropped.
    Misrouted { source: usize, dest: usize },

    /// A score arrived for a sample id or tree the stage does not know about.
    StrayScore { id: usize, tree: usize },

    /// A stream ended while a sample was still missing scores from some trees.
    IncompleteRound {
        id: usize,
        received: usize,
        expected: usize,
    },

    /// More than one `last` sentinel arrived on a single stream.
    DuplicateSentinel { id: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Misrouted { source, dest } => write!(
                f,
                "Unable to route packet from stream {source} to stream {dest}"
            ),
            Diagnostic::StrayScore { id, tree } => {
                write!(f, "Stray score for sample {id} from tree {tree}")
            }
            Diagnostic::IncompleteRound {
                id,
                received,
                expected,
            } => write!(
                f,
                "Sample {id} ended with {received} of {expected} tree scores"
            ),
            Diagnostic::DuplicateSentinel { id } => {
                write!(f, "Duplicate sentinel (id {id})")
            }
        }
    }
}

/// What a context reports about itself once it has finished running.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextSummary {
    pub id: VerboseIdentifier,
    pub processed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ContextSummary {
    pub fn new(id: VerboseIdentifier) -> Self {
        Self {
            id,
            processed: 0,
            diagnostics: vec![],
        }
    }
}
