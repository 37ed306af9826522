//! The unit of transport and the payloads carried between stages.

use std::sync::Arc;

use derive_more::Display;

/// Scores are plain doubles; the number representation of the evaluated model is not modelled here.
pub type Score = f64;

/// One record's features. Shared so that broadcasting a sample does not copy it.
pub type FeatureVector = Arc<[f64]>;

/// Anything a crossbar can route.
pub trait Routable {
    /// Output index selected by this packet. Only consulted on many-to-many routes.
    fn dest(&self) -> usize;
}

/// Anything a tee can observe.
pub trait HasPayload {
    type Payload: Clone;

    fn payload(&self) -> &Self::Payload;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Packet<T> {
    /// Sample identity, unique among in-flight samples.
    pub id: usize,
    pub data: T,
    pub dest: usize,
    /// Marks the end of a logical stream.
    pub last: bool,
}

impl<T> Packet<T> {
    pub fn new(id: usize, data: T) -> Self {
        Self {
            id,
            data,
            dest: 0,
            last: false,
        }
    }

    pub fn with_dest(mut self, dest: usize) -> Self {
        self.dest = dest;
        self
    }

    pub fn sentinel() -> Self
    where
        T: Default,
    {
        Self {
            id: 0,
            data: T::default(),
            dest: 0,
            last: true,
        }
    }
}

impl<T> Routable for Packet<T> {
    fn dest(&self) -> usize {
        self.dest
    }
}

impl<T: Clone> HasPayload for Packet<T> {
    type Payload = T;

    fn payload(&self) -> &T {
        &self.data
    }
}

/// The score of one tree for one sample. Displays as the bare score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Display)]
#[display(fmt = "{}", score)]
pub struct TreeScore {
    /// Index of the tree within its class.
    pub tree: usize,
    pub score: Score,
}

/// Reconfiguration requests for a bank, addressed through `dest`.
#[derive(Clone, Debug, PartialEq)]
pub enum BankCommand {
    /// Serve exactly these tree slots from now on.
    Load { slots: Vec<usize> },
}

pub type InputPacket = Packet<FeatureVector>;
pub type TreeScorePacket = Packet<TreeScore>;
pub type ClassScorePacket = Packet<Score>;
pub type BankCommandPacket = Packet<BankCommand>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_flagged() {
        let pkt = TreeScorePacket::sentinel().with_dest(3);
        assert!(pkt.last);
        assert_eq!(pkt.dest(), 3);
        assert_eq!(pkt.data, TreeScore::default());
    }

    #[test]
    fn tree_scores_display_as_score() {
        let score = TreeScore {
            tree: 4,
            score: -0.25,
        };
        assert_eq!(score.to_string(), "-0.25");
    }
}
