//! Typed FIFO channels connecting the stages of a program.
//!
//! Channels are built through [crate::simulation::ProgramBuilder]. A [Sender] can be cloned when a channel is
//! shared by several producers; the channel closes once every sender has been dropped, which is how completion
//! cascades through the graph.

mod channel_id;
pub(crate) mod channel_spec;
mod utils;

use std::sync::Arc;

use crossbeam::channel::{self, TryRecvError};
use thiserror::Error;

use crate::datastructures::Identifiable;

pub use channel_id::ChannelID;
use channel_spec::ChannelSpec;
pub use utils::wait_any;

/// Failure to enqueue: nobody is left to receive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("{0} has no receiver")]
    Closed(ChannelID),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DequeueError {
    /// Non-blocking read on a channel with nothing buffered.
    #[error("{0} has no data available")]
    Empty(ChannelID),

    /// All senders are gone and the channel is drained.
    #[error("{0} is closed")]
    Closed(ChannelID),
}

/// The outcome of a non-blocking look at the head of a channel.
#[derive(Debug, PartialEq)]
pub enum PeekResult<'a, T> {
    Something(&'a T),
    Nothing,
    Closed,
}

pub struct Sender<T> {
    pub(crate) underlying: channel::Sender<T>,
    pub(crate) spec: Arc<ChannelSpec>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            underlying: self.underlying.clone(),
            spec: self.spec.clone(),
        }
    }
}

impl<T> Sender<T> {
    pub fn id(&self) -> ChannelID {
        self.spec.id()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.spec.capacity()
    }

    pub fn attach_sender(&self, sender: &dyn Identifiable) {
        self.spec.attach_sender(sender);
    }

    /// Appends to the tail of the channel, blocking while a bounded channel is full.
    pub fn enqueue(&self, data: T) -> Result<(), EnqueueError> {
        self.underlying
            .send(data)
            .map_err(|_| EnqueueError::Closed(self.id()))
    }
}

pub struct Receiver<T> {
    pub(crate) underlying: channel::Receiver<T>,
    pub(crate) spec: Arc<ChannelSpec>,
    pub(crate) head: Option<T>,
}

impl<T> Receiver<T> {
    pub fn id(&self) -> ChannelID {
        self.spec.id()
    }

    pub fn attach_receiver(&self, receiver: &dyn Identifiable) {
        self.spec.attach_receiver(receiver);
    }

    /// Looks at the head of the channel without consuming it. Never blocks.
    pub fn peek(&mut self) -> PeekResult<'_, T> {
        if self.head.is_none() {
            match self.underlying.try_recv() {
                Ok(data) => self.head = Some(data),
                Err(TryRecvError::Empty) => return PeekResult::Nothing,
                Err(TryRecvError::Disconnected) => return PeekResult::Closed,
            }
        }
        self.head
            .as_ref()
            .map_or(PeekResult::Nothing, PeekResult::Something)
    }

    /// Non-blocking poll: true when a packet can be popped right now.
    pub fn has_data(&mut self) -> bool {
        matches!(self.peek(), PeekResult::Something(_))
    }

    /// Removes the head without blocking.
    pub fn pop(&mut self) -> Result<T, DequeueError> {
        if let Some(data) = self.head.take() {
            return Ok(data);
        }
        match self.underlying.try_recv() {
            Ok(data) => Ok(data),
            Err(TryRecvError::Empty) => Err(DequeueError::Empty(self.id())),
            Err(TryRecvError::Disconnected) => Err(DequeueError::Closed(self.id())),
        }
    }

    /// Removes the head, blocking until a packet arrives or every sender is gone.
    pub fn dequeue(&mut self) -> Result<T, DequeueError> {
        if let Some(data) = self.head.take() {
            return Ok(data);
        }
        self.underlying
            .recv()
            .map_err(|_| DequeueError::Closed(self.id()))
    }
}

/// Builds a connected pair outside of any program, mostly useful for driving stages by hand.
pub(crate) fn make_channel<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = match capacity {
        Some(capacity) if !cfg!(feature = "unbounded-channels") => channel::bounded(capacity),
        _ => channel::unbounded(),
    };
    let spec = Arc::new(ChannelSpec::new(capacity));
    (
        Sender {
            underlying: tx,
            spec: spec.clone(),
        },
        Receiver {
            underlying: rx,
            spec,
            head: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let (snd, mut rcv) = make_channel::<usize>(Some(8));
        for i in 0..8 {
            snd.enqueue(i).unwrap();
        }
        for i in 0..8 {
            assert_eq!(rcv.dequeue().unwrap(), i);
        }
    }

    #[test]
    fn peek_does_not_consume() {
        let (snd, mut rcv) = make_channel::<u32>(None);
        assert_eq!(rcv.peek(), PeekResult::Nothing);
        assert!(!rcv.has_data());

        snd.enqueue(7).unwrap();
        assert_eq!(rcv.peek(), PeekResult::Something(&7));
        assert!(rcv.has_data());
        assert_eq!(rcv.pop().unwrap(), 7);
        assert_eq!(rcv.pop(), Err(DequeueError::Empty(rcv.id())));
    }

    #[test]
    fn closing_every_sender_closes_the_channel() {
        let (snd, mut rcv) = make_channel::<u32>(Some(2));
        let other = snd.clone();
        snd.enqueue(1).unwrap();
        drop(snd);
        other.enqueue(2).unwrap();
        drop(other);

        assert_eq!(rcv.dequeue().unwrap(), 1);
        assert_eq!(rcv.pop().unwrap(), 2);
        assert_eq!(rcv.peek(), PeekResult::Closed);
        assert_eq!(rcv.dequeue(), Err(DequeueError::Closed(rcv.id())));
    }

    #[test]
    fn enqueue_fails_without_receiver() {
        let (snd, rcv) = make_channel::<u32>(Some(1));
        drop(rcv);
        assert_eq!(snd.enqueue(3), Err(EnqueueError::Closed(snd.id())));
    }

    #[test]
    fn wait_any_returns_once_data_arrives() {
        let (snd_a, rcv_a) = make_channel::<u32>(None);
        let (_snd_b, rcv_b) = make_channel::<u32>(None);

        std::thread::scope(|s| {
            s.spawn(move || snd_a.enqueue(5).unwrap());
            wait_any([&rcv_a, &rcv_b]);
        });
        let mut rcv_a = rcv_a;
        assert_eq!(rcv_a.pop().unwrap(), 5);
    }

    #[test]
    fn wait_any_returns_on_close() {
        let (snd, rcv) = make_channel::<u32>(None);
        drop(snd);
        wait_any([&rcv]);
    }
}
