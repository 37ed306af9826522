use parking_lot::Mutex;

use crate::datastructures::{Identifiable, Identifier};

use super::ChannelID;

/// The basic specification of a connection: its identity, capacity and attached endpoints.
pub(crate) struct ChannelSpec {
    sender_ids: Mutex<Vec<Identifier>>,
    receiver_id: Mutex<Option<Identifier>>,
    channel_id: ChannelID,
    capacity: Option<usize>,
}

impl ChannelSpec {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            sender_ids: Mutex::new(vec![]),
            receiver_id: Mutex::new(None),
            channel_id: ChannelID::new(),
            capacity,
        }
    }

    pub fn sender_ids(&self) -> Vec<Identifier> {
        self.sender_ids.lock().clone()
    }

    pub fn receiver_id(&self) -> Option<Identifier> {
        *self.receiver_id.lock()
    }

    // Shared channels can have several producers, so repeated attachment only records new ones.
    pub fn attach_sender(&self, sender: &dyn Identifiable) {
        let mut senders = self.sender_ids.lock();
        let id = sender.id();
        if !senders.contains(&id) {
            senders.push(id);
        }
    }

    pub fn attach_receiver(&self, receiver: &dyn Identifiable) {
        let mut current = self.receiver_id.lock();
        let id = receiver.id();
        match *current {
            Some(existing) if existing != id => panic!(
                "{:?} already has receiver {existing}, cannot attach {id}",
                self.channel_id
            ),
            _ => *current = Some(id),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn id(&self) -> ChannelID {
        self.channel_id
    }
}
