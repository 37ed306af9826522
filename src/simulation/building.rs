use crate::{
    channel::{make_channel, Receiver, Sender},
    context::Context,
    datastructures::{ExternalEndpoint, Identifiable},
};

use super::{
    programdata::ProgramData, InitializationError, InitializationOptions, Initialized,
};

#[derive(Default)]
pub struct ProgramBuilder<'a> {
    data: ProgramData<'a>,
}

impl<'a> ProgramBuilder<'a> {
    /// Creates a channel; `None` means unbounded.
    pub fn channel<T>(&mut self, capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
        let (snd, rcv) = make_channel(capacity);
        self.data.edges.push(snd.spec.clone());
        (snd, rcv)
    }

    pub fn bounded<T>(&mut self, capacity: usize) -> (Sender<T>, Receiver<T>) {
        self.channel(Some(capacity))
    }

    pub fn unbounded<T>(&mut self) -> (Sender<T>, Receiver<T>) {
        self.channel(None)
    }

    /// Registers a participant that drives channels from outside the program, such as a test bench.
    pub fn external(&mut self, name: &str) -> ExternalEndpoint {
        let endpoint = ExternalEndpoint::new(name);
        self.data.externals.push(endpoint.verbose());
        endpoint
    }

    pub fn add_child<T>(&mut self, child: T)
    where
        T: Context + 'a,
    {
        self.data.nodes.push(Box::new(child));
    }

    pub fn initialize(
        mut self,
        options: InitializationOptions,
    ) -> Result<Initialized<'a>, InitializationError> {
        self.data.check()?;
        if options.check_acyclic {
            self.data.check_acyclic()?;
        }

        self.data.nodes.iter_mut().for_each(|child| child.init());

        Ok(Initialized { data: self.data })
    }
}
