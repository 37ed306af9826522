use crossbeam::channel::Select;

use super::Receiver;

/// Blocks until at least one of the receivers has data buffered or has closed.
/// Returns immediately if any receiver already holds a peeked element, or if no receivers were given.
pub fn wait_any<'a, T: 'a, I>(receivers: I)
where
    I: IntoIterator<Item = &'a Receiver<T>>,
{
    let mut select = Select::new();
    let mut registered = 0;
    for receiver in receivers {
        if receiver.head.is_some() {
            return;
        }
        select.recv(&receiver.underlying);
        registered += 1;
    }
    if registered > 0 {
        select.ready();
    }
}
