use thiserror::Error;

use crate::{
    channel::{DequeueError, EnqueueError, Receiver, Sender},
    packet::HasPayload,
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TeeError {
    #[error("tee input failed: {0}")]
    Dequeue(#[from] DequeueError),

    #[error("tee output failed: {0}")]
    Enqueue(#[from] EnqueueError),
}

/// Moves exactly one packet from `input` to `output` and hands its payload to the caller.
/// Blocks until a packet is available.
pub fn tee<P>(input: &mut Receiver<P>, output: &Sender<P>) -> Result<P::Payload, TeeError>
where
    P: HasPayload,
{
    let packet = input.dequeue()?;
    let payload = packet.payload().clone();
    output.enqueue(packet)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::make_channel,
        packet::{Packet, TreeScore},
    };

    #[test]
    fn tee_copies_and_returns_payload() {
        let (in_snd, mut in_rcv) = make_channel(Some(4));
        let (out_snd, mut out_rcv) = make_channel(Some(4));

        let pkt = Packet::new(
            2,
            TreeScore {
                tree: 1,
                score: 0.75,
            },
        )
        .with_dest(1);
        in_snd.enqueue(pkt.clone()).unwrap();

        let payload = tee(&mut in_rcv, &out_snd).unwrap();
        assert_eq!(payload, pkt.data);
        assert_eq!(out_rcv.pop().unwrap(), pkt);
        assert!(!out_rcv.has_data());
        assert!(!in_rcv.has_data());
    }

    #[test]
    fn tee_moves_one_packet_per_call() {
        let (in_snd, mut in_rcv) = make_channel(None);
        let (out_snd, mut out_rcv) = make_channel(None);
        for i in 0..3usize {
            in_snd.enqueue(Packet::new(i, i * 10)).unwrap();
        }

        assert_eq!(tee(&mut in_rcv, &out_snd).unwrap(), 0);
        assert_eq!(out_rcv.pop().unwrap().id, 0);
        assert!(!out_rcv.has_data());
        assert_eq!(tee(&mut in_rcv, &out_snd).unwrap(), 10);
        assert_eq!(tee(&mut in_rcv, &out_snd).unwrap(), 20);
        assert_eq!(out_rcv.pop().unwrap().id, 1);
        assert_eq!(out_rcv.pop().unwrap().id, 2);
    }

    #[test]
    fn tee_blocks_until_a_packet_arrives() {
        let (in_snd, mut in_rcv) = make_channel(Some(1));
        let (out_snd, mut out_rcv) = make_channel(Some(1));

        std::thread::scope(|s| {
            s.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                in_snd.enqueue(Packet::new(0, 1.5f64)).unwrap();
            });
            assert_eq!(tee(&mut in_rcv, &out_snd).unwrap(), 1.5);
        });
        assert_eq!(out_rcv.pop().unwrap().data, 1.5);
    }

    #[test]
    fn tee_reports_closed_input() {
        let (in_snd, mut in_rcv) = make_channel::<Packet<f64>>(None);
        let (out_snd, _out_rcv) = make_channel(None);
        drop(in_snd);
        assert!(matches!(
            tee(&mut in_rcv, &out_snd),
            Err(TeeError::Dequeue(DequeueError::Closed(_)))
        ));
    }
}
