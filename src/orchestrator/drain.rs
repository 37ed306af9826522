use crate::{
    channel::{wait_any, DequeueError, Receiver},
    config::{Completion, DrainMode},
    packet::{ClassScorePacket, Score},
};

/// What one look at a class stream produced.
enum Observation {
    Score(Score),
    NotReady,
    Finished,
}

/// Pulls rows out of the final class streams until the completion predicate holds.
///
/// A class is finished once it has delivered its `last` sentinel or closed. Each row holds one cell per class,
/// `None` where the class had nothing to offer. Looks that only surface sentinels produce no row.
pub struct Drain<'a> {
    streams: &'a mut [Receiver<ClassScorePacket>],
    finished: Vec<bool>,
    mode: DrainMode,
    completion: Completion,
    rows: usize,
}

impl<'a> Drain<'a> {
    pub fn new(
        streams: &'a mut [Receiver<ClassScorePacket>],
        mode: DrainMode,
        completion: Completion,
    ) -> Self {
        Self {
            finished: vec![false; streams.len()],
            streams,
            mode,
            completion,
            rows: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        let sentinels = self.finished.iter().all(|finished| *finished);
        match self.completion {
            Completion::AllSentinels => sentinels,
            Completion::Rows { count } => sentinels || self.rows >= count,
        }
    }

    fn observe(&mut self, class: usize, blocking: bool) -> Observation {
        let stream = &mut self.streams[class];
        let result = if blocking {
            stream.dequeue()
        } else {
            stream.pop()
        };
        match result {
            Ok(packet) if packet.last => {
                self.finished[class] = true;
                Observation::Finished
            }
            Ok(packet) => Observation::Score(packet.data),
            Err(DequeueError::Empty(_)) => Observation::NotReady,
            Err(DequeueError::Closed(_)) => {
                self.finished[class] = true;
                Observation::Finished
            }
        }
    }

    fn look(&mut self) -> Vec<Option<Score>> {
        let blocking = match self.mode {
            DrainMode::Aligned => true,
            DrainMode::Poll => {
                wait_any(
                    self.streams
                        .iter()
                        .zip(&self.finished)
                        .filter(|(_, finished)| !**finished)
                        .map(|(stream, _)| stream),
                );
                false
            }
        };
        (0..self.streams.len())
            .map(|class| {
                if self.finished[class] {
                    return None;
                }
                match self.observe(class, blocking) {
                    Observation::Score(score) => Some(score),
                    Observation::NotReady | Observation::Finished => None,
                }
            })
            .collect()
    }
}

impl Iterator for Drain<'_> {
    type Item = Vec<Option<Score>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.is_complete() {
            let row = self.look();
            if row.iter().any(Option::is_some) {
                self.rows += 1;
                return Some(row);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel::make_channel, packet::Packet};

    fn stream(scores: &[f64], sentinel: bool) -> Receiver<ClassScorePacket> {
        let (snd, rcv) = make_channel(None);
        for (id, score) in scores.iter().enumerate() {
            snd.enqueue(Packet::new(id, *score)).unwrap();
        }
        if sentinel {
            snd.enqueue(ClassScorePacket::sentinel()).unwrap();
        }
        rcv
    }

    #[test]
    fn aligned_rows_follow_samples() {
        let mut streams = vec![stream(&[1.0, 2.0], true), stream(&[3.0, 4.0], true)];
        let rows: Vec<_> =
            Drain::new(&mut streams, DrainMode::Aligned, Completion::AllSentinels).collect();
        assert_eq!(
            rows,
            vec![vec![Some(1.0), Some(3.0)], vec![Some(2.0), Some(4.0)]]
        );
    }

    #[test]
    fn silent_class_reads_nan() {
        let mut streams = vec![stream(&[0.5], true), stream(&[], true)];
        let rows: Vec<_> =
            Drain::new(&mut streams, DrainMode::Aligned, Completion::AllSentinels).collect();
        assert_eq!(rows, vec![vec![Some(0.5), None]]);

        let mut streams = vec![stream(&[0.5], true), stream(&[], true)];
        let rows: Vec<_> =
            Drain::new(&mut streams, DrainMode::Poll, Completion::AllSentinels).collect();
        assert_eq!(rows, vec![vec![Some(0.5), None]]);
    }

    #[test]
    fn sentinels_alone_give_no_rows() {
        let mut streams = vec![stream(&[], true), stream(&[], false)];
        let rows: Vec<_> =
            Drain::new(&mut streams, DrainMode::Aligned, Completion::AllSentinels).collect();
        assert!(rows.is_empty());
    }

    #[test]
    fn row_limit_stops_early() {
        let mut streams = vec![stream(&[1.0, 2.0, 3.0], true)];
        let mut drain = Drain::new(&mut streams, DrainMode::Poll, Completion::Rows { count: 2 });
        assert_eq!(drain.next(), Some(vec![Some(1.0)]));
        assert_eq!(drain.next(), Some(vec![Some(2.0)]));
        assert!(drain.is_complete());
        assert_eq!(drain.next(), None);
    }

    #[test]
    fn poll_waits_for_late_data() {
        let (snd, rcv) = make_channel(None);
        let mut streams = vec![rcv];
        std::thread::scope(|s| {
            s.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                snd.enqueue(Packet::new(0, 7.0)).unwrap();
                snd.enqueue(ClassScorePacket::sentinel()).unwrap();
            });
            let rows: Vec<_> =
                Drain::new(&mut streams, DrainMode::Poll, Completion::AllSentinels).collect();
            assert_eq!(rows, vec![vec![Some(7.0)]]);
        });
    }
}
