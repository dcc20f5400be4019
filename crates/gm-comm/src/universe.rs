use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use tracing::{debug, info_span, warn};

use crate::communicator::Communicator;
use crate::error::{CommError, Result};

/// Traffic class of an envelope. Collective traffic never matches a
/// point-to-point receive and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    PointToPoint,
    Collective,
}

/// One message in flight between two workers.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub context: u64,
    pub channel: Channel,
    /// World rank of the sender.
    pub source: usize,
    pub tag: u32,
    pub payload: Vec<f32>,
}

#[derive(Debug)]
pub(crate) enum Message {
    Data(Envelope),
    Abort { origin: usize },
}

/// Per-worker endpoint: the inbox plus a sender to every worker.
///
/// Envelopes that arrive before a matching receive is posted wait in
/// `pending`, in arrival order.
#[derive(Debug)]
pub(crate) struct Mailbox {
    rank: usize,
    inbox: Receiver<Message>,
    outboxes: Vec<Sender<Message>>,
    pending: VecDeque<Envelope>,
    aborted: Option<usize>,
}

impl Mailbox {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.outboxes.len()
    }

    /// Deliver `envelope` to world rank `dest`. Never blocks.
    pub fn post(&self, dest: usize, envelope: Envelope) -> Result<()> {
        let outbox = self.outboxes.get(dest).ok_or(CommError::InvalidRank {
            rank: dest,
            size: self.outboxes.len(),
        })?;
        outbox
            .send(Message::Data(envelope))
            .map_err(|_| CommError::Disconnected(dest))
    }

    /// Block until an envelope satisfying `matches` is available.
    pub fn take<F>(&mut self, matches: F) -> Result<Envelope>
    where
        F: Fn(&Envelope) -> bool,
    {
        if let Some(origin) = self.aborted {
            return Err(CommError::Aborted { origin });
        }
        if let Some(pos) = self.pending.iter().position(&matches) {
            if let Some(envelope) = self.pending.remove(pos) {
                return Ok(envelope);
            }
        }
        loop {
            match self.inbox.recv() {
                Ok(Message::Data(envelope)) => {
                    if matches(&envelope) {
                        return Ok(envelope);
                    }
                    self.pending.push_back(envelope);
                }
                Ok(Message::Abort { origin }) => {
                    self.aborted = Some(origin);
                    return Err(CommError::Aborted { origin });
                }
                Err(_) => return Err(CommError::Disconnected(self.rank)),
            }
        }
    }

    /// Like [`Mailbox::take`], but returns `None` instead of blocking when
    /// no matching envelope has arrived yet.
    pub fn try_take<F>(&mut self, matches: F) -> Result<Option<Envelope>>
    where
        F: Fn(&Envelope) -> bool,
    {
        if let Some(origin) = self.aborted {
            return Err(CommError::Aborted { origin });
        }
        loop {
            match self.inbox.try_recv() {
                Ok(Message::Data(envelope)) => self.pending.push_back(envelope),
                Ok(Message::Abort { origin }) => {
                    self.aborted = Some(origin);
                    return Err(CommError::Aborted { origin });
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(self
            .pending
            .iter()
            .position(&matches)
            .and_then(|pos| self.pending.remove(pos)))
    }
}

/// Tell every worker to stop waiting. Delivery failures are ignored: a
/// worker whose inbox is gone has already finished.
fn broadcast_abort(outboxes: &[Sender<Message>], origin: usize) {
    for outbox in outboxes {
        let _ = outbox.send(Message::Abort { origin });
    }
}

/// A fixed set of workers, each run on its own OS thread.
///
/// `run` hands every worker its world `Communicator` and returns the
/// per-rank results in rank order once all workers have finished.
#[derive(Debug, Clone, Copy)]
pub struct Universe {
    size: usize,
}

impl Universe {
    /// Create a universe of `size` workers.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(CommError::InvalidRank { rank: 0, size: 0 });
        }
        Ok(Universe { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `worker` once per rank and collect the results.
    ///
    /// If any worker fails or panics, the remaining workers are sent an
    /// abort notice so that blocked receives return
    /// [`CommError::Aborted`] instead of waiting forever.
    pub fn run<T, E, F>(&self, worker: F) -> Vec<std::result::Result<T, E>>
    where
        T: Send,
        E: Send + From<CommError>,
        F: Fn(Communicator) -> std::result::Result<T, E> + Sync,
    {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| mpsc::channel::<Message>()).unzip();

        debug!(size = self.size, "starting universe");

        thread::scope(|scope| {
            let worker = &worker;
            let handles: Vec<_> = receivers
                .into_iter()
                .enumerate()
                .map(|(rank, inbox)| {
                    let outboxes = senders.clone();
                    scope.spawn(move || {
                        let _span = info_span!("worker", rank).entered();
                        let abort_handles = outboxes.clone();
                        let mailbox = Mailbox {
                            rank,
                            inbox,
                            outboxes,
                            pending: VecDeque::new(),
                            aborted: None,
                        };
                        let comm = Communicator::world(mailbox);
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker(comm)));
                        match outcome {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(e)) => {
                                warn!(rank, "worker failed, aborting peers");
                                broadcast_abort(&abort_handles, rank);
                                Err(e)
                            }
                            Err(_) => {
                                warn!(rank, "worker panicked, aborting peers");
                                broadcast_abort(&abort_handles, rank);
                                Err(E::from(CommError::WorkerPanicked(rank)))
                            }
                        }
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(E::from(CommError::WorkerPanicked(rank))))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::{Source, TagMatch};

    #[test]
    fn test_zero_size_rejected() {
        assert!(Universe::new(0).is_err());
    }

    #[test]
    fn test_results_in_rank_order() {
        let results = Universe::new(4)
            .unwrap()
            .run(|comm| Ok::<_, CommError>(comm.rank() * 10));
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_failure_aborts_blocked_peers() {
        let results = Universe::new(3).unwrap().run(|comm| {
            if comm.rank() == 2 {
                return Err(CommError::Other("boom".to_string()));
            }
            // Nobody ever sends this message.
            comm.recv(Source::Rank(2), TagMatch::Any)?;
            Ok(())
        });
        assert!(matches!(results[0], Err(CommError::Aborted { origin: 2 })));
        assert!(matches!(results[1], Err(CommError::Aborted { origin: 2 })));
        assert!(matches!(results[2], Err(CommError::Other(_))));
    }

    #[test]
    fn test_panic_is_reported() {
        let results = Universe::new(2).unwrap().run(|comm| {
            if comm.rank() == 0 {
                panic!("worker 0 gives up");
            }
            comm.recv(Source::Rank(0), TagMatch::Any)?;
            Ok::<_, CommError>(())
        });
        assert!(matches!(results[0], Err(CommError::WorkerPanicked(0))));
        assert!(matches!(results[1], Err(CommError::Aborted { origin: 0 })));
    }
}
