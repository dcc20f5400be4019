use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::error::{CommError, Result};
use crate::universe::{Channel, Envelope, Mailbox};

const WORLD_CONTEXT: u64 = 0xcbf2_9ce4_8422_2325;
const CONTEXT_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Which sender a receive accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Only the given group rank.
    Rank(usize),
    /// Any member of the group.
    Any,
}

/// Which tag a receive accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch {
    Tag(u32),
    Any,
}

/// Envelope information of a completed receive, in group ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub source: usize,
    pub tag: u32,
}

/// A group of workers with its own message context.
///
/// Ranks exposed by a communicator are group ranks (`0..size`); the
/// mapping to world ranks is internal. Messages sent on one communicator
/// are only ever matched by receives on the same communicator.
///
/// Every call blocks the caller until its own part of the exchange is done.
/// Sends are buffered and return immediately.
#[derive(Debug, Clone)]
pub struct Communicator {
    mailbox: Rc<RefCell<Mailbox>>,
    /// World ranks of the members, indexed by group rank.
    members: Rc<[usize]>,
    rank: usize,
    context: u64,
    derived: Rc<Cell<u64>>,
}

impl Communicator {
    pub(crate) fn world(mailbox: Mailbox) -> Self {
        let size = mailbox.size();
        let rank = mailbox.rank();
        Communicator {
            mailbox: Rc::new(RefCell::new(mailbox)),
            members: (0..size).collect(),
            rank,
            context: WORLD_CONTEXT,
            derived: Rc::new(Cell::new(0)),
        }
    }

    /// This worker's rank within the group.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of workers in the group.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// This worker's rank in the world group.
    pub fn world_rank(&self) -> usize {
        self.members[self.rank]
    }

    /// World ranks of the members, indexed by group rank.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Create a sub-group containing the given group ranks, in that order.
    ///
    /// Purely local: every member must call `derive` the same number of
    /// times in the same order so that their context ids agree. Groups built
    /// from disjoint member sets may share a context id.
    pub fn derive(&self, group_ranks: &[usize]) -> Result<Communicator> {
        let counter = self.derived.get() + 1;
        self.derived.set(counter);

        let mut members = Vec::with_capacity(group_ranks.len());
        for &r in group_ranks {
            members.push(self.world_of(r)?);
        }
        let rank = group_ranks
            .iter()
            .position(|&r| r == self.rank)
            .ok_or_else(|| {
                CommError::Other(format!(
                    "rank {} is not a member of the derived group {:?}",
                    self.rank, group_ranks
                ))
            })?;

        Ok(Communicator {
            mailbox: Rc::clone(&self.mailbox),
            members: members.into(),
            rank,
            context: (self.context ^ counter).wrapping_mul(CONTEXT_PRIME),
            derived: Rc::new(Cell::new(0)),
        })
    }

    /// Send `data` to group rank `dest` with `tag`.
    pub fn send(&self, dest: usize, tag: u32, data: &[f32]) -> Result<()> {
        trace!(dest, tag, len = data.len(), "send");
        self.post(dest, Channel::PointToPoint, tag, data.to_vec())
    }

    /// Receive the first message matching `source` and `tag`.
    pub fn recv(&self, source: Source, tag: TagMatch) -> Result<(Vec<f32>, Status)> {
        let envelope = self.take(Channel::PointToPoint, source, tag)?;
        let status = self.status_of(&envelope)?;
        trace!(source = status.source, tag = status.tag, "recv");
        Ok((envelope.payload, status))
    }

    /// Receive into `buf`; the message must have exactly `buf.len()` elements.
    pub fn recv_into(&self, buf: &mut [f32], source: Source, tag: TagMatch) -> Result<Status> {
        let (payload, status) = self.recv(source, tag)?;
        copy_exact(buf, &payload)?;
        Ok(status)
    }

    /// Receive a matching message only if one has already arrived.
    pub fn try_recv(&self, source: Source, tag: TagMatch) -> Result<Option<(Vec<f32>, Status)>> {
        match self.try_take(Channel::PointToPoint, source, tag)? {
            Some(envelope) => {
                let status = self.status_of(&envelope)?;
                Ok(Some((envelope.payload, status)))
            }
            None => Ok(None),
        }
    }

    /// Send `buf` to `dest` and replace its contents with the message from
    /// `source`, as one exchange.
    ///
    /// Because sends are buffered, a ring of workers all calling this at
    /// once cannot deadlock.
    pub fn sendrecv_replace(
        &self,
        buf: &mut [f32],
        dest: usize,
        source: usize,
        tag: u32,
    ) -> Result<Status> {
        if dest == self.rank && source == self.rank {
            return Ok(Status {
                source: self.rank,
                tag,
            });
        }
        self.send(dest, tag, buf)?;
        self.recv_into(buf, Source::Rank(source), TagMatch::Tag(tag))
    }

    pub(crate) fn post(&self, dest: usize, channel: Channel, tag: u32, payload: Vec<f32>) -> Result<()> {
        let world_dest = self.world_of(dest)?;
        let envelope = Envelope {
            context: self.context,
            channel,
            source: self.world_rank(),
            tag,
            payload,
        };
        self.mailbox.borrow().post(world_dest, envelope)
    }

    pub(crate) fn take(&self, channel: Channel, source: Source, tag: TagMatch) -> Result<Envelope> {
        let matches = self.matcher(channel, source, tag)?;
        self.mailbox.borrow_mut().take(matches)
    }

    pub(crate) fn try_take(
        &self,
        channel: Channel,
        source: Source,
        tag: TagMatch,
    ) -> Result<Option<Envelope>> {
        let matches = self.matcher(channel, source, tag)?;
        self.mailbox.borrow_mut().try_take(matches)
    }

    fn matcher(
        &self,
        channel: Channel,
        source: Source,
        tag: TagMatch,
    ) -> Result<impl Fn(&Envelope) -> bool> {
        let world_source = match source {
            Source::Rank(r) => Some(self.world_of(r)?),
            Source::Any => None,
        };
        let context = self.context;
        let members = Rc::clone(&self.members);
        Ok(move |e: &Envelope| {
            e.context == context
                && e.channel == channel
                && match world_source {
                    Some(s) => e.source == s,
                    None => members.contains(&e.source),
                }
                && match tag {
                    TagMatch::Tag(t) => e.tag == t,
                    TagMatch::Any => true,
                }
        })
    }

    fn status_of(&self, envelope: &Envelope) -> Result<Status> {
        let source = self
            .members
            .iter()
            .position(|&w| w == envelope.source)
            .ok_or(CommError::InvalidRank {
                rank: envelope.source,
                size: self.size(),
            })?;
        Ok(Status {
            source,
            tag: envelope.tag,
        })
    }

    fn world_of(&self, rank: usize) -> Result<usize> {
        self.members.get(rank).copied().ok_or(CommError::InvalidRank {
            rank,
            size: self.size(),
        })
    }
}

pub(crate) fn copy_exact(buf: &mut [f32], payload: &[f32]) -> Result<()> {
    if payload.len() != buf.len() {
        return Err(CommError::LengthMismatch {
            expected: buf.len(),
            got: payload.len(),
        });
    }
    buf.copy_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::Universe;

    fn run<T: Send>(size: usize, f: impl Fn(Communicator) -> Result<T> + Sync) -> Vec<T> {
        Universe::new(size)
            .unwrap()
            .run(f)
            .into_iter()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_send_recv() {
        let out = run(2, |comm| {
            if comm.rank() == 0 {
                comm.send(1, 7, &[1.0, 2.0])?;
                Ok(vec![])
            } else {
                let (data, status) = comm.recv(Source::Rank(0), TagMatch::Tag(7))?;
                assert_eq!(status, Status { source: 0, tag: 7 });
                Ok(data)
            }
        });
        assert_eq!(out[1], vec![1.0, 2.0]);
    }

    #[test]
    fn test_out_of_order_tags_are_queued() {
        let out = run(2, |comm| {
            if comm.rank() == 0 {
                comm.send(1, 1, &[1.0])?;
                comm.send(1, 2, &[2.0])?;
                Ok(vec![])
            } else {
                let (second, _) = comm.recv(Source::Rank(0), TagMatch::Tag(2))?;
                let (first, _) = comm.recv(Source::Rank(0), TagMatch::Tag(1))?;
                Ok(vec![first[0], second[0]])
            }
        });
        assert_eq!(out[1], vec![1.0, 2.0]);
    }

    #[test]
    fn test_wildcard_receive_reports_source() {
        let out = run(3, |comm| {
            if comm.rank() == 0 {
                let mut seen = Vec::new();
                for _ in 0..2 {
                    let (data, status) = comm.recv(Source::Any, TagMatch::Any)?;
                    assert_eq!(data[0] as usize, status.source);
                    assert_eq!(status.tag as usize, status.source + 100);
                    seen.push(status.source);
                }
                seen.sort_unstable();
                Ok(seen)
            } else {
                comm.send(0, 100 + comm.rank() as u32, &[comm.rank() as f32])?;
                Ok(vec![])
            }
        });
        assert_eq!(out[0], vec![1, 2]);
    }

    #[test]
    fn test_recv_into_length_checked() {
        let out = Universe::new(2).unwrap().run(|comm| {
            if comm.rank() == 0 {
                comm.send(1, 0, &[1.0, 2.0, 3.0])
            } else {
                let mut buf = [0.0; 2];
                comm.recv_into(&mut buf, Source::Rank(0), TagMatch::Any)
                    .map(|_| ())
            }
        });
        assert!(out[0].is_ok());
        assert!(matches!(
            out[1],
            Err(CommError::LengthMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_sendrecv_replace_ring() {
        let out = run(4, |comm| {
            let size = comm.size();
            let mut buf = [comm.rank() as f32];
            let left = (comm.rank() + size - 1) % size;
            let right = (comm.rank() + 1) % size;
            comm.sendrecv_replace(&mut buf, left, right, 1)?;
            Ok(buf[0])
        });
        assert_eq!(out, vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_derived_groups_are_isolated() {
        let out = run(4, |comm| {
            // Two overlapping views of the same members.
            let evens_first: Vec<usize> = vec![0, 2, 1, 3];
            let a = comm.derive(&evens_first)?;
            let b = comm.derive(&[0, 1, 2, 3])?;
            if comm.rank() == 0 {
                b.send(1, 5, &[2.0])?;
                a.send(1, 5, &[1.0])?;
                Ok(0.0)
            } else if comm.rank() == 2 {
                // Group rank 1 in `a` is world rank 2.
                let (data, _) = a.recv(Source::Rank(0), TagMatch::Tag(5))?;
                Ok(data[0])
            } else if comm.rank() == 1 {
                let (data, _) = b.recv(Source::Rank(0), TagMatch::Tag(5))?;
                Ok(data[0])
            } else {
                Ok(0.0)
            }
        });
        assert_eq!(out[2], 1.0);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn test_derive_requires_membership() {
        let out = Universe::new(2)
            .unwrap()
            .run(|comm| comm.derive(&[0]).map(|c| c.size()));
        assert_eq!(out[0].as_ref().unwrap(), &1);
        assert!(out[1].is_err());
    }

    #[test]
    fn test_try_recv_does_not_block() {
        let out = run(2, |comm| {
            if comm.rank() == 0 {
                comm.send(1, 3, &[3.0])?;
                comm.barrier()?;
                comm.send(1, 9, &[9.0])?;
                comm.barrier()?;
                Ok(vec![])
            } else {
                // Tag 9 is only sent after the first barrier.
                assert!(comm.try_recv(Source::Rank(0), TagMatch::Tag(9))?.is_none());
                comm.barrier()?;
                comm.barrier()?;
                let (late, status) = comm
                    .try_recv(Source::Any, TagMatch::Tag(9))?
                    .expect("sent before the second barrier");
                assert_eq!(status, Status { source: 0, tag: 9 });
                assert!(comm.try_recv(Source::Any, TagMatch::Tag(9))?.is_none());
                let (early, _) = comm.recv(Source::Rank(0), TagMatch::Tag(3))?;
                Ok(vec![early[0], late[0]])
            }
        });
        assert_eq!(out[1], vec![3.0, 9.0]);
    }
}
