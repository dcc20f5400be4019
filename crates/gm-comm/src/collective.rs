//! Blocking collectives over a [`Communicator`].
//!
//! All members of the group must enter the same collective with the same
//! root, in the same order relative to their other collective calls.
//! The algorithms are linear and root-centric: the root exchanges directly
//! with every other member, visiting them in ascending group rank.

use tracing::trace;

use crate::communicator::{copy_exact, Communicator, Source, TagMatch};
use crate::error::{CommError, Result};
use crate::universe::Channel;

const TAG_BCAST: u32 = 1;
const TAG_SCATTER: u32 = 2;
const TAG_GATHER: u32 = 3;
const TAG_REDUCE: u32 = 4;
const TAG_BARRIER: u32 = 5;

/// Result of a sum-reduction, available at the root only.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    pub data: Vec<f32>,
    /// Number of member buffers that were summed, the root's included.
    pub contributions: usize,
}

impl Communicator {
    /// One-to-all broadcast of `buf` from `root`.
    pub fn broadcast(&self, buf: &mut [f32], root: usize) -> Result<()> {
        self.check_root(root)?;
        trace!(root, len = buf.len(), "broadcast");
        if self.rank() == root {
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.post(dest, Channel::Collective, TAG_BCAST, buf.to_vec())?;
            }
            Ok(())
        } else {
            let envelope = self.take(Channel::Collective, Source::Rank(root), TagMatch::Tag(TAG_BCAST))?;
            copy_exact(buf, &envelope.payload)
        }
    }

    /// Split `send` (root only) into `size` equal chunks; member `r` gets
    /// chunk `r` in `recv`.
    pub fn scatter(&self, send: Option<&[f32]>, recv: &mut [f32], root: usize) -> Result<()> {
        self.check_root(root)?;
        trace!(root, chunk = recv.len(), "scatter");
        let chunk = recv.len();
        if self.rank() == root {
            let send = send.ok_or_else(|| {
                CommError::Other("scatter root must supply a send buffer".to_string())
            })?;
            if send.len() != chunk * self.size() {
                return Err(CommError::LengthMismatch {
                    expected: chunk * self.size(),
                    got: send.len(),
                });
            }
            for dest in 0..self.size() {
                let part = &send[dest * chunk..(dest + 1) * chunk];
                if dest == root {
                    recv.copy_from_slice(part);
                } else {
                    self.post(dest, Channel::Collective, TAG_SCATTER, part.to_vec())?;
                }
            }
            Ok(())
        } else {
            let envelope = self.take(Channel::Collective, Source::Rank(root), TagMatch::Tag(TAG_SCATTER))?;
            copy_exact(recv, &envelope.payload)
        }
    }

    /// Concatenate every member's `send` at `root`, in group rank order.
    ///
    /// Returns `Some` at the root and `None` elsewhere. All members must
    /// contribute buffers of the same length.
    pub fn gather(&self, send: &[f32], root: usize) -> Result<Option<Vec<f32>>> {
        self.check_root(root)?;
        trace!(root, len = send.len(), "gather");
        if self.rank() != root {
            self.post(root, Channel::Collective, TAG_GATHER, send.to_vec())?;
            return Ok(None);
        }
        let mut out = Vec::with_capacity(send.len() * self.size());
        for source in 0..self.size() {
            if source == root {
                out.extend_from_slice(send);
                continue;
            }
            let envelope = self.take(Channel::Collective, Source::Rank(source), TagMatch::Tag(TAG_GATHER))?;
            if envelope.payload.len() != send.len() {
                return Err(CommError::LengthMismatch {
                    expected: send.len(),
                    got: envelope.payload.len(),
                });
            }
            out.extend_from_slice(&envelope.payload);
        }
        Ok(Some(out))
    }

    /// All-to-one element-wise sum of every member's `send` at `root`.
    ///
    /// Partial buffers are added in ascending group rank order, so the
    /// rounding is reproducible for a given group.
    pub fn reduce_sum(&self, send: &[f32], root: usize) -> Result<Option<Reduced>> {
        self.check_root(root)?;
        trace!(root, len = send.len(), "reduce_sum");
        if self.rank() != root {
            self.post(root, Channel::Collective, TAG_REDUCE, send.to_vec())?;
            return Ok(None);
        }
        let mut acc = vec![0.0f32; send.len()];
        for source in 0..self.size() {
            let part = if source == root {
                send.to_vec()
            } else {
                self.take(Channel::Collective, Source::Rank(source), TagMatch::Tag(TAG_REDUCE))?
                    .payload
            };
            if part.len() != acc.len() {
                return Err(CommError::LengthMismatch {
                    expected: acc.len(),
                    got: part.len(),
                });
            }
            for (a, p) in acc.iter_mut().zip(&part) {
                *a += p;
            }
        }
        Ok(Some(Reduced {
            data: acc,
            contributions: self.size(),
        }))
    }

    /// Block until every member has entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        if self.rank() == 0 {
            for source in 1..self.size() {
                self.take(Channel::Collective, Source::Rank(source), TagMatch::Tag(TAG_BARRIER))?;
            }
            for dest in 1..self.size() {
                self.post(dest, Channel::Collective, TAG_BARRIER, Vec::new())?;
            }
        } else {
            self.post(0, Channel::Collective, TAG_BARRIER, Vec::new())?;
            self.take(Channel::Collective, Source::Rank(0), TagMatch::Tag(TAG_BARRIER))?;
        }
        Ok(())
    }

    fn check_root(&self, root: usize) -> Result<()> {
        if root >= self.size() {
            return Err(CommError::InvalidRank {
                rank: root,
                size: self.size(),
            });
        }
        Ok(())
    }
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
    fn test_broadcast_from_nonzero_root() {
        let out = run(4, |comm| {
            let mut buf = if comm.rank() == 2 {
                vec![4.0, 5.0]
            } else {
                vec![0.0, 0.0]
            };
            comm.broadcast(&mut buf, 2)?;
            Ok(buf)
        });
        assert!(out.iter().all(|b| b == &vec![4.0, 5.0]));
    }

    #[test]
    fn test_scatter() {
        let out = run(3, |comm| {
            let send: Vec<f32> = (0..6).map(|v| v as f32).collect();
            let mut recv = vec![0.0; 2];
            let root_buf = if comm.rank() == 1 { Some(send.as_slice()) } else { None };
            comm.scatter(root_buf, &mut recv, 1)?;
            Ok(recv)
        });
        assert_eq!(out, vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]);
    }

    #[test]
    fn test_gather() {
        let out = run(3, |comm| comm.gather(&[comm.rank() as f32; 2], 0));
        assert_eq!(out[0], Some(vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]));
        assert_eq!(out[1], None);
    }

    #[test]
    fn test_reduce_sum_counts_contributions() {
        let out = run(4, |comm| comm.reduce_sum(&[1.0, comm.rank() as f32], 3));
        let reduced = out[3].clone().unwrap();
        assert_eq!(reduced.data, vec![4.0, 6.0]);
        assert_eq!(reduced.contributions, 4);
        assert!(out[0].is_none());
    }

    #[test]
    fn test_collectives_do_not_match_point_to_point() {
        let out = run(2, |comm| {
            if comm.rank() == 0 {
                comm.send(1, TAG_BCAST, &[9.0])?;
                let mut buf = [1.0];
                comm.broadcast(&mut buf, 0)?;
                Ok(buf[0])
            } else {
                let mut buf = [0.0];
                comm.broadcast(&mut buf, 0)?;
                let (p2p, _) = comm.recv(Source::Rank(0), TagMatch::Any)?;
                Ok(buf[0] + p2p[0] * 10.0)
            }
        });
        assert_eq!(out[1], 91.0);
    }

    #[test]
    fn test_barrier_and_bad_root() {
        let out = Universe::new(3).unwrap().run(|comm| {
            comm.barrier()?;
            let mut buf = [0.0];
            comm.broadcast(&mut buf, 3)
        });
        assert!(out
            .iter()
            .all(|r| matches!(r, Err(CommError::InvalidRank { rank: 3, size: 3 }))));
    }
}
