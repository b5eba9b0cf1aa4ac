//! In-process runtime running one thread per rank

use crate::topology::{coordinates_in, rank_in, shift_in};
use crate::traits::{CartesianComm, Operation, ProcessGroup, TransferFailure};
use crate::types::{Cell, Rank, Tag, TileHeader, TransportError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

enum Payload {
    Header(TileHeader),
    Cells(Vec<Cell>),
    Abort(i32),
}

struct Envelope {
    source: Rank,
    tag: Tag,
    payload: Payload,
}

/// A set of in-process ranks connected by channels.
///
/// Sends are buffered and never block. Receives match on source and tag;
/// envelopes that arrive early are parked, so delivery between any pair of
/// ranks keeps send order.
#[derive(Debug, Clone)]
pub struct LocalUniverse {
    size: usize,
    failing: HashSet<Rank>,
}

impl LocalUniverse {
    /// A universe of `size` ranks
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "A universe needs at least one rank");
        Self {
            size,
            failing: HashSet::new(),
        }
    }

    /// Make every receive on `rank` fail
    pub fn fail_receives_on(mut self, rank: Rank) -> Self {
        self.failing.insert(rank);
        self
    }

    /// One connected process group per rank, in rank order
    pub fn groups(&self) -> Vec<LocalGroup> {
        let (senders, inboxes): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| unbounded::<Envelope>()).unzip();
        let senders = Arc::new(senders);
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalGroup {
                rank: rank as Rank,
                senders: Arc::clone(&senders),
                inbox,
                fail_receives: self.failing.contains(&(rank as Rank)),
            })
            .collect()
    }

    /// Run `f` on every rank, each on its own thread, and return the results in rank order.
    ///
    /// A rank that panics aborts the group first, so ranks waiting on it
    /// return [TransportError::Aborted]; the panic is then resumed here.
    pub fn run<F, R>(&self, f: F) -> Vec<R>
    where
        F: Fn(LocalGroup) -> R + Sync,
        R: Send,
    {
        let groups = self.groups();
        let senders = Arc::clone(&groups[0].senders);
        let (f, senders) = (&f, &senders);
        thread::scope(|scope| {
            let handles = groups
                .into_iter()
                .map(|group| {
                    scope.spawn(move || {
                        let rank = group.rank;
                        match panic::catch_unwind(AssertUnwindSafe(|| f(group))) {
                            Ok(result) => result,
                            Err(payload) => {
                                debug!("[{}] Panicked, aborting the group", rank);
                                broadcast_abort(senders, rank, PANIC_CODE);
                                panic::resume_unwind(payload)
                            }
                        }
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(payload) => panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}

/// Abort code sent when a rank panics
const PANIC_CODE: i32 = 101;

/// Tell every rank other than `source` that the run is aborted
fn broadcast_abort(senders: &[Sender<Envelope>], source: Rank, code: i32) {
    for (peer, sender) in senders.iter().enumerate() {
        if peer as Rank != source {
            // A peer that has already finished has nothing left to abort.
            let _ = sender.send(Envelope {
                source,
                tag: 0,
                payload: Payload::Abort(code),
            });
        }
    }
}

/// One rank of a [LocalUniverse]
pub struct LocalGroup {
    rank: Rank,
    senders: Arc<Vec<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    fail_receives: bool,
}

impl ProcessGroup for LocalGroup {
    type Cartesian = LocalCartesian;

    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> Rank {
        self.senders.len() as Rank
    }

    fn create_cartesian(&self, dims: [usize; 2]) -> Result<LocalCartesian, TransportError> {
        if dims[0] * dims[1] != self.senders.len() {
            return Err(TransportError::Runtime(format!(
                "cannot arrange {} ranks as {}x{}",
                self.senders.len(),
                dims[0],
                dims[1]
            )));
        }
        Ok(LocalCartesian {
            rank: self.rank,
            dims,
            senders: Arc::clone(&self.senders),
            inbox: self.inbox.clone(),
            parked: RefCell::new(VecDeque::new()),
            aborted: std::cell::Cell::new(None),
            fail_receives: self.fail_receives,
        })
    }
}

/// Cartesian communicator of a [LocalGroup]
pub struct LocalCartesian {
    rank: Rank,
    dims: [usize; 2],
    senders: Arc<Vec<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    parked: RefCell<VecDeque<Envelope>>,
    aborted: std::cell::Cell<Option<i32>>,
    fail_receives: bool,
}

impl LocalCartesian {
    fn check_rank(&self, rank: Rank) -> Result<usize, TransportError> {
        if rank >= 0 && (rank as usize) < self.senders.len() {
            Ok(rank as usize)
        } else {
            Err(TransportError::InvalidRank(rank))
        }
    }

    fn post(&self, peer: Rank, tag: Tag, payload: Payload) -> Result<(), TransportError> {
        let index = self.check_rank(peer)?;
        self.senders[index]
            .send(Envelope {
                source: self.rank,
                tag,
                payload,
            })
            .map_err(|_| TransportError::Disconnected)
    }

    /// Block until the next envelope from `peer` with `tag` arrives
    fn next_matching(&self, peer: Rank, tag: Tag) -> Result<Payload, TransportError> {
        self.check_rank(peer)?;
        if self.fail_receives {
            return Err(TransportError::Injected);
        }
        if let Some(code) = self.aborted.get() {
            return Err(TransportError::Aborted(code));
        }
        {
            let mut parked = self.parked.borrow_mut();
            if let Some(position) = parked
                .iter()
                .position(|e| e.source == peer && e.tag == tag)
            {
                if let Some(envelope) = parked.remove(position) {
                    return Ok(envelope.payload);
                }
            }
        }
        loop {
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| TransportError::Disconnected)?;
            if let Payload::Abort(code) = envelope.payload {
                self.aborted.set(Some(code));
                return Err(TransportError::Aborted(code));
            }
            if envelope.source == peer && envelope.tag == tag {
                return Ok(envelope.payload);
            }
            self.parked.borrow_mut().push_back(envelope);
        }
    }
}

impl CartesianComm for LocalCartesian {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> Rank {
        self.senders.len() as Rank
    }

    fn coordinates_of(&self, rank: Rank) -> Result<[usize; 2], TransportError> {
        self.check_rank(rank)?;
        Ok(coordinates_in(self.dims, rank))
    }

    fn shift(&self, axis: usize, displacement: i32) -> Result<(Rank, Rank), TransportError> {
        if axis > 1 {
            return Err(TransportError::Runtime(format!(
                "axis {axis} out of range for a 2D topology"
            )));
        }
        let here = coordinates_in(self.dims, self.rank);
        let source = shift_in(self.dims, here, axis, -displacement);
        let destination = shift_in(self.dims, here, axis, displacement);
        Ok((rank_in(self.dims, source), rank_in(self.dims, destination)))
    }

    fn send_header(
        &self,
        peer: Rank,
        tag: Tag,
        header: &TileHeader,
    ) -> Result<(), TransportError> {
        self.post(peer, tag, Payload::Header(*header))
    }

    fn receive_header(&self, peer: Rank, tag: Tag) -> Result<TileHeader, TransportError> {
        match self.next_matching(peer, tag)? {
            Payload::Header(header) => Ok(header),
            _ => Err(TransportError::UnexpectedPayload {
                peer,
                tag,
                expected: "a tile header",
            }),
        }
    }

    fn send(&self, peer: Rank, tag: Tag, values: &[Cell]) -> Result<(), TransportError> {
        self.post(peer, tag, Payload::Cells(values.to_vec()))
    }

    fn receive(&self, peer: Rank, tag: Tag, count: usize) -> Result<Vec<Cell>, TransportError> {
        match self.next_matching(peer, tag)? {
            Payload::Cells(values) if values.len() == count => Ok(values),
            Payload::Cells(values) => Err(TransportError::SizeMismatch {
                peer,
                expected: count,
                received: values.len(),
            }),
            _ => Err(TransportError::UnexpectedPayload {
                peer,
                tag,
                expected: "cells",
            }),
        }
    }

    fn wait_all(&self, operations: Vec<Operation>) -> Result<Vec<Vec<Cell>>, TransferFailure> {
        let mut received = vec![Vec::new(); operations.len()];
        let mut receives = Vec::new();
        for (i, operation) in operations.into_iter().enumerate() {
            match operation {
                Operation::Send { peer, tag, values } => {
                    self.post(peer, tag, Payload::Cells(values))
                        .map_err(|source| TransferFailure { peer, tag, source })?;
                }
                Operation::Receive { peer, tag, count } => receives.push((i, peer, tag, count)),
            }
        }
        for (i, peer, tag, count) in receives {
            received[i] = self
                .receive(peer, tag, count)
                .map_err(|source| TransferFailure { peer, tag, source })?;
        }
        Ok(received)
    }

    fn abort(&self, code: i32) {
        debug!("[{}] Aborting with code {}", self.rank, code);
        self.aborted.set(Some(code));
        broadcast_abort(&self.senders, self.rank, code);
    }
}

#[cfg(test)]
mod test {
    use super::LocalUniverse;
    use crate::traits::{CartesianComm, Operation, ProcessGroup};
    use crate::types::{TileHeader, TransportError};

    #[test]
    fn test_cartesian_size_mismatch() {
        let groups = LocalUniverse::new(3).groups();
        assert!(groups[0].create_cartesian([2, 2]).is_err());
        assert!(groups[0].create_cartesian([3, 1]).is_ok());
    }

    #[test]
    fn test_coordinates_and_shift() {
        let groups = LocalUniverse::new(6).groups();
        let cart = groups[4].create_cartesian([3, 2]).unwrap();
        assert_eq!(cart.coordinates_of(4).unwrap(), [2, 0]);
        assert_eq!(cart.coordinates_of(1).unwrap(), [0, 1]);
        assert!(cart.coordinates_of(6).is_err());
        // Along the first axis: (1, 0) to the west, (0, 0) wrapped to the east
        assert_eq!(cart.shift(0, 1).unwrap(), (2, 0));
        // Along the second axis both neighbours are (2, 1)
        assert_eq!(cart.shift(1, 1).unwrap(), (5, 5));
        assert!(cart.shift(2, 1).is_err());
    }

    #[test]
    fn test_messages_match_on_tag() {
        let results = LocalUniverse::new(2).run(|group| {
            let cart = group.create_cartesian([2, 1]).unwrap();
            if cart.rank() == 0 {
                cart.send(1, 7, &[1.0, 2.0]).unwrap();
                cart.send(1, 8, &[3.0]).unwrap();
                cart.send(1, 7, &[4.0, 5.0]).unwrap();
                vec![]
            } else {
                let mut out = cart.receive(0, 8, 1).unwrap();
                out.extend(cart.receive(0, 7, 2).unwrap());
                out.extend(cart.receive(0, 7, 2).unwrap());
                out
            }
        });
        assert_eq!(results[1], vec![3.0, 1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_header_then_cells() {
        let results = LocalUniverse::new(2).run(|group| {
            let cart = group.create_cartesian([1, 2]).unwrap();
            let header = TileHeader {
                width: 2,
                height: 1,
                padding: 1,
            };
            if cart.rank() == 0 {
                cart.send_header(1, 1, &header).unwrap();
                cart.send(1, 1, &[6.0, 7.0]).unwrap();
                None
            } else {
                let received = cart.receive_header(0, 1).unwrap();
                let values = cart.receive(0, 1, received.cell_count()).unwrap();
                Some((received, values))
            }
        });
        let (header, values) = results[1].clone().unwrap();
        assert_eq!(header.padding, 1);
        assert_eq!(values, vec![6.0, 7.0]);
    }

    #[test]
    fn test_size_mismatch() {
        let results = LocalUniverse::new(2).run(|group| {
            let cart = group.create_cartesian([2, 1]).unwrap();
            if cart.rank() == 0 {
                cart.send(1, 0, &[1.0, 2.0, 3.0]).unwrap();
                Ok(vec![])
            } else {
                cart.receive(0, 0, 2)
            }
        });
        assert_eq!(
            results[1],
            Err(TransportError::SizeMismatch {
                peer: 0,
                expected: 2,
                received: 3
            })
        );
    }

    #[test]
    fn test_wait_all_with_self() {
        let groups = LocalUniverse::new(1).groups();
        let cart = groups[0].create_cartesian([1, 1]).unwrap();
        let received = cart
            .wait_all(vec![
                Operation::Receive {
                    peer: 0,
                    tag: 3,
                    count: 2,
                },
                Operation::Send {
                    peer: 0,
                    tag: 3,
                    values: vec![9.0, 8.0],
                },
            ])
            .unwrap();
        assert_eq!(received, vec![vec![9.0, 8.0], vec![]]);
    }

    #[test]
    fn test_abort_releases_blocked_ranks() {
        let results = LocalUniverse::new(3).run(|group| {
            let cart = group.create_cartesian([3, 1]).unwrap();
            if cart.rank() == 2 {
                cart.abort(5);
                Err(TransportError::Aborted(5))
            } else {
                // Never sent
                cart.receive(2, 0, 1).map(|_| ())
            }
        });
        assert!(results
            .iter()
            .all(|r| *r == Err(TransportError::Aborted(5))));
    }

    #[test]
    fn test_panicking_rank_releases_the_others() {
        let outcome = std::panic::catch_unwind(|| {
            LocalUniverse::new(3).run(|group| {
                let cart = group.create_cartesian([3, 1]).unwrap();
                if cart.rank() == 2 {
                    panic!("rank 2 failed");
                }
                // Never sent
                cart.receive(2, 0, 1)
            })
        });
        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"rank 2 failed"));
    }

    #[test]
    fn test_injected_failure() {
        let groups = LocalUniverse::new(2).fail_receives_on(1).groups();
        let cart = groups[1].create_cartesian([2, 1]).unwrap();
        assert_eq!(cart.receive(0, 0, 1), Err(TransportError::Injected));
        let cart = groups[0].create_cartesian([2, 1]).unwrap();
        assert!(cart.send(1, 0, &[1.0]).is_ok());
    }
}
