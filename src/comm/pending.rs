//! Batches of non-blocking transfers

use crate::grid::Layout;
use crate::traits::{CartesianComm, Operation, TransferFailure};
use crate::types::{Cell, Rank, Tag};

/// Identifies a receive posted to a [PendingSet]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveHandle(usize);

/// Transfers that are posted together and waited on together.
///
/// Nothing blocks until [PendingSet::wait_all], which hands every operation
/// to the runtime before waiting on any of them. Two neighbours that each
/// send before receiving therefore cannot stall on one another.
#[derive(Debug, Default)]
pub struct PendingSet {
    operations: Vec<Operation>,
}

impl PendingSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of posted operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operation has been posted
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Post a send of `values`
    pub fn post_send(&mut self, peer: Rank, tag: Tag, values: Vec<Cell>) {
        self.operations.push(Operation::Send { peer, tag, values });
    }

    /// Post a send of the cells of `data` selected by `layout`
    pub fn post_send_layout(&mut self, peer: Rank, tag: Tag, data: &[Cell], layout: Layout) {
        self.post_send(peer, tag, layout.gather(data));
    }

    /// Post a receive of `count` cells
    pub fn post_receive(&mut self, peer: Rank, tag: Tag, count: usize) -> ReceiveHandle {
        self.operations.push(Operation::Receive { peer, tag, count });
        ReceiveHandle(self.operations.len() - 1)
    }

    /// Wait for every posted operation, surfacing the first failure
    pub fn wait_all<C: CartesianComm + ?Sized>(
        self,
        comm: &C,
    ) -> Result<Completed, TransferFailure> {
        if self.operations.is_empty() {
            return Ok(Completed {
                received: Vec::new(),
            });
        }
        let received = comm.wait_all(self.operations)?;
        Ok(Completed {
            received: received.into_iter().map(Some).collect(),
        })
    }
}

/// The received data of a completed [PendingSet]
#[derive(Debug)]
pub struct Completed {
    received: Vec<Option<Vec<Cell>>>,
}

impl Completed {
    /// Take the cells of a receive; `None` if already taken
    pub fn take(&mut self, handle: ReceiveHandle) -> Option<Vec<Cell>> {
        self.received.get_mut(handle.0).and_then(Option::take)
    }

    /// Write the cells of a receive into the part of `data` selected by `layout`
    pub fn scatter(&mut self, handle: ReceiveHandle, layout: Layout, data: &mut [Cell]) {
        if let Some(values) = self.take(handle) {
            layout.scatter(&values, data);
        }
    }
}
