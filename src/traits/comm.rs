//! Message-passing runtime
use crate::types::{Cell, Rank, Tag, TileHeader, TransportError};

/// A point-to-point transfer posted as part of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Send `values` to `peer`
    Send {
        /// Destination
        peer: Rank,
        /// Message tag
        tag: Tag,
        /// Cells to send, already packed
        values: Vec<Cell>,
    },
    /// Receive exactly `count` cells from `peer`
    Receive {
        /// Source
        peer: Rank,
        /// Message tag
        tag: Tag,
        /// Number of cells expected
        count: usize,
    },
}

impl Operation {
    /// The other end of the transfer
    pub fn peer(&self) -> Rank {
        match self {
            Operation::Send { peer, .. } | Operation::Receive { peer, .. } => *peer,
        }
    }

    /// The message tag
    pub fn tag(&self) -> Tag {
        match self {
            Operation::Send { tag, .. } | Operation::Receive { tag, .. } => *tag,
        }
    }
}

/// The first transfer of a batch that failed
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFailure {
    /// The other end of the failed transfer
    pub peer: Rank,
    /// Tag of the failed transfer
    pub tag: Tag,
    /// Runtime error
    pub source: TransportError,
}

impl TransferFailure {
    /// Failure of `operation`
    pub fn new(operation: &Operation, source: TransportError) -> Self {
        Self {
            peer: operation.peer(),
            tag: operation.tag(),
            source,
        }
    }
}

pub trait ProcessGroup {
    //! A group of cooperating processes, one of which is this process.

    /// The communicator over a Cartesian arrangement of this group
    type Cartesian: CartesianComm;

    /// Rank of this process
    fn rank(&self) -> Rank;

    /// Number of processes in the group
    fn size(&self) -> Rank;

    /// Arrange the group into a `dims[0]` x `dims[1]` grid, periodic in both axes.
    ///
    /// Ranks are not reordered: rank `r` sits at coordinate
    /// `(r / dims[1], r % dims[1])`.
    fn create_cartesian(&self, dims: [usize; 2]) -> Result<Self::Cartesian, TransportError>;
}

pub trait CartesianComm {
    //! A communicator over a periodic 2D Cartesian process grid.
    //!
    //! Messages between the same pair of ranks with the same tag are
    //! delivered in the order they were sent.

    /// Rank of this process
    fn rank(&self) -> Rank;

    /// Number of processes
    fn size(&self) -> Rank;

    /// Process grid coordinate of `rank`
    fn coordinates_of(&self, rank: Rank) -> Result<[usize; 2], TransportError>;

    /// Neighbours `displacement` steps along `axis`, as `(source, destination)`.
    ///
    /// The source is the rank `displacement` steps in the negative direction,
    /// the destination the rank `displacement` steps in the positive direction,
    /// both wrapping around.
    fn shift(&self, axis: usize, displacement: i32) -> Result<(Rank, Rank), TransportError>;

    /// Send a tile header, returning once the header buffer can be reused
    fn send_header(&self, peer: Rank, tag: Tag, header: &TileHeader)
        -> Result<(), TransportError>;

    /// Block until a tile header arrives
    fn receive_header(&self, peer: Rank, tag: Tag) -> Result<TileHeader, TransportError>;

    /// Send cells, returning once `values` can be reused
    fn send(&self, peer: Rank, tag: Tag, values: &[Cell]) -> Result<(), TransportError>;

    /// Block until exactly `count` cells arrive
    fn receive(&self, peer: Rank, tag: Tag, count: usize) -> Result<Vec<Cell>, TransportError>;

    /// Post every operation, then wait for all of them.
    ///
    /// Returns the received cells of each operation in order (empty for
    /// sends), or the first failure.
    fn wait_all(&self, operations: Vec<Operation>) -> Result<Vec<Vec<Cell>>, TransferFailure>;

    /// Terminate every process in the group with `code`
    fn abort(&self, code: i32);
}
