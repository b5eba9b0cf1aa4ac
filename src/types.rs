//! Types specific to heatsim

/// Process rank within a process group
pub type Rank = i32;

/// Message tag
pub type Tag = i32;

/// Value stored in each cell of the field
pub type Cell = f64;

/// Tags used by border messages are `BORDER_TAG_BASE + direction`.
///
/// MPI guarantees tags up to 32767, so distribution and result tags (which
/// are ranks) must stay below this value.
pub const BORDER_TAG_BASE: Tag = 32_760;

/// Rank of the process that decomposes and gathers the full field
pub const COORDINATOR: Rank = 0;

/// A neighbour direction in the periodic process grid.
///
/// North and south run along the second axis (increasing `y` is north), east
/// and west along the first axis (increasing `x` is east).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Towards increasing `y`
    North = 0,
    /// Towards decreasing `y`
    South = 1,
    /// Towards increasing `x`
    East = 2,
    /// Towards decreasing `x`
    West = 3,
}

impl Direction {
    /// All four directions
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// The opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Tag of the border strip travelling in this direction
    pub fn border_tag(self) -> Tag {
        BORDER_TAG_BASE + self as Tag
    }
}

/// One half of a border exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Rows travel to the north and south neighbours
    NorthSouth,
    /// Columns travel to the east and west neighbours
    EastWest,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::NorthSouth => write!(f, "north/south"),
            Phase::EastWest => write!(f, "east/west"),
        }
    }
}

/// Dimensions of a tile, sent ahead of its data so the receiver can allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct TileHeader {
    /// Interior width
    pub width: u32,
    /// Interior height
    pub height: u32,
    /// Ghost border the receiver should allocate
    pub padding: u32,
}

impl TileHeader {
    /// Number of interior cells described by the header
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of cells in the padded tile, if a buffer that large can exist
    pub fn padded_cell_count(&self) -> Option<usize> {
        let border = (self.padding as usize).checked_mul(2)?;
        let width = (self.width as usize).checked_add(border)?;
        let height = (self.height as usize).checked_add(border)?;
        width
            .checked_mul(height)
            .filter(|cells| *cells <= isize::MAX as usize / std::mem::size_of::<Cell>())
    }
}

/// Errors raised by a message-passing runtime
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// A rank outside the process group was addressed
    #[error("rank {0} is not part of the process group")]
    InvalidRank(Rank),
    /// A message did not have the length the receiver allocated for
    #[error("expected {expected} cells from rank {peer}, received {received}")]
    SizeMismatch {
        /// Sender
        peer: Rank,
        /// Cells the receiver allocated for
        expected: usize,
        /// Cells that arrived
        received: usize,
    },
    /// A message of the wrong kind matched a receive
    #[error("expected {expected} from rank {peer} with tag {tag}")]
    UnexpectedPayload {
        /// Sender
        peer: Rank,
        /// Tag of the receive
        tag: Tag,
        /// What the receive was waiting for
        expected: &'static str,
    },
    /// A tile header describing an empty or oversized tile
    #[error("malformed tile header {0:?}")]
    MalformedHeader(TileHeader),
    /// Another rank aborted the run
    #[error("run aborted with code {0}")]
    Aborted(i32),
    /// Every other endpoint has gone away
    #[error("process group disconnected")]
    Disconnected,
    /// Failure forced by the local runtime's fault injection
    #[error("injected receive failure")]
    Injected,
    /// Any other runtime failure
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The process topology could not be built
    #[error("topology error on rank {rank}: {reason}")]
    Topology {
        /// Failing rank
        rank: Rank,
        /// What went wrong
        reason: String,
    },
    /// Distributing or receiving a tile failed
    #[error("transfer error on rank {rank} during {operation} (peer {peer}): {source}")]
    Transfer {
        /// Failing rank
        rank: Rank,
        /// Other end of the failed transfer
        peer: Rank,
        /// Operation in progress
        operation: &'static str,
        /// Runtime error
        #[source]
        source: TransportError,
    },
    /// A border exchange phase failed
    #[error("exchange error on rank {rank} during {phase} phase (peer {peer}): {source}")]
    Exchange {
        /// Failing rank
        rank: Rank,
        /// Other end of the failed transfer
        peer: Rank,
        /// Phase in progress
        phase: Phase,
        /// Runtime error
        #[source]
        source: TransportError,
    },
    /// Sending or gathering a result tile failed
    #[error("collection error on rank {rank} (peer {peer}): {source}")]
    Collection {
        /// Failing rank
        rank: Rank,
        /// Other end of the failed transfer
        peer: Rank,
        /// Runtime error
        #[source]
        source: TransportError,
    },
    /// Invalid options or field dimensions
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A buffer does not hold the expected number of cells
    #[error("expected {expected} cells, got {actual}")]
    Size {
        /// Cells required
        expected: usize,
        /// Cells provided
        actual: usize,
    },
}

impl Error {
    /// Name of the operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            Error::Topology { .. } => "topology",
            Error::Transfer { operation, .. } => *operation,
            Error::Exchange { .. } => "exchange",
            Error::Collection { .. } => "collection",
            Error::Config(_) => "configuration",
            Error::Size { .. } => "allocation",
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
