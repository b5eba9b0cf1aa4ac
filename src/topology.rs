//! Periodic 2D Cartesian process topology

use crate::traits::{CartesianComm, ProcessGroup};
use crate::types::{
    Direction, Error, Rank, Result, TransportError, BORDER_TAG_BASE, COORDINATOR,
};
use log::debug;

/// Coordinate of `rank` in a non-reordered `dims` grid
pub(crate) fn coordinates_in(dims: [usize; 2], rank: Rank) -> [usize; 2] {
    let rank = rank as usize;
    [rank / dims[1], rank % dims[1]]
}

/// Rank at `coordinates` in a non-reordered `dims` grid
pub(crate) fn rank_in(dims: [usize; 2], coordinates: [usize; 2]) -> Rank {
    (coordinates[0] * dims[1] + coordinates[1]) as Rank
}

/// Move `displacement` steps along `axis`, wrapping around
pub(crate) fn shift_in(
    dims: [usize; 2],
    coordinates: [usize; 2],
    axis: usize,
    displacement: i32,
) -> [usize; 2] {
    let mut shifted = coordinates;
    let len = dims[axis] as i64;
    shifted[axis] = (coordinates[axis] as i64 + displacement as i64).rem_euclid(len) as usize;
    shifted
}

/// Identity of this process in a periodic Cartesian process grid.
///
/// Built once at startup and passed to every component that communicates.
/// The first axis runs west to east, the second south to north; neighbours
/// across the edges of the grid wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    rank: Rank,
    rank_count: Rank,
    dims: [usize; 2],
    coordinates: [usize; 2],
    north: Rank,
    south: Rank,
    east: Rank,
    west: Rank,
}

fn validate(rank: Rank, rank_count: Rank, dims: [usize; 2]) -> Result<()> {
    let fail = |reason: String| Err(Error::Topology { rank, reason });
    if dims[0] == 0 || dims[1] == 0 {
        return fail(format!("{}x{} is not a process grid", dims[0], dims[1]));
    }
    if dims[0] * dims[1] != rank_count as usize {
        return fail(format!(
            "{} processes cannot form a {}x{} grid",
            rank_count, dims[0], dims[1]
        ));
    }
    if rank_count >= BORDER_TAG_BASE {
        return fail(format!(
            "{rank_count} processes exceed the {BORDER_TAG_BASE} supported"
        ));
    }
    Ok(())
}

impl Topology {
    /// Arrange `group` into a periodic `dims[0]` x `dims[1]` grid.
    ///
    /// Returns this process's topology and the Cartesian communicator used for
    /// every later transfer.
    pub fn initialize<G: ProcessGroup>(group: &G, dims: [usize; 2]) -> Result<(Self, G::Cartesian)> {
        let rank = group.rank();
        validate(rank, group.size(), dims)?;
        let cart = group
            .create_cartesian(dims)
            .map_err(|e| Error::Topology {
                rank,
                reason: format!("could not create cartesian topology: {e}"),
            })?;
        let topology = Self::from_cartesian(&cart, dims)?;
        Ok((topology, cart))
    }

    /// Query this process's coordinate and neighbours from a Cartesian communicator
    pub fn from_cartesian<C: CartesianComm>(cart: &C, dims: [usize; 2]) -> Result<Self> {
        let rank = cart.rank();
        let rank_count = cart.size();
        validate(rank, rank_count, dims)?;
        let fail = |what: &str, e: TransportError| Error::Topology {
            rank,
            reason: format!("could not get {what}: {e}"),
        };
        let coordinates = cart
            .coordinates_of(rank)
            .map_err(|e| fail("cartesian coordinates", e))?;
        let (west, east) = cart.shift(0, 1).map_err(|e| fail("horizontal shift", e))?;
        let (south, north) = cart.shift(1, 1).map_err(|e| fail("vertical shift", e))?;
        let topology = Self {
            rank,
            rank_count,
            dims,
            coordinates,
            north,
            south,
            east,
            west,
        };
        debug!(
            "[{}] At ({}, {}), north {} south {} east {} west {}",
            rank, coordinates[0], coordinates[1], north, south, east, west
        );
        Ok(topology)
    }

    /// The topology `rank` would get in a `dims` grid, without a process group
    pub fn simulated(rank: Rank, dims: [usize; 2]) -> Result<Self> {
        let rank_count = (dims[0] * dims[1]) as Rank;
        validate(rank, rank_count, dims)?;
        if rank < 0 || rank >= rank_count {
            return Err(Error::Topology {
                rank,
                reason: format!("rank outside a group of {rank_count}"),
            });
        }
        let coordinates = coordinates_in(dims, rank);
        let neighbour =
            |axis, displacement| rank_in(dims, shift_in(dims, coordinates, axis, displacement));
        Ok(Self {
            rank,
            rank_count,
            dims,
            coordinates,
            north: neighbour(1, 1),
            south: neighbour(1, -1),
            east: neighbour(0, 1),
            west: neighbour(0, -1),
        })
    }

    /// Rank of this process
    pub fn rank(&self) -> Rank {
        self.rank
    }
    /// Number of processes
    pub fn rank_count(&self) -> Rank {
        self.rank_count
    }
    /// Process grid dimensions
    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }
    /// Coordinate of this process
    pub fn coordinates(&self) -> [usize; 2] {
        self.coordinates
    }
    /// Whether this process decomposes and gathers the field
    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    /// Neighbour in `direction`
    pub fn neighbour(&self, direction: Direction) -> Rank {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    /// Coordinate of any rank in the grid
    pub fn coordinates_of(&self, rank: Rank) -> Option<[usize; 2]> {
        if rank >= 0 && rank < self.rank_count {
            Some(coordinates_in(self.dims, rank))
        } else {
            None
        }
    }

    /// Rank at a coordinate of the grid
    pub fn rank_at(&self, coordinates: [usize; 2]) -> Option<Rank> {
        if coordinates[0] < self.dims[0] && coordinates[1] < self.dims[1] {
            Some(rank_in(self.dims, coordinates))
        } else {
            None
        }
    }
}
