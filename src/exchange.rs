//! Ghost border exchange between neighbouring tiles

use crate::comm::PendingSet;
use crate::grid::{Grid, Layout};
use crate::topology::Topology;
use crate::traits::{CartesianComm, TransferFailure};
use crate::types::{Direction, Error, Phase, Result};
use log::trace;

/// Refreshes the ghost border of a tile from its four neighbours.
///
/// Each exchange runs in two phases. Rows move first: the top interior row
/// goes north and the bottom row south, while the ghost rows are filled from
/// the neighbours' matching rows. Columns follow in the same way along the
/// east-west axis. Within a phase every transfer is posted before any is
/// waited on. Corner ghost cells are not exchanged.
pub struct BorderExchanger<'a, C: CartesianComm> {
    comm: &'a C,
    topology: &'a Topology,
}

impl<'a, C: CartesianComm> BorderExchanger<'a, C> {
    /// Create an exchanger for `topology` over `comm`
    pub fn new(comm: &'a C, topology: &'a Topology) -> Self {
        Self { comm, topology }
    }

    /// Fill the ghost border of `grid` with the neighbours' edge cells.
    ///
    /// `grid` must have a ghost border of exactly one cell.
    pub fn exchange(&self, grid: &mut Grid) -> Result<()> {
        assert_eq!(grid.padding(), 1, "Border exchange needs one ghost cell");
        let (w, h) = (grid.width() as isize, grid.height() as isize);

        // The strip sent north lands in the northern neighbour's southern ghost row
        let rows = [
            (Direction::North, grid.row_layout(h - 1), grid.row_layout(-1)),
            (Direction::South, grid.row_layout(0), grid.row_layout(h)),
        ];
        let columns = [
            (Direction::East, grid.column_layout(w - 1), grid.column_layout(-1)),
            (Direction::West, grid.column_layout(0), grid.column_layout(w)),
        ];
        self.phase(grid, Phase::NorthSouth, rows)?;
        self.phase(grid, Phase::EastWest, columns)?;
        Ok(())
    }

    /// Run one phase. Each entry names the direction a strip travels, the
    /// interior strip sent that way, and the ghost strip filled by the strip
    /// arriving from the opposite side.
    fn phase(
        &self,
        grid: &mut Grid,
        phase: Phase,
        strips: [(Direction, Layout, Layout); 2],
    ) -> Result<()> {
        let mut pending = PendingSet::new();
        let mut receives = Vec::with_capacity(strips.len());
        for (direction, outgoing, ghost) in strips {
            let tag = direction.border_tag();
            pending.post_send_layout(
                self.topology.neighbour(direction),
                tag,
                grid.data(),
                outgoing,
            );
            let handle = pending.post_receive(
                self.topology.neighbour(direction.opposite()),
                tag,
                ghost.len(),
            );
            receives.push((handle, ghost));
        }

        let mut completed = pending.wait_all(self.comm).map_err(|failure| {
            let TransferFailure { peer, source, .. } = failure;
            Error::Exchange {
                rank: self.topology.rank(),
                peer,
                phase,
                source,
            }
        })?;
        for (handle, ghost) in receives {
            completed.scatter(handle, ghost, grid.data_mut());
        }
        trace!("[{}] Finished {} phase", self.topology.rank(), phase);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::BorderExchanger;
    use crate::comm::LocalUniverse;
    use crate::grid::Grid;
    use crate::topology::Topology;
    use crate::traits::CartesianComm;
    use crate::types::{Direction, Error, Phase, TransportError};

    fn lettered() -> Grid {
        let values: Vec<f64> = (1..=16).map(|i| i as f64).collect();
        Grid::from_interior(4, 4, 1, &values).unwrap()
    }

    fn column(grid: &Grid, x: isize) -> Vec<f64> {
        (0..grid.height() as isize)
            .map(|y| *grid.get_cell(x, y).unwrap())
            .collect()
    }

    fn row(grid: &Grid, y: isize) -> Vec<f64> {
        (0..grid.width() as isize)
            .map(|x| *grid.get_cell(x, y).unwrap())
            .collect()
    }

    #[test]
    fn test_single_rank_wraps_onto_itself() {
        let grids = LocalUniverse::new(1).run(|group| {
            let (topology, comm) = Topology::initialize(&group, [1, 1]).unwrap();
            let mut grid = lettered();
            BorderExchanger::new(&comm, &topology)
                .exchange(&mut grid)
                .unwrap();
            grid
        });
        let grid = &grids[0];
        // The last interior column is D H L P and wraps to the western ghost column
        assert_eq!(column(grid, -1), vec![4.0, 8.0, 12.0, 16.0]);
        assert_eq!(column(grid, 4), vec![1.0, 5.0, 9.0, 13.0]);
        assert_eq!(row(grid, -1), vec![13.0, 14.0, 15.0, 16.0]);
        assert_eq!(row(grid, 4), vec![1.0, 2.0, 3.0, 4.0]);
        // Corners untouched
        assert_eq!(*grid.get_cell(-1, -1).unwrap(), 0.0);
        assert_eq!(*grid.get_cell(4, 4).unwrap(), 0.0);
    }

    #[test]
    fn test_borders_come_from_neighbours() {
        let dims = [3, 3];
        let grids = LocalUniverse::new(9).run(|group| {
            let (topology, comm) = Topology::initialize(&group, dims).unwrap();
            let rank = topology.rank() as f64;
            let values = vec![rank; 3 * 2];
            let mut grid = Grid::from_interior(3, 2, 1, &values).unwrap();
            BorderExchanger::new(&comm, &topology)
                .exchange(&mut grid)
                .unwrap();
            (topology, grid)
        });
        for (topology, grid) in &grids {
            let n = topology.neighbour(Direction::North) as f64;
            let s = topology.neighbour(Direction::South) as f64;
            let e = topology.neighbour(Direction::East) as f64;
            let w = topology.neighbour(Direction::West) as f64;
            assert_eq!(row(grid, -1), vec![s; 3]);
            assert_eq!(row(grid, 2), vec![n; 3]);
            assert_eq!(column(grid, -1), vec![w; 2]);
            assert_eq!(column(grid, 3), vec![e; 2]);
        }
    }

    #[test]
    fn test_two_ranks_share_both_borders() {
        let grids = LocalUniverse::new(2).run(|group| {
            let (topology, comm) = Topology::initialize(&group, [2, 1]).unwrap();
            let offset = 100.0 * topology.rank() as f64;
            let values: Vec<f64> = (0..4).map(|i| offset + i as f64).collect();
            let mut grid = Grid::from_interior(2, 2, 1, &values).unwrap();
            BorderExchanger::new(&comm, &topology)
                .exchange(&mut grid)
                .unwrap();
            grid
        });
        // Rank 0's western ghost is rank 1's last column and its eastern ghost rank 1's first
        assert_eq!(column(&grids[0], -1), vec![101.0, 103.0]);
        assert_eq!(column(&grids[0], 2), vec![100.0, 102.0]);
        assert_eq!(column(&grids[1], -1), vec![1.0, 3.0]);
        assert_eq!(column(&grids[1], 2), vec![0.0, 2.0]);
        // One rank along the second axis: rows wrap onto the same tile
        assert_eq!(row(&grids[1], -1), vec![102.0, 103.0]);
    }

    #[test]
    fn test_failure_names_phase() {
        let results = LocalUniverse::new(2).fail_receives_on(1).run(|group| {
            // Rank 1 is its own northern and southern neighbour
            let (topology, comm) = Topology::initialize(&group, [2, 1]).unwrap();
            let mut grid = Grid::new(2, 2, 1);
            let result = BorderExchanger::new(&comm, &topology).exchange(&mut grid);
            if result.is_err() {
                comm.abort(1);
            }
            result
        });
        assert!(matches!(
            results[1],
            Err(Error::Exchange {
                rank: 1,
                peer: 1,
                phase: Phase::NorthSouth,
                source: TransportError::Injected,
            })
        ));
        assert!(matches!(
            results[0],
            Err(Error::Exchange {
                source: TransportError::Aborted(1),
                ..
            })
        ));
    }
}
