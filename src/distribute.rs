//! Scatter the decomposed field from the coordinator to every rank

use crate::grid::{Cart2D, Grid};
use crate::topology::Topology;
use crate::traits::CartesianComm;
use crate::types::{Error, Rank, Result, TileHeader, TransportError, COORDINATOR};
use log::{debug, info};

/// Send every other rank its tile, returning the coordinator's own tile.
///
/// For each destination the header goes first, then the interior cells, both
/// tagged with the destination rank. Per-pair ordering guarantees the header
/// is consumed before the data, so the receiver can allocate first.
pub fn distribute<C: CartesianComm>(
    comm: &C,
    topology: &Topology,
    cart: &Cart2D,
) -> Result<Grid> {
    let rank = topology.rank();
    assert!(topology.is_coordinator(), "Only the coordinator distributes");
    if cart.dims() != topology.dims() {
        return Err(Error::Config(format!(
            "field decomposed for a {:?} grid but the topology is {:?}",
            cart.dims(),
            topology.dims()
        )));
    }
    let fail = |peer: Rank, operation: &'static str| {
        move |source: TransportError| Error::Transfer {
            rank,
            peer,
            operation,
            source,
        }
    };

    for peer in 0..topology.rank_count() {
        if peer == rank {
            continue;
        }
        let [cx, cy] = comm
            .coordinates_of(peer)
            .map_err(fail(peer, "distribute"))?;
        let tile = cart.get_tile(cx, cy).ok_or_else(|| {
            Error::Config(format!("no tile for coordinate ({cx}, {cy})"))
        })?;
        let header = TileHeader {
            width: tile.width() as u32,
            height: tile.height() as u32,
            padding: tile.padding() as u32,
        };
        comm.send_header(peer, peer, &header)
            .map_err(fail(peer, "distribute"))?;
        comm.send(peer, peer, &tile.interior_values())
            .map_err(fail(peer, "distribute"))?;
        debug!(
            "[{}] Sent {}x{} tile ({}, {}) to {}",
            rank, header.width, header.height, cx, cy, peer
        );
    }

    let [cx, cy] = topology.coordinates();
    let own = cart
        .get_tile(cx, cy)
        .ok_or_else(|| Error::Config(format!("no tile for coordinate ({cx}, {cy})")))?
        .clone();
    info!(
        "[{}] Distributed {}x{} field over {} ranks",
        rank,
        cart.field_width(),
        cart.field_height(),
        topology.rank_count()
    );
    Ok(own)
}

/// Receive this rank's tile from the coordinator.
///
/// Blocks for the header, allocates a grid of exactly that shape, then blocks
/// for the interior cells. Tiles are distributed with a one cell ghost
/// border; a header describing an empty tile, any other border, or a tile
/// too large to allocate is rejected.
pub fn receive<C: CartesianComm>(comm: &C, topology: &Topology) -> Result<Grid> {
    let rank = topology.rank();
    let fail = |source: TransportError| Error::Transfer {
        rank,
        peer: COORDINATOR,
        operation: "receive",
        source,
    };

    let header = comm.receive_header(COORDINATOR, rank).map_err(fail)?;
    if header.width == 0
        || header.height == 0
        || header.padding != 1
        || header.padded_cell_count().is_none()
    {
        return Err(fail(TransportError::MalformedHeader(header)));
    }
    let mut grid = Grid::new(
        header.width as usize,
        header.height as usize,
        header.padding as usize,
    );
    let values = comm
        .receive(COORDINATOR, rank, header.cell_count())
        .map_err(fail)?;
    let layout = grid.interior_layout();
    layout.scatter(&values, grid.data_mut());
    debug!(
        "[{}] Received {}x{} tile with padding {}",
        rank, header.width, header.height, header.padding
    );
    Ok(grid)
}
