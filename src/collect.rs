//! Gather result tiles back to the coordinator

use crate::comm::PendingSet;
use crate::grid::{Cart2D, Grid};
use crate::topology::Topology;
use crate::traits::{CartesianComm, TransferFailure};
use crate::types::{Error, Result, COORDINATOR};
use log::{debug, info};

/// Send this rank's finished tile to the coordinator, tagged with our rank.
///
/// The tile must not carry a ghost border: the coordinator receives straight
/// into an unpadded tile of the same shape.
pub fn send_result<C: CartesianComm>(comm: &C, topology: &Topology, grid: &Grid) -> Result<()> {
    assert_eq!(grid.padding(), 0, "Result tiles are sent without a border");
    let rank = topology.rank();
    comm.send(COORDINATOR, rank, grid.data())
        .map_err(|source| Error::Collection {
            rank,
            peer: COORDINATOR,
            source,
        })?;
    debug!(
        "[{}] Sent {}x{} result",
        rank,
        grid.width(),
        grid.height()
    );
    Ok(())
}

/// Receive every other rank's result into its tile of `cart`.
///
/// One receive per rank is posted up front and all are waited on together,
/// so results may arrive in any order. The coordinator's own tile is left
/// for the caller to fill.
pub fn collect_results<C: CartesianComm>(
    comm: &C,
    topology: &Topology,
    cart: &mut Cart2D,
) -> Result<()> {
    let rank = topology.rank();
    assert!(topology.is_coordinator(), "Only the coordinator collects");
    if cart.dims() != topology.dims() {
        return Err(Error::Config(format!(
            "results gathered into a {:?} grid but the topology is {:?}",
            cart.dims(),
            topology.dims()
        )));
    }

    let mut pending = PendingSet::new();
    let mut receives = Vec::new();
    for peer in (0..topology.rank_count()).filter(|peer| *peer != rank) {
        let [cx, cy] = topology
            .coordinates_of(peer)
            .ok_or_else(|| Error::Config(format!("rank {peer} has no coordinate")))?;
        let tile = cart
            .get_tile(cx, cy)
            .ok_or_else(|| Error::Config(format!("no tile for coordinate ({cx}, {cy})")))?;
        let layout = tile.interior_layout();
        let handle = pending.post_receive(peer, peer, layout.len());
        receives.push(((cx, cy), handle, layout));
    }

    let mut completed = pending.wait_all(comm).map_err(|failure| {
        let TransferFailure { peer, source, .. } = failure;
        Error::Collection { rank, peer, source }
    })?;
    for ((cx, cy), handle, layout) in receives {
        if let Some(tile) = cart.get_tile_mut(cx, cy) {
            completed.scatter(handle, layout, tile.data_mut());
        }
    }
    info!(
        "[{}] Collected results from {} ranks",
        rank,
        topology.rank_count() - 1
    );
    Ok(())
}
