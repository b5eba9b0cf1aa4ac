//! Whole runs: distribute, step, collect

use crate::collect::{collect_results, send_result};
use crate::distribute::{distribute, receive};
use crate::exchange::BorderExchanger;
use crate::grid::{Cart2D, Grid};
use crate::topology::Topology;
use crate::traits::{CartesianComm, ProcessGroup, Stencil};
use crate::types::{Error, Result};
use log::{debug, error, info, warn};

/// Options for a simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Process grid dimensions, west-east by south-north
    dims: [usize; 2],
    /// Number of exchange and update steps
    steps: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            dims: [1, 1],
            steps: 100,
        }
    }
}

impl SimulationOptions {
    /// Set the process grid dimensions
    pub fn set_dims(&mut self, dims: [usize; 2]) -> &mut Self {
        self.dims = dims;
        self
    }

    /// Set the number of steps
    pub fn set_steps(&mut self, steps: usize) -> &mut Self {
        self.steps = steps;
        self
    }

    /// Process grid dimensions
    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    /// Number of steps
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Check the options against a `width` x `height` field
    pub fn validate(&self, width: usize, height: usize) -> Result<()> {
        let [dx, dy] = self.dims;
        if dx == 0 || dy == 0 {
            return Err(Error::Config(format!("{dx}x{dy} is not a process grid")));
        }
        if width < dx || height < dy {
            return Err(Error::Config(format!(
                "a {width}x{height} field cannot give every rank of a {dx}x{dy} grid a cell"
            )));
        }
        Ok(())
    }
}

/// Run a distributed simulation on every process of `group`.
///
/// The coordinator passes the initial `field`; other ranks pass `None` (any
/// field they pass is ignored). Every rank must call this with the same
/// options. The coordinator returns the final field and every other rank
/// returns `None`.
///
/// Any failure is logged with the failing rank and operation, the group is
/// aborted so that no rank waits forever on this one, and the error is
/// returned. Under MPI the abort terminates every process.
pub fn run<G: ProcessGroup, S: Stencil>(
    group: &G,
    options: &SimulationOptions,
    field: Option<&Grid>,
    stencil: &S,
) -> Result<Option<Grid>> {
    let (topology, comm) = match Topology::initialize(group, options.dims()) {
        Ok(initialized) => initialized,
        Err(e) => {
            error!("[{}] {} failed: {}", group.rank(), e.operation(), e);
            return Err(e);
        }
    };

    let result = simulate(&comm, &topology, options, field, stencil);
    if let Err(e) = &result {
        error!("[{}] {} failed: {}", topology.rank(), e.operation(), e);
        comm.abort(1);
    }
    result
}

fn simulate<C: CartesianComm, S: Stencil>(
    comm: &C,
    topology: &Topology,
    options: &SimulationOptions,
    field: Option<&Grid>,
    stencil: &S,
) -> Result<Option<Grid>> {
    let dims = options.dims();
    let (mut tile, extent) = if topology.is_coordinator() {
        let field = field.ok_or_else(|| {
            Error::Config("the coordinator needs an initial field".to_string())
        })?;
        options.validate(field.width(), field.height())?;
        if field.width() < 2 * dims[0] || field.height() < 2 * dims[1] {
            warn!(
                "[{}] A {}x{} field leaves some ranks with a single row or column",
                topology.rank(),
                field.width(),
                field.height()
            );
        }
        let cart = Cart2D::from_field(field, dims, 1)?;
        let tile = distribute(comm, topology, &cart)?;
        (tile, Some((field.width(), field.height())))
    } else {
        (receive(comm, topology)?, None)
    };

    let exchanger = BorderExchanger::new(comm, topology);
    for step in 0..options.steps() {
        exchanger.exchange(&mut tile)?;
        let next = stencil.update(&tile);
        if next.width() != tile.width() || next.height() != tile.height() {
            return Err(Error::Size {
                expected: tile.width() * tile.height(),
                actual: next.width() * next.height(),
            });
        }
        tile = if next.padding() == 1 {
            next
        } else {
            next.with_padding(1)
        };
        debug!("[{}] Finished step {}", topology.rank(), step);
    }
    let tile = tile.with_padding(0);

    match extent {
        Some((width, height)) => {
            let mut cart = Cart2D::new(width, height, dims, 0)?;
            let [cx, cy] = topology.coordinates();
            cart.insert_tile(cx, cy, tile)?;
            collect_results(comm, topology, &mut cart)?;
            info!(
                "[{}] Finished {} steps on a {}x{} field",
                topology.rank(),
                options.steps(),
                width,
                height
            );
            Ok(Some(cart.to_field()))
        }
        None => {
            send_result(comm, topology, &tile)?;
            Ok(None)
        }
    }
}
