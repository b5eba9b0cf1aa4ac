//! Heatsim
//!
//! A 2D field decomposed over a periodic Cartesian grid of processes. The
//! coordinator scatters one tile to each rank, the ranks repeatedly refresh
//! their ghost borders from their neighbours and apply a stencil, and the
//! coordinator gathers the result.
//!
//! Runs go through the [traits::ProcessGroup] seam. [comm::LocalUniverse]
//! runs every rank as a thread of the current process; with the `mpi`
//! feature, `comm::MpiGroup` runs one rank per MPI process.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod collect;
pub mod comm;
pub mod distribute;
pub mod exchange;
pub mod grid;
pub mod simulation;
pub mod stencil;
pub mod topology;
pub mod traits;
pub mod types;

pub use simulation::{run, SimulationOptions};
