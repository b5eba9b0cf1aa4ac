//! Trait definitions

mod comm;
mod stencil;

pub use comm::{CartesianComm, Operation, ProcessGroup, TransferFailure};
pub use stencil::Stencil;
