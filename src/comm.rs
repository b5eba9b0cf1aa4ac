//! Message-passing runtimes and batched transfers

mod local;
#[cfg(feature = "mpi")]
mod mpi;
mod pending;

pub use local::{LocalCartesian, LocalGroup, LocalUniverse};
#[cfg(feature = "mpi")]
pub use mpi::{MpiCartesian, MpiGroup};
pub use pending::{Completed, PendingSet, ReceiveHandle};
