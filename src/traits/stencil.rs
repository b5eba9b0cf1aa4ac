//! Stencil update
use crate::grid::Grid;

pub trait Stencil: Sync {
    //! A per-step update of a tile whose ghost border is current.

    /// Compute the next state of `grid`.
    ///
    /// The result has the same interior extents and padding as `grid`.
    fn update(&self, grid: &Grid) -> Grid;
}
