//! Tiles, strided layouts and the decomposed field

mod cart2d;
mod layout;
mod tile;

pub use cart2d::{partition, Cart2D};
pub use layout::Layout;
pub use tile::Grid;
