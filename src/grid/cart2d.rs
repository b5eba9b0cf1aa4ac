//! The full field decomposed into one tile per process grid coordinate

use crate::grid::Grid;
use crate::types::{Error, Result};
use itertools::iproduct;

/// Split an axis of `len` cells into `parts` runs whose lengths differ by at most one.
///
/// Returns the `(start, len)` of every run; the first `len % parts` runs get
/// the extra cell.
pub fn partition(len: usize, parts: usize) -> Result<Vec<(usize, usize)>> {
    if parts == 0 {
        return Err(Error::Config(
            "Cannot split an axis into zero parts".to_string(),
        ));
    }
    if len < parts {
        return Err(Error::Config(format!(
            "Cannot split {len} cells into {parts} non-empty parts"
        )));
    }
    let base = len / parts;
    let rem = len % parts;
    let mut runs = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let run = base + usize::from(i < rem);
        runs.push((start, run));
        start += run;
    }
    Ok(runs)
}

/// The field held by the coordinator, one [Grid] per process grid coordinate.
///
/// Tile `(cx, cy)` covers field columns `x_runs[cx]` and rows `y_runs[cy]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart2D {
    dims: [usize; 2],
    field_width: usize,
    field_height: usize,
    x_runs: Vec<(usize, usize)>,
    y_runs: Vec<(usize, usize)>,
    tiles: Vec<Grid>,
}

impl Cart2D {
    /// Create zero-filled tiles covering a `field_width` x `field_height` field
    pub fn new(
        field_width: usize,
        field_height: usize,
        dims: [usize; 2],
        padding: usize,
    ) -> Result<Self> {
        let x_runs = partition(field_width, dims[0])?;
        let y_runs = partition(field_height, dims[1])?;
        let tiles = iproduct!(x_runs.iter(), y_runs.iter())
            .map(|(x, y)| Grid::new(x.1, y.1, padding))
            .collect();
        Ok(Self {
            dims,
            field_width,
            field_height,
            x_runs,
            y_runs,
            tiles,
        })
    }

    /// Decompose `field` (its interior) into tiles with `padding` ghost cells
    pub fn from_field(field: &Grid, dims: [usize; 2], padding: usize) -> Result<Self> {
        let mut cart = Self::new(field.width(), field.height(), dims, padding)?;
        for (cx, cy) in iproduct!(0..dims[0], 0..dims[1]) {
            let (x0, _) = cart.x_runs[cx];
            let (y0, _) = cart.y_runs[cy];
            let tile = &mut cart.tiles[cx * dims[1] + cy];
            for y in 0..tile.height() {
                let row = &field.interior_row(y0 + y)[x0..x0 + tile.width()];
                let layout = tile.row_layout(y as isize);
                layout.scatter(row, tile.data_mut());
            }
        }
        Ok(cart)
    }

    /// Merge the tile interiors back into one unpadded field
    pub fn to_field(&self) -> Grid {
        let mut field = Grid::new(self.field_width, self.field_height, 0);
        for (cx, cy) in iproduct!(0..self.dims[0], 0..self.dims[1]) {
            let (x0, _) = self.x_runs[cx];
            let (y0, _) = self.y_runs[cy];
            let tile = &self.tiles[cx * self.dims[1] + cy];
            for y in 0..tile.height() {
                let start = (y0 + y) * self.field_width + x0;
                field.data_mut()[start..start + tile.width()]
                    .copy_from_slice(tile.interior_row(y));
            }
        }
        field
    }

    /// Process grid dimensions
    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }
    /// Width of the full field
    pub fn field_width(&self) -> usize {
        self.field_width
    }
    /// Height of the full field
    pub fn field_height(&self) -> usize {
        self.field_height
    }

    fn tile_index(&self, cx: usize, cy: usize) -> Option<usize> {
        if cx < self.dims[0] && cy < self.dims[1] {
            Some(cx * self.dims[1] + cy)
        } else {
            None
        }
    }

    /// The tile at process grid coordinate `(cx, cy)`
    pub fn get_tile(&self, cx: usize, cy: usize) -> Option<&Grid> {
        self.tile_index(cx, cy).map(|i| &self.tiles[i])
    }

    /// The tile at process grid coordinate `(cx, cy)` (mutable)
    pub fn get_tile_mut(&mut self, cx: usize, cy: usize) -> Option<&mut Grid> {
        self.tile_index(cx, cy).map(|i| &mut self.tiles[i])
    }

    /// Replace the tile at `(cx, cy)`; its interior extents must match
    pub fn insert_tile(&mut self, cx: usize, cy: usize, tile: Grid) -> Result<()> {
        let i = self.tile_index(cx, cy).ok_or_else(|| {
            Error::Config(format!("No tile at coordinate ({cx}, {cy})"))
        })?;
        let current = &self.tiles[i];
        if current.width() != tile.width() || current.height() != tile.height() {
            return Err(Error::Size {
                expected: current.width() * current.height(),
                actual: tile.width() * tile.height(),
            });
        }
        self.tiles[i] = tile;
        Ok(())
    }

    /// Field position of the first interior cell of tile `(cx, cy)`
    pub fn origin(&self, cx: usize, cy: usize) -> Option<(usize, usize)> {
        self.tile_index(cx, cy)
            .map(|_| (self.x_runs[cx].0, self.y_runs[cy].0))
    }

    /// Iterate over `((cx, cy), tile)`
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &Grid)> + '_ {
        iproduct!(0..self.dims[0], 0..self.dims[1]).zip(self.tiles.iter())
    }
}
