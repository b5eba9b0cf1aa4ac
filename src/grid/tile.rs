//! A rectangular tile of the field with a ghost border

use crate::grid::Layout;
use crate::types::{Cell, Error, Result};

/// A rectangular tile of the field surrounded by `padding` ghost cells.
///
/// Cells are stored row-major over the padded extents. Cell `(x, y)` is
/// addressable for `x` in `-padding..width + padding` and `y` in
/// `-padding..height + padding`; `(0, 0)` is the first interior cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    padding: usize,
    width_padded: usize,
    height_padded: usize,
    data: Vec<Cell>,
}

impl Grid {
    /// Create a zero-filled grid
    pub fn new(width: usize, height: usize, padding: usize) -> Self {
        let width_padded = width + 2 * padding;
        let height_padded = height + 2 * padding;
        Self {
            width,
            height,
            padding,
            width_padded,
            height_padded,
            data: vec![0.0; width_padded * height_padded],
        }
    }

    /// Create a grid whose interior holds `values` (row-major) and whose ghost border is zero
    pub fn from_interior(
        width: usize,
        height: usize,
        padding: usize,
        values: &[Cell],
    ) -> Result<Self> {
        if values.len() != width * height {
            return Err(Error::Size {
                expected: width * height,
                actual: values.len(),
            });
        }
        let mut grid = Self::new(width, height, padding);
        let layout = grid.interior_layout();
        layout.scatter(values, &mut grid.data);
        Ok(grid)
    }

    /// Interior width
    pub fn width(&self) -> usize {
        self.width
    }
    /// Interior height
    pub fn height(&self) -> usize {
        self.height
    }
    /// Width of the ghost border
    pub fn padding(&self) -> usize {
        self.padding
    }
    /// Width including both ghost columns
    pub fn width_padded(&self) -> usize {
        self.width_padded
    }
    /// Height including both ghost rows
    pub fn height_padded(&self) -> usize {
        self.height_padded
    }

    /// The padded buffer
    pub fn data(&self) -> &[Cell] {
        &self.data
    }
    /// The padded buffer (mutable)
    pub fn data_mut(&mut self) -> &mut [Cell] {
        &mut self.data
    }

    fn contains(&self, x: isize, y: isize) -> bool {
        let p = self.padding as isize;
        (-p..self.width as isize + p).contains(&x) && (-p..self.height as isize + p).contains(&y)
    }

    /// Buffer index of cell `(x, y)`; the caller checks the range
    fn offset(&self, x: isize, y: isize) -> usize {
        let p = self.padding as isize;
        ((y + p) * self.width_padded as isize + x + p) as usize
    }

    /// Buffer index of cell `(x, y)`, if it lies inside the padded extents
    pub fn index(&self, x: isize, y: isize) -> Option<usize> {
        if self.contains(x, y) {
            Some(self.offset(x, y))
        } else {
            None
        }
    }

    /// Get a cell; negative and over-range coordinates reach the ghost border
    pub fn get_cell(&self, x: isize, y: isize) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.data[i])
    }

    /// Get a mutable cell
    pub fn get_cell_mut(&mut self, x: isize, y: isize) -> Option<&mut Cell> {
        self.index(x, y).map(|i| &mut self.data[i])
    }

    /// The `width` cells of row `y`, excluding ghost columns
    pub fn row_layout(&self, y: isize) -> Layout {
        assert!(self.contains(0, y), "Row {y} outside grid");
        Layout::contiguous(self.offset(0, y), self.width)
    }

    /// The `height` cells of column `x`, excluding ghost rows
    pub fn column_layout(&self, x: isize) -> Layout {
        assert!(self.contains(x, 0), "Column {x} outside grid");
        Layout::strided(self.offset(x, 0), self.height, 1, self.width_padded)
    }

    /// Every interior cell, row by row
    pub fn interior_layout(&self) -> Layout {
        Layout::strided(
            self.offset(0, 0),
            self.height,
            self.width,
            self.width_padded,
        )
    }

    /// Row `y` of the interior
    pub fn interior_row(&self, y: usize) -> &[Cell] {
        assert!(y < self.height);
        let start = self.offset(0, y as isize);
        &self.data[start..start + self.width]
    }

    /// The interior cells, row-major
    pub fn interior_values(&self) -> Vec<Cell> {
        self.interior_layout().gather(&self.data)
    }

    /// Copy of this grid's interior with a ghost border of `padding` zeroed cells
    pub fn with_padding(&self, padding: usize) -> Self {
        if padding == self.padding {
            return self.clone();
        }
        let mut grid = Self::new(self.width, self.height, padding);
        let layout = grid.interior_layout();
        layout.scatter(&self.interior_values(), &mut grid.data);
        grid
    }
}

#[cfg(test)]
mod test {
    use super::Grid;

    /// The 4x4 grid A..P (values 1..16) with a one cell border
    fn lettered() -> Grid {
        let values: Vec<f64> = (1..=16).map(|i| i as f64).collect();
        Grid::from_interior(4, 4, 1, &values).unwrap()
    }

    #[test]
    fn test_padded_extents() {
        let grid = Grid::new(5, 3, 1);
        assert_eq!(grid.width_padded(), 7);
        assert_eq!(grid.height_padded(), 5);
        assert_eq!(grid.data().len(), 35);
        assert!(grid.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_ghost_access() {
        let mut grid = lettered();
        assert_eq!(*grid.get_cell(0, 0).unwrap(), 1.0);
        assert_eq!(*grid.get_cell(3, 3).unwrap(), 16.0);
        assert_eq!(*grid.get_cell(-1, -1).unwrap(), 0.0);
        assert_eq!(*grid.get_cell(4, 4).unwrap(), 0.0);
        assert!(grid.get_cell(-2, 0).is_none());
        assert!(grid.get_cell(0, 5).is_none());

        *grid.get_cell_mut(-1, 2).unwrap() = 7.5;
        assert_eq!(grid.data()[3 * 6], 7.5);
    }

    #[test]
    fn test_layouts() {
        let grid = lettered();
        assert_eq!(grid.row_layout(0).gather(grid.data()), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            grid.row_layout(3).gather(grid.data()),
            vec![13.0, 14.0, 15.0, 16.0]
        );
        // D H L P
        assert_eq!(
            grid.column_layout(3).gather(grid.data()),
            vec![4.0, 8.0, 12.0, 16.0]
        );
        // A E I M
        assert_eq!(
            grid.column_layout(0).gather(grid.data()),
            vec![1.0, 5.0, 9.0, 13.0]
        );
        assert_eq!(grid.column_layout(-1).stride(), 6);
        assert_eq!(grid.row_layout(4).offset(), 5 * 6 + 1);
    }

    #[test]
    fn test_interior_round_trip() {
        let grid = lettered();
        let unpadded = grid.with_padding(0);
        assert_eq!(unpadded.padding(), 0);
        assert_eq!(unpadded.data(), grid.interior_values().as_slice());
        assert_eq!(unpadded.with_padding(1), grid);
        assert_eq!(grid.interior_row(1), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_from_interior_size_mismatch() {
        assert!(Grid::from_interior(3, 2, 0, &[0.0; 5]).is_err());
    }
}
