//! Strided layout descriptor

use crate::types::Cell;

/// Position of a strip of cells inside a flat buffer.
///
/// A layout selects `count` blocks of `block` contiguous cells, the start of
/// each block `stride` cells after the previous one, beginning at `offset`.
/// This is the shape of an MPI vector datatype: a padded row is one block, a
/// column is `height` blocks of one cell whose stride is the padded width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    offset: usize,
    count: usize,
    block: usize,
    stride: usize,
}

impl Layout {
    /// A single run of `len` contiguous cells
    pub fn contiguous(offset: usize, len: usize) -> Self {
        Self {
            offset,
            count: 1,
            block: len,
            stride: len,
        }
    }

    /// `count` blocks of `block` cells, block starts `stride` cells apart
    pub fn strided(offset: usize, count: usize, block: usize, stride: usize) -> Self {
        assert!(
            count <= 1 || stride >= block,
            "Blocks of a layout must not overlap"
        );
        Self {
            offset,
            count,
            block,
            stride,
        }
    }

    /// Index of the first cell
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// Number of blocks
    pub fn count(&self) -> usize {
        self.count
    }
    /// Cells per block
    pub fn block(&self) -> usize {
        self.block
    }
    /// Distance between the starts of consecutive blocks
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of cells selected
    pub fn len(&self) -> usize {
        self.count * self.block
    }

    /// Whether the layout selects no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the last buffer index touched by the layout
    pub fn extent(&self) -> usize {
        if self.is_empty() {
            self.offset
        } else {
            self.offset + (self.count - 1) * self.stride + self.block
        }
    }

    /// Copy the selected cells out of `data` in transfer order
    pub fn gather(&self, data: &[Cell]) -> Vec<Cell> {
        assert!(self.extent() <= data.len(), "Layout exceeds buffer");
        let mut values = Vec::with_capacity(self.len());
        for i in 0..self.count {
            let start = self.offset + i * self.stride;
            values.extend_from_slice(&data[start..start + self.block]);
        }
        values
    }

    /// Write `values` into the selected cells of `data`
    pub fn scatter(&self, values: &[Cell], data: &mut [Cell]) {
        assert_eq!(values.len(), self.len());
        assert!(self.extent() <= data.len(), "Layout exceeds buffer");
        if self.block == 0 {
            return;
        }
        for (i, chunk) in values.chunks_exact(self.block).enumerate() {
            let start = self.offset + i * self.stride;
            data[start..start + self.block].copy_from_slice(chunk);
        }
    }
}
