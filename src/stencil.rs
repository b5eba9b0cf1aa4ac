//! Reference five-point stencils

use crate::grid::Grid;
use crate::traits::Stencil;
use crate::types::{Cell, Error, Result};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use rayon::slice::ParallelSliceMut;

/// Explicit heat diffusion on a five-point stencil.
///
/// Each interior cell becomes `u + alpha * (uN + uS + uE + uW - 4u)`. The
/// ghost border of the input must be current; the border of the output is
/// zeroed and must be refreshed before the next update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatDiffusion {
    alpha: Cell,
}

impl HeatDiffusion {
    /// Create a diffusion stencil; `alpha` must lie in `(0, 0.25]` for the scheme to be stable
    pub fn new(alpha: Cell) -> Result<Self> {
        if alpha > 0.0 && alpha <= 0.25 {
            Ok(Self { alpha })
        } else {
            Err(Error::Config(format!(
                "diffusion coefficient {alpha} outside (0, 0.25]"
            )))
        }
    }

    /// Diffusion coefficient
    pub fn alpha(&self) -> Cell {
        self.alpha
    }
}

impl Default for HeatDiffusion {
    fn default() -> Self {
        Self { alpha: 0.1 }
    }
}

impl Stencil for HeatDiffusion {
    fn update(&self, grid: &Grid) -> Grid {
        let p = grid.padding();
        assert!(p >= 1, "Diffusion needs a ghost border");
        let (w, h) = (grid.width(), grid.height());
        let stride = grid.width_padded();
        let alpha = self.alpha;
        let data = grid.data();

        let mut next = Grid::new(w, h, p);
        next.data_mut()
            .par_chunks_exact_mut(stride)
            .into_par_iter()
            .enumerate()
            .skip(p)
            .take(h)
            .for_each(|(row, out)| {
                for x in p..p + w {
                    let i = row * stride + x;
                    let u = data[i];
                    let neighbours =
                        data[i - stride] + data[i + stride] + data[i - 1] + data[i + 1];
                    out[x] = u + alpha * (neighbours - 4.0 * u);
                }
            });
        next
    }
}
