//! Pixel ↔ cell coordinate mapping.
//!
//! The canvas grows one pixel per cell on top of a fixed base, so each axis
//! is `base + grid` pixels wide and a cell spans `(grid + base) / grid`
//! pixels (fractional in general).

use lifegrid_core::BoardSnapshot;

/// Base canvas extent per axis, in pixels.
pub const BASE_CANVAS: u32 = 800;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMapper {
    grid: (u64, u64),
    canvas: (f64, f64),
}

impl CellMapper {
    /// Mapper for a `grid_w × grid_h` board on its standard canvas.
    pub fn new(grid_w: u64, grid_h: u64) -> Self {
        Self::with_base(grid_w, grid_h, BASE_CANVAS)
    }

    pub fn with_base(grid_w: u64, grid_h: u64, base: u32) -> Self {
        let extent = |grid: u64| (u64::from(base) + grid) as f64;
        Self {
            grid: (grid_w, grid_h),
            canvas: (extent(grid_w), extent(grid_h)),
        }
    }

    /// Mapper stretched over an arbitrary canvas size.
    pub fn with_canvas(grid_w: u64, grid_h: u64, canvas_w: u32, canvas_h: u32) -> Self {
        Self {
            grid: (grid_w, grid_h),
            canvas: (f64::from(canvas_w), f64::from(canvas_h)),
        }
    }

    pub fn for_board(board: &BoardSnapshot) -> Self {
        Self::new(board.width(), board.height())
    }

    pub fn grid(&self) -> (u64, u64) {
        self.grid
    }

    /// Canvas size in whole pixels, clamped to `u32`.
    pub fn canvas_size(&self) -> (u32, u32) {
        let clamp = |v: f64| v.min(f64::from(u32::MAX)) as u32;
        (clamp(self.canvas.0), clamp(self.canvas.1))
    }

    /// Pixel extent of one cell. Zero on an empty axis.
    pub fn cell_size(&self) -> (f64, f64) {
        let size = |canvas: f64, grid: u64| if grid == 0 { 0.0 } else { canvas / grid as f64 };
        (size(self.canvas.0, self.grid.0), size(self.canvas.1, self.grid.1))
    }

    /// Top-left pixel of a cell.
    pub fn cell_origin(&self, x: u64, y: u64) -> (f64, f64) {
        let (cw, ch) = self.cell_size();
        (x as f64 * cw, y as f64 * ch)
    }

    /// Cell under a pixel, or `None` when the pixel is off the board.
    pub fn pixel_to_cell(&self, px: f64, py: f64) -> Option<(u32, u32)> {
        let (cw, ch) = self.cell_size();
        let axis = |p: f64, size: f64, grid: u64| -> Option<u32> {
            if !p.is_finite() || p < 0.0 || size <= 0.0 {
                return None;
            }
            let cell = (p / size).floor();
            if cell >= grid as f64 {
                return None;
            }
            u32::try_from(cell as u64).ok()
        };
        Some((axis(px, cw, self.grid.0)?, axis(py, ch, self.grid.1)?))
    }
}
