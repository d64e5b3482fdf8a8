//! Incremental board renderer.
//!
//! A repaint happens only when something visible changed. The decision is a
//! comparison of a small [`DirtyKey`]; the board itself is identified by its
//! precomputed change token, so an unchanged frame costs no cell work.
//!
//! Paint order: clear to background, alive cells at their weight-derived
//! alpha, then the armed-pattern preview under the pointer.

use lifegrid_core::{BoardSnapshot, ChangeToken, Pattern, Rgb};

use crate::mapping::CellMapper;
use crate::surface::Surface;

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    pub background: Rgb,
    /// Alpha of the pattern preview overlay.
    pub overlay_alpha: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            background: Rgb::BLACK,
            overlay_alpha: 0.5,
        }
    }
}

/// Everything one repaint reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderFrame<'a> {
    pub board: Option<&'a BoardSnapshot>,
    pub active_pattern: Option<&'a Pattern>,
    /// Pointer position in surface pixels; `None` when off the surface.
    pub pointer: Option<(f64, f64)>,
    pub local_color: Rgb,
}

/// Statistics for one real repaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub cells_drawn: u64,
    pub overlay_cells: u64,
    /// The board stream described more cells than fit the grid.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DirtyKey {
    surface: (u32, u32),
    paused: bool,
    tick: u64,
    token: ChangeToken,
    pattern: Option<String>,
    /// Only tracked while a preview can be visible.
    cursor_cell: Option<(u32, u32)>,
}

pub struct Renderer {
    config: RendererConfig,
    last_key: Option<DirtyKey>,
    redraws: u64,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            last_key: None,
            redraws: 0,
        }
    }

    /// Number of repaints that actually drew.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Force the next [`repaint`](Self::repaint) to draw.
    pub fn invalidate(&mut self) {
        self.last_key = None;
    }

    /// Cell under the pointer when a pattern preview applies.
    fn preview_cell(mapper: &CellMapper, frame: &RenderFrame<'_>, paused: bool) -> Option<(u32, u32)> {
        if !paused || frame.active_pattern.is_none() {
            return None;
        }
        let (px, py) = frame.pointer?;
        mapper.pixel_to_cell(px, py)
    }

    /// Redraw if anything visible changed. Returns `None` when skipped.
    pub fn repaint<S: Surface>(&mut self, surface: &mut S, frame: &RenderFrame<'_>) -> Option<FrameStats> {
        let (width, height) = surface.size();
        let board = frame.board;
        let (grid_w, grid_h) = board.map_or((0, 0), |b| (b.width(), b.height()));
        let mapper = CellMapper::with_canvas(grid_w, grid_h, width, height);
        let paused = board.is_some_and(|b| b.paused());
        let cursor_cell = Self::preview_cell(&mapper, frame, paused);

        let key = DirtyKey {
            surface: (width, height),
            paused,
            tick: board.map_or(0, |b| b.tick()),
            token: board.map_or(ChangeToken::default(), |b| b.token()),
            pattern: frame.active_pattern.map(|p| p.name().to_owned()),
            cursor_cell,
        };
        if self.last_key.as_ref() == Some(&key) {
            return None;
        }

        surface.clear(self.config.background);
        let mut stats = FrameStats::default();
        let (cw, ch) = mapper.cell_size();

        if let Some(board) = board {
            let mut cells = board.alive_cells();
            for cell in cells.by_ref() {
                let (x, y) = mapper.cell_origin(cell.x, cell.y);
                surface.fill_rect(x, y, cw - 1.0, ch - 1.0, cell.color, cell.alpha());
                stats.cells_drawn += 1;
            }
            if cells.truncated() {
                log::warn!(
                    "board stream overruns {}×{} grid at tick {}, extra cells ignored",
                    board.width(),
                    board.height(),
                    board.tick()
                );
                stats.truncated = true;
            }
        }

        if let (Some((cx, cy)), Some(pattern)) = (cursor_cell, frame.active_pattern) {
            for (dx, dy) in pattern.alive_offsets() {
                let (x, y) = (u64::from(cx) + u64::from(dx), u64::from(cy) + u64::from(dy));
                if x >= grid_w || y >= grid_h {
                    continue;
                }
                let (px, py) = mapper.cell_origin(x, y);
                surface.fill_rect(px, py, cw - 1.0, ch - 1.0, frame.local_color, self.config.overlay_alpha);
                stats.overlay_cells += 1;
            }
        }

        self.last_key = Some(key);
        self.redraws += 1;
        log::debug!("repaint #{}: {stats:?}", self.redraws);
        Some(stats)
    }
}
