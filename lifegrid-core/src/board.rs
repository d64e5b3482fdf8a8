//! Board snapshots and the run-length decoder.
//!
//! The server flattens its grid row by row: alive cells are sent as-is and
//! consecutive dead cells collapse into a single run marker. Decoding walks a
//! `(x, y)` cursor over the sparse stream and yields only alive cells, so a
//! mostly-empty 1000×1000 board never allocates a dense grid.
//!
//! ```text
//!  stream:  [A] [dead 1] [A] [A] │ [dead 4] │ ...
//!  row 0:    A   .        A   A  │          │
//!  row 1:                        │ . . . .  │
//! ```
//!
//! Overrun policy: once the cursor leaves the last row, decoding stops and
//! [`AliveCells::truncated`] reports whether anything that would have expanded
//! to cells was left behind. The snapshot is still treated as complete.

use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::cell::{PackedCell, Rgb};

/// Identifies board content for cheap dirty checks.
///
/// Computed once per snapshot; two snapshots with equal dimensions and equal
/// cell streams share a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeToken(pub u64);

impl ChangeToken {
    pub fn digest(width: u64, height: u64, cells: &[PackedCell]) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write_u64(width);
        hasher.write_u64(height);
        hasher.write_usize(cells.len());
        for cell in cells {
            hasher.write_u32(cell.0);
        }
        ChangeToken(hasher.finish())
    }
}

/// One decoded world update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    width: u64,
    height: u64,
    tick: u64,
    paused: bool,
    cells: Vec<PackedCell>,
    token: ChangeToken,
}

impl BoardSnapshot {
    pub fn new(width: u64, height: u64, tick: u64, paused: bool, cells: Vec<PackedCell>) -> Self {
        let token = ChangeToken::digest(width, height, &cells);
        Self {
            width,
            height,
            tick,
            paused,
            cells,
            token,
        }
    }

    /// A board with no alive cells.
    pub fn empty(width: u64, height: u64) -> Self {
        Self::new(width, height, 0, false, Vec::new())
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// The sparse packed stream as received.
    pub fn cells(&self) -> &[PackedCell] {
        &self.cells
    }

    pub fn token(&self) -> ChangeToken {
        self.token
    }

    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Lazily expand the stream into alive cells with absolute coordinates.
    pub fn alive_cells(&self) -> AliveCells<'_> {
        AliveCells {
            cells: self.cells.iter(),
            width: self.width,
            height: self.height,
            x: 0,
            y: 0,
            truncated: false,
            done: self.is_zero_area(),
        }
    }

    /// Expand into an addressable grid. `None` when `width * height` overflows
    /// or the grid cannot be allocated.
    pub fn to_dense(&self) -> Option<DenseBoard> {
        DenseBoard::from_snapshot(self)
    }
}

/// An alive cell with its absolute grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AliveCell {
    pub x: u64,
    pub y: u64,
    pub color: Rgb,
    pub weight: u8,
}

impl AliveCell {
    pub fn alpha(&self) -> f32 {
        crate::cell::weight_to_alpha(self.weight)
    }
}

/// Iterator returned by [`BoardSnapshot::alive_cells`].
pub struct AliveCells<'a> {
    cells: std::slice::Iter<'a, PackedCell>,
    width: u64,
    height: u64,
    x: u64,
    y: u64,
    truncated: bool,
    done: bool,
}

impl AliveCells<'_> {
    /// Whether the stream ran past `width * height`. Only meaningful once
    /// the iterator is exhausted.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn advance(&mut self, n: u64) {
        self.x = self.x.saturating_add(n);
        if self.x >= self.width {
            self.y = self.y.saturating_add(self.x / self.width);
            self.x %= self.width;
        }
    }
}

impl Iterator for AliveCells<'_> {
    type Item = AliveCell;

    fn next(&mut self) -> Option<AliveCell> {
        if self.done {
            return None;
        }

        while let Some(&cell) = self.cells.next() {
            if self.y >= self.height {
                // Zero-length run markers trail every row; only cells that
                // would expand count as overrun.
                if cell.is_alive() || cell.run_length() > 0 {
                    self.truncated = true;
                    self.done = true;
                    return None;
                }
                continue;
            }

            if cell.is_alive() {
                let out = AliveCell {
                    x: self.x,
                    y: self.y,
                    color: cell.color(),
                    weight: cell.weight(),
                };
                self.advance(1);
                return Some(out);
            }

            self.advance(u64::from(cell.run_length()));
        }

        self.done = true;
        None
    }
}

/// Colour and weight of an alive cell in a [`DenseBoard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseCell {
    pub color: Rgb,
    pub weight: u8,
}

/// Fully expanded board addressable by `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBoard {
    width: usize,
    height: usize,
    cells: Vec<Option<DenseCell>>,
}

impl DenseBoard {
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Option<Self> {
        let width = usize::try_from(snapshot.width()).ok()?;
        let height = usize::try_from(snapshot.height()).ok()?;
        let area = width.checked_mul(height)?;

        let mut cells = Vec::new();
        if let Err(e) = cells.try_reserve_exact(area) {
            log::warn!("cannot expand {width}×{height} board: {e}");
            return None;
        }
        cells.resize(area, None);
        for alive in snapshot.alive_cells() {
            // Coordinates are bounded by width/height, which fit in usize.
            let index = alive.y as usize * width + alive.x as usize;
            cells[index] = Some(DenseCell {
                color: alive.color,
                weight: alive.weight,
            });
        }

        Some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<DenseCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y * self.width + x]
    }

    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_some()
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Flatten a grid into the sparse packed stream.
///
/// Dead runs never cross a row boundary, so each row expands to exactly
/// `width` columns. Runs longer than a marker can hold are split.
pub fn pack_rows<F>(width: u64, height: u64, mut cell_at: F) -> Vec<PackedCell>
where
    F: FnMut(u64, u64) -> Option<(Rgb, u8)>,
{
    let mut out = Vec::new();
    for y in 0..height {
        let mut dead: u64 = 0;
        for x in 0..width {
            match cell_at(x, y) {
                Some((color, weight)) => {
                    flush_dead_run(&mut out, dead);
                    dead = 0;
                    out.push(PackedCell::alive(color, weight));
                }
                None => dead += 1,
            }
        }
        flush_dead_run(&mut out, dead);
    }
    out
}

fn flush_dead_run(out: &mut Vec<PackedCell>, mut dead: u64) {
    const MAX_RUN: u64 = (u32::MAX >> 1) as u64;
    while dead > 0 {
        let chunk = dead.min(MAX_RUN);
        out.push(PackedCell::dead_run(chunk as u32));
        dead -= chunk;
    }
}
