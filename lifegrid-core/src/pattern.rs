//! Stampable patterns from the server catalog.

/// A named, fixed-size boolean cell mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    name: String,
    width: u32,
    height: u32,
    /// Row-major, always exactly `width * height` entries.
    cells: Vec<bool>,
}

impl Pattern {
    /// Build a pattern, truncating or padding `cells` to `width * height`.
    pub fn new(name: impl Into<String>, width: u32, height: u32, mut cells: Vec<bool>) -> Self {
        let name = name.into();
        let area = width as usize * height as usize;
        if cells.len() != area {
            log::warn!(
                "pattern {name:?}: {} cells for a {width}×{height} mask, resizing",
                cells.len()
            );
            cells.resize(area, false);
        }
        Self {
            name,
            width,
            height,
            cells,
        }
    }

    /// Build from text rows where `o`/`O`/`#` marks an alive cell.
    ///
    /// Width is the longest row; short rows are padded with dead cells.
    pub fn from_rows(name: impl Into<String>, rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut cells = Vec::with_capacity(width * rows.len());
        for row in rows {
            let mut len = 0;
            for c in row.chars() {
                cells.push(matches!(c, 'o' | 'O' | '#'));
                len += 1;
            }
            cells.extend(std::iter::repeat(false).take(width - len));
        }
        Self::new(name, width as u32, rows.len() as u32, cells)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// `(dx, dy)` offsets of alive cells relative to the top-left anchor.
    pub fn alive_offsets(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width.max(1) as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(move |(i, _)| ((i % width) as u32, (i / width) as u32))
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}
