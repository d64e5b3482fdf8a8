//! Drawing targets.
//!
//! [`Surface`] is the minimal 2D API the renderer needs. [`PixelSurface`]
//! implements it in software over an RGBA8 framebuffer so frames can be
//! inspected in tests and dumped to disk.

use std::io::Write;

use bytemuck::{Pod, Zeroable};
use lifegrid_core::Rgb;
use thiserror::Error;

/// Largest framebuffer accepted, in pixels (16384²).
pub const MAX_PIXELS: u64 = 1 << 28;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("invalid surface size {width}×{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something cells can be painted on.
pub trait Surface {
    /// `(width, height)` in pixels.
    fn size(&self) -> (u32, u32);

    /// Fill everything with an opaque colour.
    fn clear(&mut self, color: Rgb);

    /// Blend `color` at `alpha` over the rectangle. Coordinates are in
    /// pixels and may be fractional; a pixel is covered when its centre
    /// falls inside the rectangle. Parts outside the surface are clipped.
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb, alpha: f32);
}

/// One framebuffer pixel, laid out for direct upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const fn opaque(color: Rgb) -> Self {
        Self {
            r: color.r,
            g: color.g,
            b: color.b,
            a: 0xFF,
        }
    }

    pub fn rgb(self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }

    /// Source-over blend onto an opaque destination.
    fn blend(self, src: Rgb, alpha: f32) -> Self {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |s: u8, d: u8| (f32::from(s) * a + f32::from(d) * (1.0 - a)).round() as u8;
        Self {
            r: mix(src.r, self.r),
            g: mix(src.g, self.g),
            b: mix(src.b, self.b),
            a: 0xFF,
        }
    }
}

/// Software RGBA8 framebuffer.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

fn check_size(width: u32, height: u32) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(SurfaceError::InvalidSize { width, height });
    }
    Ok(())
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        check_size(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![Pixel::opaque(Rgb::BLACK); width as usize * height as usize],
        })
    }

    /// Resize, discarding contents. No-op when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        check_size(width, height)?;
        log::debug!("resizing surface to {width}×{height}");
        self.width = width;
        self.height = height;
        self.pixels = vec![Pixel::opaque(Rgb::BLACK); width as usize * height as usize];
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Write the frame as a binary PPM (`P6`).
    pub fn write_ppm<W: Write>(&self, mut out: W) -> Result<(), SurfaceError> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut row = Vec::with_capacity(self.width as usize * 3);
        for line in self.pixels.chunks_exact(self.width as usize) {
            row.clear();
            for p in line {
                row.extend_from_slice(&[p.r, p.g, p.b]);
            }
            out.write_all(&row)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Pixel index span covered by `[start, start + len)` along one axis.
fn covered(start: f64, len: f64, limit: u32) -> std::ops::Range<u32> {
    if !(start.is_finite() && len.is_finite()) || len <= 0.0 {
        return 0..0;
    }
    let first = (start - 0.5).ceil().max(0.0);
    let end = (start + len - 0.5).ceil().min(f64::from(limit));
    if end <= first {
        return 0..0;
    }
    first as u32..end as u32
}

impl Surface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgb) {
        self.pixels.fill(Pixel::opaque(color));
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb, alpha: f32) {
        let cols = covered(x, w, self.width);
        let stride = self.width as usize;
        for py in covered(y, h, self.height) {
            let row = py as usize * stride;
            for px in cols.clone() {
                let p = &mut self.pixels[row + px as usize];
                *p = p.blend(color, alpha);
            }
        }
    }
}
