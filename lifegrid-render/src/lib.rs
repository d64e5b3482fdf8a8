//! # lifegrid-render
//!
//! Software renderer for Lifegrid boards.
//!
//! ## Architecture
//!
//! ```text
//!  BoardSnapshot (lifegrid-core)
//!       │
//!       ▼
//!  Renderer.repaint(frame)     ◀─── dirty check on (paused, tick, token, pattern, cursor)
//!       │
//!       ▼
//!  CellMapper                  ◀─── cell ↔ pixel geometry
//!       │
//!       ▼
//!  Surface.fill_rect()         ◀─── PixelSurface (RGBA8) or any other target
//! ```
//!
//! ## Crate modules
//!
//! - [`surface`]: drawing trait and the software framebuffer
//! - [`mapping`]: pixel ↔ cell coordinate mapping
//! - [`renderer`]: incremental frame orchestration

pub mod mapping;
pub mod renderer;
pub mod surface;

pub use mapping::{CellMapper, BASE_CANVAS};
pub use renderer::{FrameStats, RenderFrame, Renderer, RendererConfig};
pub use surface::{Pixel, PixelSurface, Surface, SurfaceError};
