//! gPHYX Render Engine
//!
//! Produces object-removal output tiles for the host.
//!
//! # Pipeline Architecture
//!
//! ```text
//! PathSnapshot ──┐
//!                ├── Flatten + align ── Scanline fill ──▶ CoverageMask
//! TrackingCache ─┘                                            │
//!                                                             ├── Blend ──▶ output tile
//! source frame ──── inpaint (once per frame) ──▶ fill ────────┘
//! ```

pub mod compositor;
pub mod rasterizer;
pub mod tile;

pub use compositor::{blend_pixel, composite_tile};
pub use rasterizer::{rasterize, CoverageMask, PixelRect, RasterParams};
pub use tile::{RenderSnapshot, TileRenderer};
