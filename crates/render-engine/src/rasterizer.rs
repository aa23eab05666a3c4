//! Scanline rasterization of the mask outline into a coverage surface.
//!
//! The outline is flattened in normalized space, moved by the frame's
//! alignment, mapped to pixels (`x·w`, `(1−y)·h`) and filled with the
//! non-zero winding rule. Each pixel row is sampled by `subsamples`
//! horizontal scanlines; along a scanline the covered span is measured
//! exactly, so vertical edges are anti-aliased as well as horizontal ones.

use serde::{Deserialize, Serialize};

use gphyx_common::config::RenderConfig;
use gphyx_mask_model::{Homography, PathSnapshot, Point2D};

/// Rectangle of pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| PixelRect::new(x, y, right - x, bottom - y))
    }

    /// Split into a grid of tiles of at most `tile_size` pixels per side.
    pub fn tiles(&self, tile_size: u32) -> Vec<PixelRect> {
        let step = tile_size.max(1);
        let mut tiles = Vec::new();
        let mut y = self.y;
        while y < self.bottom() {
            let h = step.min(self.bottom() - y);
            let mut x = self.x;
            while x < self.right() {
                let w = step.min(self.right() - x);
                tiles.push(PixelRect::new(x, y, w, h));
                x += w;
            }
            y += h;
        }
        tiles
    }
}

/// Rasterization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterParams {
    pub subsamples: u32,
    pub flatness: f64,
    pub max_subdivision_depth: u32,
}

impl From<&RenderConfig> for RasterParams {
    fn from(config: &RenderConfig) -> Self {
        Self {
            subsamples: config.subsamples.max(1),
            flatness: config.flatness,
            max_subdivision_depth: config.max_subdivision_depth,
        }
    }
}

impl Default for RasterParams {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

/// Single-channel coverage in `[0, 1]` for one pixel region.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMask {
    region: PixelRect,
    values: Vec<f32>,
}

impl CoverageMask {
    /// A mask covering nothing.
    pub fn empty(region: PixelRect) -> Self {
        Self {
            region,
            values: vec![0.0; region.area() as usize],
        }
    }

    pub fn region(&self) -> PixelRect {
        self.region
    }

    /// Row-major values for the region.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Coverage at absolute pixel coordinates; zero outside the region.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        let r = &self.region;
        if x < r.x || y < r.y || x >= r.right() || y >= r.bottom() {
            return 0.0;
        }
        self.values[((y - r.y) * r.width + (x - r.x)) as usize]
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Sum of coverage, in pixels.
    pub fn covered_area(&self) -> f64 {
        self.values.iter().map(|&v| v as f64).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x_top: f64,
    y_top: f64,
    y_bottom: f64,
    dx_dy: f64,
    winding: i32,
}

impl Edge {
    fn new(a: Point2D, b: Point2D) -> Option<Self> {
        if a.y == b.y {
            return None;
        }
        let (top, bottom, winding) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
        Some(Self {
            x_top: top.x,
            y_top: top.y,
            y_bottom: bottom.y,
            dx_dy: (bottom.x - top.x) / (bottom.y - top.y),
            winding,
        })
    }

    // Half-open in y so a vertex shared by two edges is counted once.
    fn crossing(&self, y: f64) -> Option<(f64, i32)> {
        (y >= self.y_top && y < self.y_bottom)
            .then(|| (self.x_top + (y - self.y_top) * self.dx_dy, self.winding))
    }
}

/// Rasterize `snapshot` as seen in a frame aligned by `alignment`.
///
/// Only pixels inside `region` are computed. Identical inputs give
/// bit-identical masks.
pub fn rasterize(
    snapshot: &PathSnapshot,
    alignment: &Homography,
    frame_width: u32,
    frame_height: u32,
    region: PixelRect,
    params: &RasterParams,
) -> CoverageMask {
    let mut mask = CoverageMask::empty(region);
    if region.is_empty() || !snapshot.encloses_area() {
        return mask;
    }

    let (w, h) = (frame_width as f64, frame_height as f64);
    let polygon: Vec<Point2D> = snapshot
        .aligned_polygon(alignment, params.flatness, params.max_subdivision_depth)
        .into_iter()
        .map(|p| Point2D::new(p.x * w, (1.0 - p.y) * h))
        .collect();
    if polygon.len() < 3 {
        return mask;
    }

    let (top, bottom) = (region.y as f64, region.bottom() as f64);
    let edges: Vec<Edge> = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .filter_map(|(&a, &b)| Edge::new(a, b))
        .filter(|e| e.y_bottom > top && e.y_top < bottom)
        .collect();
    if edges.is_empty() {
        return mask;
    }

    let subsamples = params.subsamples.max(1);
    let weight = 1.0 / subsamples as f64;
    let mut row = vec![0.0f64; region.width as usize];
    let mut crossings: Vec<(f64, i32)> = Vec::with_capacity(edges.len());

    for py in region.y..region.bottom() {
        row.iter_mut().for_each(|v| *v = 0.0);

        for s in 0..subsamples {
            let sy = py as f64 + (s as f64 + 0.5) * weight;
            crossings.clear();
            crossings.extend(edges.iter().filter_map(|e| e.crossing(sy)));
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut winding = 0;
            let mut span_start = 0.0;
            for &(x, dir) in &crossings {
                let was_inside = winding != 0;
                winding += dir;
                match (was_inside, winding != 0) {
                    (false, true) => span_start = x,
                    (true, false) => accumulate_span(&mut row, region, span_start, x, weight),
                    _ => {}
                }
            }
        }

        let offset = ((py - region.y) * region.width) as usize;
        for (dst, &acc) in mask.values[offset..offset + region.width as usize]
            .iter_mut()
            .zip(&row)
        {
            *dst = acc.clamp(0.0, 1.0) as f32;
        }
    }

    mask
}

/// Add the horizontal span `[x0, x1)` to the row, weighted per pixel by
/// how much of the pixel it overlaps.
fn accumulate_span(row: &mut [f64], region: PixelRect, x0: f64, x1: f64, weight: f64) {
    let left = region.x as f64;
    let right = region.right() as f64;
    let x0 = x0.max(left);
    let x1 = x1.min(right);
    if x1 <= x0 {
        return;
    }

    let first = x0.floor() as u32;
    let last = (x1.ceil() as u32).min(region.right());
    for px in first..last {
        let overlap = (x1.min(px as f64 + 1.0) - x0.max(px as f64)).max(0.0);
        row[(px - region.x) as usize] += overlap * weight;
    }
}
