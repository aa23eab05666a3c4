//! Blends inpainted content over the source through the coverage mask.

use image::{Rgba, RgbaImage};

use crate::rasterizer::{CoverageMask, PixelRect};

/// `source + (fill − source) · coverage` per channel.
///
/// Zero coverage returns the source pixel untouched and full coverage
/// returns the fill pixel untouched.
pub fn blend_pixel(source: Rgba<u8>, fill: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    if coverage <= 0.0 {
        return source;
    }
    if coverage >= 1.0 {
        return fill;
    }
    let c = coverage as f64;
    Rgba(std::array::from_fn(|i| {
        let s = source.0[i] as f64;
        let f = fill.0[i] as f64;
        (s + (f - s) * c).round().clamp(0.0, 255.0) as u8
    }))
}

/// Copy `tile` out of a full frame.
pub fn crop(frame: &RgbaImage, tile: PixelRect) -> RgbaImage {
    image::imageops::crop_imm(frame, tile.x, tile.y, tile.width, tile.height).to_image()
}

/// Composite one tile.
///
/// `source` and `fill` are full frames of the same size; `mask` must cover
/// `tile`. Without a fill the source passes through.
pub fn composite_tile(
    source: &RgbaImage,
    fill: Option<&RgbaImage>,
    mask: &CoverageMask,
    tile: PixelRect,
) -> RgbaImage {
    let Some(fill) = fill else {
        return crop(source, tile);
    };
    RgbaImage::from_fn(tile.width, tile.height, |tx, ty| {
        let (x, y) = (tile.x + tx, tile.y + ty);
        blend_pixel(*source.get_pixel(x, y), *fill.get_pixel(x, y), mask.get(x, y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints_are_exact() {
        let s = Rgba([10, 20, 30, 255]);
        let f = Rgba([200, 100, 0, 128]);
        assert_eq!(blend_pixel(s, f, 0.0), s);
        assert_eq!(blend_pixel(s, f, 1.0), f);
        assert_eq!(blend_pixel(s, f, 0.5), Rgba([105, 60, 15, 192]));
    }

    #[test]
    fn test_composite_without_fill_passes_source_through() {
        let source = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let tile = PixelRect::new(2, 4, 4, 2);
        let mask = CoverageMask::empty(tile);
        let out = composite_tile(&source, None, &mask, tile);
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(*out.get_pixel(0, 0), Rgba([2, 4, 0, 255]));
        assert_eq!(*out.get_pixel(3, 1), Rgba([5, 5, 0, 255]));
    }
}
