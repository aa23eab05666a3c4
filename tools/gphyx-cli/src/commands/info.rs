//! Show mask information.

use std::path::PathBuf;

use gphyx_common::config::AppConfig;
use gphyx_mask_model::{MaskDocument, PathSnapshot, Point2D};

pub fn run(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let document =
        MaskDocument::load(&path).map_err(|e| anyhow::anyhow!("Failed to load mask: {e}"))?;
    let nodes = document.control_points();
    let snapshot = PathSnapshot::new(1, nodes.clone());
    let polygon = snapshot.flatten(config.render.flatness, config.render.max_subdivision_depth);

    println!("Mask: {}", path.display());
    println!("  Instance: {}", document.instance_id);
    match document.saved_at {
        Some(at) => println!("  Saved: {at}"),
        None => println!("  Saved: unknown"),
    }
    if document.nodes.is_empty() && !document.points.is_empty() {
        println!("  Format: legacy point list");
    }
    println!();

    println!("Geometry:");
    println!("  Nodes: {}", nodes.len());
    println!("  Curves: {}", nodes.iter().filter(|n| n.is_curve).count());
    println!(
        "  Broken handles: {}",
        nodes.iter().filter(|n| n.is_curve && n.handles_broken).count()
    );
    println!("  Polygon points: {}", polygon.len());
    if let Some((min, max)) = bounds(&polygon) {
        println!(
            "  Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
            min.x, min.y, max.x, max.y
        );
        println!("  Area: {:.4} of frame", polygon_area(&polygon));
    }
    if !snapshot.encloses_area() {
        println!();
        println!("[WARN] Mask needs at least 3 nodes to remove anything");
    }

    Ok(())
}

fn bounds(polygon: &[Point2D]) -> Option<(Point2D, Point2D)> {
    let first = *polygon.first()?;
    Some(polygon.iter().fold((first, first), |(min, max), p| {
        (
            Point2D::new(min.x.min(p.x), min.y.min(p.y)),
            Point2D::new(max.x.max(p.x), max.y.max(p.y)),
        )
    }))
}

/// Shoelace area, absolute.
fn polygon_area(polygon: &[Point2D]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_area_and_bounds() {
        let square = [
            Point2D::new(0.25, 0.25),
            Point2D::new(0.75, 0.25),
            Point2D::new(0.75, 0.75),
            Point2D::new(0.25, 0.75),
        ];
        assert!((polygon_area(&square) - 0.25).abs() < 1e-12);
        let (min, max) = bounds(&square).unwrap();
        assert_eq!(min, Point2D::new(0.25, 0.25));
        assert_eq!(max, Point2D::new(0.75, 0.75));
        assert_eq!(polygon_area(&square[..2]), 0.0);
        assert!(bounds(&[]).is_none());
    }
}
