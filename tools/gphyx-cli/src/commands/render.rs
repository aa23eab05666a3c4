//! Render the object-removed sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use image::RgbaImage;
use tokio::task::JoinSet;

use gphyx_backend::{HttpBackend, TrackingBackend};
use gphyx_common::config::AppConfig;
use gphyx_mask_model::{MaskDocument, PathSnapshot, SnapshotPublisher};
use gphyx_render_engine::{PixelRect, TileRenderer};
use gphyx_tracking::{FrameSource, TrackingCache};

use super::frames::FrameSequence;

pub async fn run(
    config: &AppConfig,
    frames: PathBuf,
    mask: PathBuf,
    alignment: Option<PathBuf>,
    output_dir: PathBuf,
) -> anyhow::Result<()> {
    let sequence = FrameSequence::open(&frames)?;
    let document = MaskDocument::load(&mask)?;
    let tracking = match &alignment {
        Some(path) => TrackingCache::import(path)?,
        None => TrackingCache::new(),
    };
    let tracking = Arc::new(tracking);

    let paths = Arc::new(SnapshotPublisher::new(PathSnapshot::new(
        1,
        document.control_points(),
    )));
    let backend: Arc<dyn TrackingBackend> = Arc::new(HttpBackend::new(&config.backend)?);
    let renderer = Arc::new(TileRenderer::new(backend, tracking.clone(), paths, &config.render));

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create {}", output_dir.display()))?;

    println!("Rendering {} frames to {}", sequence.len(), output_dir.display());
    if alignment.is_none() {
        println!("[WARN] No alignment given, the mask stays at its reference position");
    }

    let mut untracked = 0usize;
    for (key, path) in sequence.iter() {
        let source = Arc::new(sequence.frame(key).await?);
        let snapshot = Arc::new(renderer.prepare(key));
        if !snapshot.tracked {
            untracked += 1;
        }

        let bounds = renderer.output_bounds(PixelRect::full(source.width(), source.height()));
        let mut tasks = JoinSet::new();
        for tile in bounds.tiles(config.render.tile_size) {
            let renderer = renderer.clone();
            let snapshot = snapshot.clone();
            let source = source.clone();
            tasks.spawn(async move {
                let input = renderer.input_tile_bounds(tile);
                let pixels = renderer.render_tile(&snapshot, source, input).await;
                pixels.map(|pixels| (tile, pixels))
            });
        }

        let mut output = RgbaImage::new(bounds.width, bounds.height);
        while let Some(joined) = tasks.join_next().await {
            let (tile, pixels) = joined??;
            image::imageops::replace(&mut output, &pixels, i64::from(tile.x), i64::from(tile.y));
        }

        let target = output_path(&output_dir, path);
        let written = target.clone();
        tokio::task::spawn_blocking(move || output.save(&written)).await??;
        tracing::debug!(frame = %key, tracked = snapshot.tracked, path = %target.display(), "Frame rendered");
    }

    println!();
    println!("[OK] Rendered {} frames", sequence.len());
    if untracked > 0 && alignment.is_some() {
        println!("[WARN] {untracked} frames had no valid alignment and used the reference position");
    }
    println!("     Inpainted frames cached: {}", renderer.inpaint_cache_len());
    Ok(())
}

/// Rendered frames keep the source file stem and are always PNG.
fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    output_dir.join(format!("{stem}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_switches_to_png() {
        let out = output_path(Path::new("/tmp/out"), Path::new("/data/clip/frame_0007.jpg"));
        assert_eq!(out, PathBuf::from("/tmp/out/frame_0007.png"));
    }
}
