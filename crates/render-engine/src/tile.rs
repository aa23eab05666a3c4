//! Host tile-render contract.
//!
//! The host calls [`TileRenderer::prepare`] once per frame on its own
//! thread, then [`TileRenderer::render_tile`] for each output tile, possibly
//! from many worker threads at once. All state a tile needs is captured in
//! the [`RenderSnapshot`], so tiles never touch the live path model.
//!
//! Missing tracking or inpaint data never fails a tile: the mask falls back
//! to its reference position and the source passes through unfilled.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use tokio::sync::OnceCell;

use gphyx_backend::TrackingBackend;
use gphyx_common::clock::FrameKey;
use gphyx_common::config::RenderConfig;
use gphyx_common::error::{GphyxError, GphyxResult};
use gphyx_mask_model::{Homography, PathSnapshot, SnapshotPublisher};
use gphyx_tracking::TrackingCache;

use crate::compositor::{composite_tile, crop};
use crate::rasterizer::{rasterize, PixelRect, RasterParams};

/// Everything a tile render needs, captured ahead of the render call.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub frame: FrameKey,
    pub path: Arc<PathSnapshot>,
    pub alignment: Homography,
    /// Whether `alignment` came from a valid tracking result.
    pub tracked: bool,
}

/// Frame, path version and the bit pattern of the alignment the fill was
/// requested with.
type InpaintKey = (FrameKey, u64, [u64; 9]);
type InpaintSlot = Arc<OnceCell<Option<Arc<RgbaImage>>>>;

/// Per-frame inpaint results, oldest evicted first.
#[derive(Default)]
struct InpaintCache {
    slots: HashMap<InpaintKey, InpaintSlot>,
    order: VecDeque<InpaintKey>,
}

impl InpaintCache {
    fn slot(&mut self, key: InpaintKey, capacity: usize) -> InpaintSlot {
        if let Some(slot) = self.slots.get(&key) {
            return slot.clone();
        }
        while self.order.len() >= capacity.max(1) {
            match self.order.pop_front() {
                Some(old) => {
                    self.slots.remove(&old);
                }
                None => break,
            }
        }
        let slot = InpaintSlot::default();
        self.slots.insert(key, slot.clone());
        self.order.push_back(key);
        slot
    }
}

/// Renders object-removal tiles for one effect instance.
pub struct TileRenderer {
    backend: Arc<dyn TrackingBackend>,
    tracking: Arc<TrackingCache>,
    paths: Arc<SnapshotPublisher>,
    params: RasterParams,
    inpaint_capacity: usize,
    inpaint: Mutex<InpaintCache>,
}

impl TileRenderer {
    pub fn new(
        backend: Arc<dyn TrackingBackend>,
        tracking: Arc<TrackingCache>,
        paths: Arc<SnapshotPublisher>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            backend,
            tracking,
            paths,
            params: RasterParams::from(config),
            inpaint_capacity: config.inpaint_cache_frames,
            inpaint: Mutex::new(InpaintCache::default()),
        }
    }

    /// Output covers exactly the input.
    pub fn output_bounds(&self, input: PixelRect) -> PixelRect {
        input
    }

    /// An output tile reads the same pixels from the input.
    pub fn input_tile_bounds(&self, output_tile: PixelRect) -> PixelRect {
        output_tile
    }

    /// Capture the latest path and the frame's alignment.
    pub fn prepare(&self, frame: FrameKey) -> RenderSnapshot {
        let record = self.tracking.get(frame).filter(|r| r.valid);
        if record.is_none() {
            tracing::debug!(%frame, "No valid alignment, rendering untracked");
        }
        RenderSnapshot {
            frame,
            path: self.paths.latest(),
            alignment: record.as_ref().map_or(Homography::IDENTITY, |r| r.matrix),
            tracked: record.is_some(),
        }
    }

    /// Render one output tile from the full source frame.
    ///
    /// Errors only when `tile` lies outside `source`.
    pub async fn render_tile(
        &self,
        snapshot: &RenderSnapshot,
        source: Arc<RgbaImage>,
        tile: PixelRect,
    ) -> GphyxResult<RgbaImage> {
        let (width, height) = source.dimensions();
        if tile.is_empty() || !PixelRect::full(width, height).contains_rect(&tile) {
            return Err(GphyxError::render(format!(
                "Tile {tile:?} is outside the {width}x{height} source"
            )));
        }

        let mask = rasterize(
            &snapshot.path,
            &snapshot.alignment,
            width,
            height,
            tile,
            &self.params,
        );
        if mask.is_blank() {
            return Ok(crop(&source, tile));
        }

        let fill = self.inpainted(snapshot, source.clone()).await;
        Ok(composite_tile(&source, fill.as_deref(), &mask, tile))
    }

    /// [`render_tile`](Self::render_tile) for host worker threads that are
    /// not running inside the async runtime.
    pub fn render_tile_blocking(
        &self,
        runtime: &tokio::runtime::Handle,
        snapshot: &RenderSnapshot,
        source: Arc<RgbaImage>,
        tile: PixelRect,
    ) -> GphyxResult<RgbaImage> {
        runtime.block_on(self.render_tile(snapshot, source, tile))
    }

    /// Shared inpaint result for the snapshot's frame, path version and
    /// alignment.
    ///
    /// The first tile to ask issues the backend call; the rest wait on it.
    /// A failed call is remembered as absent.
    async fn inpainted(&self, snapshot: &RenderSnapshot, source: Arc<RgbaImage>) -> Option<Arc<RgbaImage>> {
        let key = (
            snapshot.frame,
            snapshot.path.version(),
            snapshot.alignment.to_row_major().map(f64::to_bits),
        );
        let slot = self
            .inpaint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slot(key, self.inpaint_capacity);

        slot.get_or_init(|| async {
            let polygon = snapshot.path.aligned_polygon(
                &snapshot.alignment,
                self.params.flatness,
                self.params.max_subdivision_depth,
            );
            match self.backend.inpaint(&source, &polygon).await {
                Ok(image) if image.dimensions() == source.dimensions() => {
                    tracing::debug!(frame = %snapshot.frame, "Inpainted frame");
                    Some(Arc::new(image))
                }
                Ok(image) => {
                    tracing::warn!(
                        frame = %snapshot.frame,
                        got = ?image.dimensions(),
                        expected = ?source.dimensions(),
                        "Inpaint result has the wrong size, passing source through"
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(frame = %snapshot.frame, error = %e, "Inpaint failed, passing source through");
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Number of frames with a cached (or pending) inpaint result.
    pub fn inpaint_cache_len(&self) -> usize {
        self.inpaint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    pub fn clear_inpaint_cache(&self) {
        let mut cache = self.inpaint.lock().unwrap_or_else(PoisonError::into_inner);
        cache.slots.clear();
        cache.order.clear();
    }
}
