use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

use gphyx_backend::{BackendError, BackendResult, BackendStatus, InitOutcome, TrackingBackend};
use gphyx_common::clock::FrameKey;
use gphyx_common::config::RenderConfig;
use gphyx_mask_model::{ControlPoint, Homography, PathSnapshot, Point2D, SnapshotPublisher};
use gphyx_render_engine::{rasterize, PixelRect, RasterParams, TileRenderer};
use gphyx_tracking::{AlignmentRecord, TrackingCache};

const FILL: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Fills the mask's bounding box with a solid colour and counts calls.
#[derive(Default)]
struct CountingBackend {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl TrackingBackend for CountingBackend {
    async fn initialize(&self, _: &RgbaImage, _: &[Point2D]) -> BackendResult<InitOutcome> {
        Ok(InitOutcome {
            success: true,
            points_count: 1,
        })
    }

    async fn track(&self, _: &RgbaImage) -> BackendResult<Homography> {
        Ok(Homography::IDENTITY)
    }

    async fn inpaint(&self, frame: &RgbaImage, polygon: &[Point2D]) -> BackendResult<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail {
            return Err(BackendError::Status {
                status: 500,
                detail: "model crashed".to_string(),
            });
        }
        let (min, max) = polygon.iter().fold(
            (Point2D::new(f64::MAX, f64::MAX), Point2D::new(f64::MIN, f64::MIN)),
            |(min, max), p| {
                (
                    Point2D::new(min.x.min(p.x), min.y.min(p.y)),
                    Point2D::new(max.x.max(p.x), max.y.max(p.y)),
                )
            },
        );
        let (w, h) = (frame.width() as f64, frame.height() as f64);
        Ok(RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
            let u = (x as f64 + 0.5) / w;
            let v = 1.0 - (y as f64 + 0.5) / h;
            if (min.x..=max.x).contains(&u) && (min.y..=max.y).contains(&v) {
                FILL
            } else {
                *frame.get_pixel(x, y)
            }
        }))
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        Ok(BackendStatus { initialized: true })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn square(version: u64, min: f64, max: f64) -> PathSnapshot {
    PathSnapshot::new(
        version,
        vec![
            ControlPoint::corner(Point2D::new(min, min)),
            ControlPoint::corner(Point2D::new(max, min)),
            ControlPoint::corner(Point2D::new(max, max)),
            ControlPoint::corner(Point2D::new(min, max)),
        ],
    )
}

fn gradient(width: u32, height: u32) -> Arc<RgbaImage> {
    Arc::new(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 3) as u8, (y * 3) as u8, 77, 255])
    }))
}

fn renderer(
    backend: Arc<CountingBackend>,
    tracking: Arc<TrackingCache>,
    path: PathSnapshot,
) -> TileRenderer {
    let paths = Arc::new(SnapshotPublisher::new(path));
    TileRenderer::new(backend, tracking, paths, &RenderConfig::default())
}

#[tokio::test]
async fn test_untracked_frame_falls_back_to_identity() {
    let tracking = Arc::new(TrackingCache::new());
    tracking.insert(AlignmentRecord::reference(FrameKey(0)));
    for i in 1..=100 {
        tracking.insert(AlignmentRecord::tracked(
            FrameKey(i),
            Homography::translation(0.1, 0.0),
        ));
    }
    let backend = Arc::new(CountingBackend::default());
    let renderer = renderer(backend.clone(), tracking, square(1, 0.25, 0.75));
    let source = gradient(64, 64);
    let bounds = PixelRect::full(64, 64);

    assert_eq!(renderer.output_bounds(bounds), bounds);
    assert_eq!(renderer.input_tile_bounds(bounds), bounds);

    let snapshot = renderer.prepare(FrameKey(500));
    assert!(!snapshot.tracked);
    assert!(snapshot.alignment.is_identity());

    let out = renderer
        .render_tile(&snapshot, source.clone(), bounds)
        .await
        .unwrap();
    assert_eq!(out.dimensions(), (64, 64));

    // Mask spans pixels 16..48 on both axes.
    for &(x, y) in &[(0, 0), (5, 40), (63, 63), (15, 32), (48, 20), (32, 10)] {
        assert_eq!(out.get_pixel(x, y), source.get_pixel(x, y), "pixel ({x}, {y})");
    }
    assert_eq!(*out.get_pixel(32, 32), FILL);
    assert_eq!(*out.get_pixel(17, 32), FILL);

    // A tracked frame moves the mask right by 6.4 px.
    let tracked = renderer.prepare(FrameKey(50));
    assert!(tracked.tracked);
    let out = renderer.render_tile(&tracked, source.clone(), bounds).await.unwrap();
    assert_eq!(out.get_pixel(17, 32), source.get_pixel(17, 32));
    assert_eq!(*out.get_pixel(50, 32), FILL);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tiles_share_one_inpaint_call() {
    let backend = Arc::new(CountingBackend::default());
    let renderer = Arc::new(renderer(
        backend.clone(),
        Arc::new(TrackingCache::new()),
        square(3, 0.05, 0.95),
    ));
    let source = gradient(64, 32);
    let snapshot = Arc::new(renderer.prepare(FrameKey(12)));
    let tiles = PixelRect::full(64, 32).tiles(16);
    assert_eq!(tiles.len(), 8);

    let handles: Vec<_> = tiles
        .into_iter()
        .map(|tile| {
            let renderer = renderer.clone();
            let snapshot = snapshot.clone();
            let source = source.clone();
            tokio::spawn(async move {
                let out = renderer.render_tile(&snapshot, source, tile).await;
                out
            })
        })
        .collect();
    for handle in handles {
        let tile = handle.await.unwrap().unwrap();
        assert_eq!(tile.dimensions(), (16, 16));
    }

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.inpaint_cache_len(), 1);
}

#[test]
fn test_blocking_tiles_from_host_threads_share_one_inpaint_call() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let backend = Arc::new(CountingBackend::default());
    let renderer = renderer(
        backend.clone(),
        Arc::new(TrackingCache::new()),
        square(1, 0.05, 0.95),
    );
    let source = gradient(64, 32);
    let snapshot = renderer.prepare(FrameKey(0));

    std::thread::scope(|scope| {
        for tile in PixelRect::full(64, 32).tiles(16) {
            let (renderer, snapshot, source) = (&renderer, &snapshot, source.clone());
            let handle = runtime.handle();
            scope.spawn(move || {
                let out = renderer
                    .render_tile_blocking(handle, snapshot, source, tile)
                    .unwrap();
                assert_eq!(*out.get_pixel(8, 8), FILL);
            });
        }
    });

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_inpaint_passes_source_through_once() {
    let backend = Arc::new(CountingBackend {
        fail: true,
        ..CountingBackend::default()
    });
    let renderer = renderer(backend.clone(), Arc::new(TrackingCache::new()), square(1, 0.25, 0.75));
    let source = gradient(32, 32);
    let snapshot = renderer.prepare(FrameKey(3));

    for tile in PixelRect::full(32, 32).tiles(16) {
        let out = renderer.render_tile(&snapshot, source.clone(), tile).await.unwrap();
        assert_eq!(out.get_pixel(8, 8), source.get_pixel(tile.x + 8, tile.y + 8));
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_path_edit_invalidates_inpaint_result() {
    let backend = Arc::new(CountingBackend::default());
    let paths = Arc::new(SnapshotPublisher::new(square(1, 0.25, 0.75)));
    let renderer = TileRenderer::new(
        backend.clone(),
        Arc::new(TrackingCache::new()),
        paths.clone(),
        &RenderConfig::default(),
    );
    let source = gradient(32, 32);
    let tile = PixelRect::full(32, 32);

    let before = renderer.prepare(FrameKey(9));
    renderer.render_tile(&before, source.clone(), tile).await.unwrap();
    renderer.render_tile(&before, source.clone(), tile).await.unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    paths.publish(square(2, 0.2, 0.8));
    let after = renderer.prepare(FrameKey(9));
    renderer.render_tile(&after, source.clone(), tile).await.unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_tracking_update_invalidates_inpaint_result() {
    let tracking = Arc::new(TrackingCache::new());
    let backend = Arc::new(CountingBackend::default());
    let renderer = renderer(backend.clone(), tracking.clone(), square(1, 0.25, 0.75));
    let source = gradient(64, 64);
    let tile = PixelRect::full(64, 64);

    let untracked = renderer.prepare(FrameKey(5));
    assert!(!untracked.tracked);
    let out = renderer.render_tile(&untracked, source.clone(), tile).await.unwrap();
    assert_eq!(*out.get_pixel(40, 32), FILL);

    // Tracking catches up with the frame: the mask now spans pixels 32..64.
    tracking.insert(AlignmentRecord::tracked(
        FrameKey(5),
        Homography::translation(0.25, 0.0),
    ));
    let tracked = renderer.prepare(FrameKey(5));
    assert!(tracked.tracked);
    let out = renderer.render_tile(&tracked, source.clone(), tile).await.unwrap();

    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*out.get_pixel(40, 32), FILL);
    assert_eq!(*out.get_pixel(56, 32), FILL);
    assert_eq!(out.get_pixel(20, 32), source.get_pixel(20, 32));
}

#[tokio::test]
async fn test_tiles_outside_the_mask_skip_the_backend() {
    let backend = Arc::new(CountingBackend::default());
    let renderer = renderer(backend.clone(), Arc::new(TrackingCache::new()), square(1, 0.0, 0.25));
    let source = gradient(64, 64);
    let snapshot = renderer.prepare(FrameKey(1));

    // Top-left tile; the mask sits bottom-left in object space.
    let tile = PixelRect::new(0, 0, 16, 16);
    let out = renderer.render_tile(&snapshot, source.clone(), tile).await.unwrap();
    assert_eq!(out.get_pixel(4, 4), source.get_pixel(4, 4));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tile_outside_source_is_an_error() {
    let backend = Arc::new(CountingBackend::default());
    let renderer = renderer(backend, Arc::new(TrackingCache::new()), square(1, 0.25, 0.75));
    let snapshot = renderer.prepare(FrameKey(0));
    let result = renderer
        .render_tile(&snapshot, gradient(16, 16), PixelRect::new(8, 8, 16, 16))
        .await;
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn rasterization_is_deterministic(
        points in prop::collection::vec((0.0..1.0f64, 0.0..1.0f64), 3..12),
        curved in any::<bool>(),
        tx in -0.2..0.2f64,
        ty in -0.2..0.2f64,
        skew in -0.001..0.001f64,
    ) {
        let nodes: Vec<ControlPoint> = points
            .iter()
            .map(|&(x, y)| {
                let anchor = Point2D::new(x, y);
                if curved { ControlPoint::new(anchor) } else { ControlPoint::corner(anchor) }
            })
            .collect();
        let snapshot = PathSnapshot::new(1, nodes);
        let alignment = Homography::from_rows([[1.0, 0.02, tx], [-0.01, 1.0, ty], [skew, 0.0, 1.0]]);
        let region = PixelRect::new(3, 5, 40, 30);
        let params = RasterParams::default();

        let a = rasterize(&snapshot, &alignment, 48, 40, region, &params);
        let b = rasterize(&snapshot, &alignment, 48, 40, region, &params);
        prop_assert_eq!(a.values(), b.values());
        prop_assert!(a.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
