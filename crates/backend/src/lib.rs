//! gPHYX Backend Client
//!
//! The request/response boundary to the remote service that seeds the
//! tracker, reports per-frame motion, and inpaints the masked region.
//!
//! ```text
//!  TrackingSession ── initialize(frame, points) ──▶ ┐
//!                  ── track(frame) ───────────────▶ │  TrackingBackend
//!  TileRenderer    ── inpaint(frame, points) ─────▶ ┘   (HTTP, in-process, ...)
//! ```
//!
//! Calls are plain futures. Nothing here retries: a failed call is
//! returned to the caller, which decides how to degrade. Ordering of
//! `track` calls is the session's responsibility, not the client's.

pub mod error;
pub mod http;
pub mod wire;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use gphyx_mask_model::{Homography, Point2D};

pub use error::{BackendError, BackendResult};
pub use http::HttpBackend;

/// Result of seeding the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitOutcome {
    pub success: bool,
    /// Number of feature points found inside the mask.
    pub points_count: usize,
}

/// Service health as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Whether a reference frame has been set.
    pub initialized: bool,
}

/// Abstract interface to the tracking/inpainting service.
///
/// Mask points are normalized object-space coordinates (origin
/// bottom-left). Homographies use the convention documented in
/// [`gphyx_mask_model::homography`].
#[async_trait]
pub trait TrackingBackend: Send + Sync {
    /// Seed the tracker with a reference frame and the mask outline.
    async fn initialize(&self, frame: &RgbaImage, mask_points: &[Point2D])
        -> BackendResult<InitOutcome>;

    /// Motion of the tracked region from the previously submitted frame to
    /// this one.
    async fn track(&self, frame: &RgbaImage) -> BackendResult<Homography>;

    /// Content-aware fill of the masked region of `frame`.
    async fn inpaint(&self, frame: &RgbaImage, mask_points: &[Point2D])
        -> BackendResult<RgbaImage>;

    /// Query service state.
    async fn status(&self) -> BackendResult<BackendStatus>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
