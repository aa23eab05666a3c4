//! Wire formats of the processing service.
//!
//! The service works on decoded images in top-left pixel space and takes
//! mask points as a JSON array of normalized `[x, y]` pairs with y up
//! (it flips them itself). Homographies come back in pixel space and are
//! conjugated into normalized object space here.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use gphyx_mask_model::{Homography, Point2D};

use crate::error::{BackendError, BackendResult};

/// `POST /init_track` response.
#[derive(Debug, Clone, Deserialize)]
pub struct InitTrackResponse {
    pub status: String,
    #[serde(default)]
    pub points_count: usize,
}

/// `POST /track_frame` response.
///
/// The service answers with an identity matrix plus `error` when it fails
/// internally; a present `error` is treated as a failed frame.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackFrameResponse {
    pub homography: [[f64; 3]; 3],
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /status` response.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub initialized: bool,
}

/// FastAPI-style error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Serialize)]
struct PointPair(f64, f64);

/// Serialize mask points as `[[x, y], ...]`.
pub fn points_json(points: &[Point2D]) -> BackendResult<String> {
    let pairs: Vec<PointPair> = points.iter().map(|p| PointPair(p.x, p.y)).collect();
    Ok(serde_json::to_string(&pairs)?)
}

/// Map from normalized object space to top-left pixel space of a
/// `width × height` frame.
pub fn normalized_to_pixel(width: u32, height: u32) -> Homography {
    let w = width as f64;
    let h = height as f64;
    Homography::from_rows([[w, 0.0, 0.0], [0.0, -h, h], [0.0, 0.0, 1.0]])
}

/// Convert a pixel-space homography into normalized object space.
pub fn pixel_to_normalized_homography(
    pixel: &Homography,
    width: u32,
    height: u32,
) -> BackendResult<Homography> {
    if width == 0 || height == 0 {
        return Err(BackendError::Protocol("Frame has zero size".to_string()));
    }
    let s = normalized_to_pixel(width, height);
    let s_inv = s
        .inverse()
        .ok_or_else(|| BackendError::Protocol("Degenerate frame size".to_string()))?;
    let normalized = (s_inv * *pixel * s).normalized();
    if !normalized.is_finite() {
        return Err(BackendError::Protocol(
            "Backend returned a non-finite homography".to_string(),
        ));
    }
    Ok(normalized)
}

/// Encode a frame for upload. PNG keeps the tracker input lossless.
pub fn encode_frame(frame: &RgbaImage) -> BackendResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    frame.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Decode an image returned by the service (JPEG or PNG).
pub fn decode_frame(bytes: &[u8]) -> BackendResult<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}
