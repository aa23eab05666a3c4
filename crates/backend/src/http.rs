//! HTTP client for the processing service.
//!
//! `/track_frame` answers with the reference-to-current motion. The client
//! remembers the last accepted answer and hands the session only the step
//! since the previous frame.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use reqwest::multipart::{Form, Part};

use gphyx_common::config::BackendConfig;
use gphyx_mask_model::{Homography, Point2D};

use crate::error::{BackendError, BackendResult};
use crate::wire::{
    decode_frame, encode_frame, pixel_to_normalized_homography, points_json, ErrorBody,
    InitTrackResponse, StatusResponse, TrackFrameResponse,
};
use crate::{BackendStatus, InitOutcome, TrackingBackend};

/// Talks to the service over HTTP with multipart uploads.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    /// Last reference-to-frame matrix the service reported, in object space.
    last: Mutex<Option<Homography>>,
}

impl HttpBackend {
    /// Build a client for the configured service URL.
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            last: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn last(&self) -> std::sync::MutexGuard<'_, Option<Homography>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Step from the previously reported frame to `cumulative`, which then
    /// becomes the previous one.
    fn delta_from_cumulative(&self, cumulative: Homography) -> BackendResult<Homography> {
        let mut last = self.last();
        let previous = last.ok_or_else(|| {
            BackendError::Protocol("Tracking frame before initialization".to_string())
        })?;
        let previous_inv = previous.inverse().ok_or_else(|| {
            BackendError::Protocol("Previous homography is singular".to_string())
        })?;
        let delta = (cumulative * previous_inv).normalized();
        *last = Some(cumulative);
        Ok(delta)
    }

    fn frame_part(frame: &RgbaImage) -> BackendResult<Part> {
        let png = encode_frame(frame)?;
        Ok(Part::bytes(png).file_name("frame.png").mime_str("image/png")?)
    }

    async fn post_form(&self, endpoint: &str, form: Form) -> BackendResult<reqwest::Response> {
        tracing::trace!(endpoint, "Backend request");
        let response = self
            .client
            .post(self.url(endpoint))
            .multipart(form)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Turn non-2xx responses into errors, keeping the service's detail text.
async fn check_status(response: reqwest::Response) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.detail)
        .unwrap_or(body);
    Err(BackendError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl TrackingBackend for HttpBackend {
    async fn initialize(
        &self,
        frame: &RgbaImage,
        mask_points: &[Point2D],
    ) -> BackendResult<InitOutcome> {
        *self.last() = None;
        let form = Form::new()
            .part("file", Self::frame_part(frame)?)
            .text("points_json", points_json(mask_points)?);
        let response: InitTrackResponse = self.post_form("init_track", form).await?.json().await?;

        let success = response.status == "success";
        if success {
            *self.last() = Some(Homography::IDENTITY);
        }
        tracing::debug!(
            status = %response.status,
            points = response.points_count,
            "Tracker initialized"
        );
        Ok(InitOutcome {
            success,
            points_count: response.points_count,
        })
    }

    async fn track(&self, frame: &RgbaImage) -> BackendResult<Homography> {
        let form = Form::new().part("file", Self::frame_part(frame)?);
        let response: TrackFrameResponse =
            self.post_form("track_frame", form).await?.json().await?;

        if let Some(error) = response.error {
            return Err(BackendError::Rejected(error));
        }
        let pixel = Homography::from_rows(response.homography);
        let cumulative = pixel_to_normalized_homography(&pixel, frame.width(), frame.height())?;
        self.delta_from_cumulative(cumulative)
    }

    async fn inpaint(
        &self,
        frame: &RgbaImage,
        mask_points: &[Point2D],
    ) -> BackendResult<RgbaImage> {
        let form = Form::new()
            .part("file", Self::frame_part(frame)?)
            .text("points_json", points_json(mask_points)?);
        let bytes = self.post_form("inpaint", form).await?.bytes().await?;

        let decoded = tokio::task::spawn_blocking(move || decode_frame(&bytes))
            .await
            .map_err(|e| BackendError::Protocol(format!("Decode task failed: {e}")))??;

        if decoded.dimensions() != frame.dimensions() {
            return Err(BackendError::Protocol(format!(
                "Inpainted frame is {:?}, expected {:?}",
                decoded.dimensions(),
                frame.dimensions()
            )));
        }
        Ok(decoded)
    }

    async fn status(&self) -> BackendResult<BackendStatus> {
        let response = self.client.get(self.url("status")).send().await?;
        let status: StatusResponse = check_status(response).await?.json().await?;
        Ok(BackendStatus {
            initialized: status.initialized,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
