//! Adapter between the host's analysis callbacks and [`TrackingSession`].
//!
//! The host asks for a desired range, calls `setup` once, `analyze` once
//! per frame in walk order, and `cleanup` at the end. An error from
//! `analyze` makes the host abandon the remaining frames.

use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use gphyx_common::clock::{Direction, FrameKey, FrameRange, FrameRate};
use gphyx_common::config::RenderConfig;
use gphyx_common::error::{GphyxError, GphyxResult};
use gphyx_mask_model::PathSnapshot;

use crate::session::{AnalysisState, FrameOutcome, TrackingSession, TrackingState};

/// Where the host would like analysis to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionPreference {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, Copy)]
struct Request {
    direction: Direction,
    preference: ExecutionPreference,
    set_up: bool,
}

/// Host-facing analysis entry points for one effect instance.
pub struct HostAnalyzer {
    session: Arc<TrackingSession>,
    clip: FrameRange,
    reference: FrameKey,
    flatness: f64,
    max_subdivision_depth: u32,
    request: Mutex<Option<Request>>,
}

impl HostAnalyzer {
    pub fn new(
        session: Arc<TrackingSession>,
        clip: FrameRange,
        reference: FrameKey,
        render: &RenderConfig,
    ) -> Self {
        Self {
            session,
            clip,
            reference,
            flatness: render.flatness,
            max_subdivision_depth: render.max_subdivision_depth,
            request: Mutex::new(None),
        }
    }

    /// Build from host times: clip start/duration and the reference time.
    pub fn from_host_times(
        session: Arc<TrackingSession>,
        rate: &FrameRate,
        start_secs: f64,
        duration_secs: f64,
        reference_secs: f64,
        render: &RenderConfig,
    ) -> Self {
        let clip = FrameRange::from_secs(rate, start_secs, duration_secs);
        Self::new(session, clip, rate.key_at(reference_secs), render)
    }

    pub fn session(&self) -> &Arc<TrackingSession> {
        &self.session
    }

    pub fn reference(&self) -> FrameKey {
        self.reference
    }

    pub fn start_forward(&self, preference: ExecutionPreference) {
        self.request_analysis(Direction::Forward, preference);
    }

    pub fn start_backward(&self, preference: ExecutionPreference) {
        self.request_analysis(Direction::Backward, preference);
    }

    fn request_analysis(&self, direction: Direction, preference: ExecutionPreference) {
        tracing::info!(?direction, ?preference, reference = %self.reference, "Analysis requested");
        *self.request.lock().unwrap_or_else(PoisonError::into_inner) = Some(Request {
            direction,
            preference,
            set_up: false,
        });
    }

    fn pending(&self) -> Option<Request> {
        *self.request.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execution_preference(&self) -> Option<ExecutionPreference> {
        self.pending().map(|r| r.preference)
    }

    /// Frames the host should feed to `analyze`, from the reference toward
    /// the clip end in the requested direction.
    pub fn desired_range(&self) -> Option<FrameRange> {
        let request = self.pending()?;
        let reference = self.reference.max(self.clip.first).min(self.clip.last);
        Some(match request.direction {
            Direction::Forward => FrameRange::new(reference, self.clip.last),
            Direction::Backward => FrameRange::new(self.clip.first, reference),
        })
    }

    /// Seed the tracker with the reference frame and the current mask.
    pub async fn setup(&self, reference_frame: RgbaImage, mask: &PathSnapshot) -> GphyxResult<()> {
        let request = {
            let mut pending = self.request.lock().unwrap_or_else(PoisonError::into_inner);
            let request = pending
                .as_mut()
                .ok_or_else(|| GphyxError::tracking("Analysis setup without a request"))?;
            request.set_up = true;
            *request
        };
        let polygon = mask.flatten(self.flatness, self.max_subdivision_depth);

        let state = self
            .session
            .start(request.direction, self.reference, reference_frame, polygon)
            .await?;
        if state.is_tracking() {
            Ok(())
        } else {
            Err(GphyxError::tracking(format!(
                "Tracker could not start ({state:?})"
            )))
        }
    }

    /// Analyze one frame. The reference frame itself is skipped.
    pub async fn analyze(&self, key: FrameKey, frame: &RgbaImage) -> GphyxResult<()> {
        if key == self.reference {
            return Ok(());
        }
        match self.session.analyze_frame(key, frame).await? {
            FrameOutcome::Tracked(_)
            | FrameOutcome::Failed {
                interrupted: false, ..
            } => Ok(()),
            FrameOutcome::Failed {
                interrupted: true,
                consecutive,
            } => Err(GphyxError::tracking(format!(
                "Analysis interrupted after {consecutive} failed frames"
            ))),
            FrameOutcome::Discarded => Err(GphyxError::tracking("Analysis was cancelled")),
        }
    }

    /// End of the host pass. Completes the session if it is still tracking.
    pub fn cleanup(&self) -> TrackingState {
        self.request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.session.finish()
    }

    /// Cancel from the host UI.
    pub fn stop(&self) -> TrackingState {
        self.request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.session.cancel();
        self.session.state()
    }

    /// Published analysis state.
    pub fn state(&self) -> AnalysisState {
        match self.pending() {
            Some(request) if !request.set_up => AnalysisState::Requested,
            _ => self.session.state().into(),
        }
    }
}
