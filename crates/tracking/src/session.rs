//! Frame analysis state machine.
//!
//! ```text
//!            start()                 init ok, points > 0
//!   Idle ─────────────▶ Initializing ─────────────────────▶ TrackingForward/Backward
//!     ▲                      │ init failed / 0 points          │        │
//!     │                      ▼                                 │        │ finish()
//!     │                    Failed                              │        ▼
//!     │                                   failures ≥ threshold │    Completed
//!     │                                   or cancel()          ▼
//!     └──────── start() from any end state ─────────────── Interrupted
//! ```
//!
//! `reseed()` re-initializes at the reference from an end state and walks
//! the other way without clearing the cache.
//!
//! Every `start()`, `reseed()` and `cancel()` bumps an epoch. Backend replies are
//! applied only if the epoch they were issued under is still current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use gphyx_backend::{BackendResult, InitOutcome, TrackingBackend};
use gphyx_common::clock::{Direction, FrameKey, FrameRange};
use gphyx_common::config::TrackingConfig;
use gphyx_common::error::{GphyxError, GphyxResult};
use gphyx_mask_model::{Homography, Point2D};

use crate::cache::{AlignmentRecord, TrackingCache};

/// State of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    /// No analysis requested yet.
    Idle,
    /// Waiting for the backend to accept the reference frame.
    Initializing,
    TrackingForward,
    TrackingBackward,
    /// The requested range was exhausted.
    Completed,
    /// Cancelled, or too many consecutive frame failures.
    Interrupted,
    /// The backend refused the reference frame.
    Failed,
}

impl TrackingState {
    pub fn is_tracking(self) -> bool {
        matches!(self, Self::TrackingForward | Self::TrackingBackward)
    }

    /// Walk direction while tracking.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::TrackingForward => Some(Direction::Forward),
            Self::TrackingBackward => Some(Direction::Backward),
            _ => None,
        }
    }

    fn tracking(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Self::TrackingForward,
            Direction::Backward => Self::TrackingBackward,
        }
    }
}

/// Analysis state as published to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisState {
    NotAnalyzing,
    Requested,
    Started,
    Completed,
    Interrupted,
}

impl From<TrackingState> for AnalysisState {
    fn from(state: TrackingState) -> Self {
        match state {
            TrackingState::Idle => Self::NotAnalyzing,
            TrackingState::Initializing => Self::Requested,
            TrackingState::TrackingForward | TrackingState::TrackingBackward => Self::Started,
            TrackingState::Completed => Self::Completed,
            TrackingState::Interrupted | TrackingState::Failed => Self::Interrupted,
        }
    }
}

/// What happened to one analyzed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A valid alignment was recorded.
    Tracked(Homography),
    /// The frame was recorded as invalid.
    Failed {
        consecutive: u32,
        interrupted: bool,
    },
    /// The session was cancelled or restarted while the call was in flight.
    Discarded,
}

/// Supplies decoded frames to [`TrackingSession::run`].
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn frame(&self, key: FrameKey) -> GphyxResult<RgbaImage>;
}

struct SessionInner {
    state: TrackingState,
    reference: Option<FrameKey>,
    reference_frame: Option<Arc<RgbaImage>>,
    mask: Vec<Point2D>,
    direction: Option<Direction>,
    running: Homography,
    consecutive_failures: u32,
}

impl Default for SessionInner {
    fn default() -> Self {
        Self {
            state: TrackingState::Idle,
            reference: None,
            reference_frame: None,
            mask: Vec::new(),
            direction: None,
            running: Homography::IDENTITY,
            consecutive_failures: 0,
        }
    }
}

/// Drives analysis over a clip and fills the [`TrackingCache`].
pub struct TrackingSession {
    backend: Arc<dyn TrackingBackend>,
    cache: Arc<TrackingCache>,
    config: TrackingConfig,
    epoch: AtomicU64,
    inner: Mutex<SessionInner>,
    // Held across each `track` call so only one is in flight.
    track_gate: tokio::sync::Mutex<()>,
}

impl TrackingSession {
    pub fn new(
        backend: Arc<dyn TrackingBackend>,
        cache: Arc<TrackingCache>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            config,
            epoch: AtomicU64::new(0),
            inner: Mutex::new(SessionInner::default()),
            track_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TrackingState {
        self.lock().state
    }

    pub fn analysis_state(&self) -> AnalysisState {
        self.state().into()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &Arc<TrackingCache> {
        &self.cache
    }

    pub fn reference(&self) -> Option<FrameKey> {
        self.lock().reference
    }

    pub fn reference_frame(&self) -> Option<Arc<RgbaImage>> {
        self.lock().reference_frame.clone()
    }

    /// Mask polygon sent to the backend at initialization.
    pub fn mask(&self) -> Vec<Point2D> {
        self.lock().mask.clone()
    }

    /// Cumulative alignment of the last tracked frame.
    pub fn running(&self) -> Homography {
        self.lock().running
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Begin a new analysis pass from `reference`.
    ///
    /// Clears the cache and re-initializes the backend. A start while a
    /// previous pass is still running supersedes it.
    pub async fn start(
        &self,
        direction: Direction,
        reference: FrameKey,
        frame: RgbaImage,
        mask: Vec<Point2D>,
    ) -> GphyxResult<TrackingState> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = Arc::new(frame);
        {
            let mut inner = self.lock();
            if inner.state.is_tracking() || inner.state == TrackingState::Initializing {
                tracing::debug!(previous = ?inner.state, "Superseding active analysis");
            }
            self.cache.clear();
            *inner = SessionInner {
                state: TrackingState::Initializing,
                reference: Some(reference),
                reference_frame: Some(frame.clone()),
                mask: mask.clone(),
                direction: Some(direction),
                ..SessionInner::default()
            };
        }

        if mask.len() < 3 {
            self.lock().state = TrackingState::Failed;
            return Err(GphyxError::geometry(format!(
                "Mask needs at least 3 points to track, got {}",
                mask.len()
            )));
        }

        tracing::info!(
            backend = self.backend.name(),
            %reference,
            ?direction,
            epoch,
            points = mask.len(),
            "Initializing tracker"
        );
        let result = self.backend.initialize(&frame, &mask).await;
        Ok(self.apply_initialization(epoch, reference, direction, result))
    }

    /// Re-seed the tracker at the reference frame and walk in `direction`,
    /// keeping the frames already in the cache.
    ///
    /// The running alignment restarts from identity.
    pub async fn reseed(&self, direction: Direction) -> GphyxResult<TrackingState> {
        let (epoch, reference, frame, mask) = {
            let mut inner = self.lock();
            let (Some(reference), Some(frame)) = (inner.reference, inner.reference_frame.clone())
            else {
                return Err(GphyxError::tracking("No reference frame to re-seed from"));
            };
            if inner.mask.len() < 3 {
                return Err(GphyxError::geometry(format!(
                    "Mask needs at least 3 points to track, got {}",
                    inner.mask.len()
                )));
            }
            let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            inner.state = TrackingState::Initializing;
            inner.direction = Some(direction);
            inner.running = Homography::IDENTITY;
            inner.consecutive_failures = 0;
            (epoch, reference, frame, inner.mask.clone())
        };

        tracing::info!(%reference, ?direction, epoch, "Re-seeding tracker at reference");
        let result = self.backend.initialize(&frame, &mask).await;
        Ok(self.apply_initialization(epoch, reference, direction, result))
    }

    fn apply_initialization(
        &self,
        epoch: u64,
        reference: FrameKey,
        direction: Direction,
        result: BackendResult<InitOutcome>,
    ) -> TrackingState {
        let mut inner = self.lock();
        if self.epoch() != epoch {
            tracing::debug!(epoch, "Discarding stale initialization result");
            return inner.state;
        }
        match result {
            Ok(outcome) if outcome.success && outcome.points_count > 0 => {
                self.cache.insert(AlignmentRecord::reference(reference));
                inner.state = TrackingState::tracking(direction);
                tracing::info!(points = outcome.points_count, "Tracker initialized");
            }
            Ok(outcome) => {
                inner.state = TrackingState::Failed;
                tracing::warn!(
                    success = outcome.success,
                    points = outcome.points_count,
                    "Tracker found nothing to follow"
                );
            }
            Err(e) => {
                inner.state = TrackingState::Failed;
                tracing::warn!(error = %e, "Tracker initialization failed");
            }
        }
        inner.state
    }

    /// Track one frame and record its alignment.
    ///
    /// Frames must be submitted in walk order; concurrent callers are
    /// serialized.
    pub async fn analyze_frame(&self, key: FrameKey, frame: &RgbaImage) -> GphyxResult<FrameOutcome> {
        let _gate = self.track_gate.lock().await;
        let epoch = self.epoch();

        let state = self.state();
        if !state.is_tracking() {
            return Err(GphyxError::tracking(format!(
                "Cannot analyze frame {key} while {state:?}"
            )));
        }

        let result = self.backend.track(frame).await;

        let mut inner = self.lock();
        if self.epoch() != epoch {
            tracing::debug!(%key, epoch, "Discarding stale track result");
            return Ok(FrameOutcome::Discarded);
        }
        let delta = result.map_err(|e| e.to_string()).and_then(|delta| {
            if delta.is_finite() && delta.inverse().is_some() {
                Ok(delta)
            } else {
                Err("degenerate homography".to_string())
            }
        });

        match delta {
            Ok(delta) => {
                let running = delta.compose(&inner.running).normalized();
                inner.running = running;
                inner.consecutive_failures = 0;
                self.cache.insert(AlignmentRecord::tracked(key, running));
                tracing::trace!(%key, "Frame tracked");
                Ok(FrameOutcome::Tracked(running))
            }
            Err(error) => {
                inner.consecutive_failures += 1;
                let consecutive = inner.consecutive_failures;
                self.cache
                    .insert(AlignmentRecord::failed(key, inner.running, error.clone()));

                let interrupted = consecutive >= self.config.max_consecutive_failures;
                if interrupted {
                    inner.state = TrackingState::Interrupted;
                    tracing::warn!(%key, consecutive, %error, "Too many tracking failures, interrupting");
                } else {
                    tracing::warn!(%key, consecutive, %error, "Frame failed to track");
                }
                Ok(FrameOutcome::Failed {
                    consecutive,
                    interrupted,
                })
            }
        }
    }

    /// Stop the current pass. Cached results are kept.
    pub fn cancel(&self) -> TrackingState {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = TrackingState::Interrupted;
        tracing::info!(?previous, "Analysis cancelled");
        previous
    }

    /// Mark the pass complete once the range is exhausted.
    pub fn finish(&self) -> TrackingState {
        let mut inner = self.lock();
        if inner.state.is_tracking() {
            inner.state = TrackingState::Completed;
            tracing::info!(frames = self.cache.len(), "Analysis completed");
        }
        inner.state
    }

    /// Pull frames from `source` in the session's direction until `range`
    /// ends or the pass is cancelled or interrupted.
    pub async fn run(&self, source: &dyn FrameSource, range: FrameRange) -> GphyxResult<TrackingState> {
        let epoch = self.epoch();
        let (direction, reference) = {
            let inner = self.lock();
            match (inner.state.direction(), inner.reference) {
                (Some(direction), Some(reference)) => (direction, reference),
                _ => {
                    return Err(GphyxError::tracking(format!(
                        "Cannot run analysis while {:?}",
                        inner.state
                    )))
                }
            }
        };

        for key in range.walk_from(reference, direction) {
            if self.epoch() != epoch {
                break;
            }
            let frame = match source.frame(key).await {
                Ok(frame) => frame,
                Err(e) => {
                    let mut inner = self.lock();
                    if self.epoch() == epoch && inner.state.is_tracking() {
                        inner.state = TrackingState::Interrupted;
                        tracing::warn!(%key, error = %e, "Frame unavailable, interrupting analysis");
                    }
                    return Err(e);
                }
            };
            match self.analyze_frame(key, &frame).await? {
                FrameOutcome::Failed {
                    interrupted: true, ..
                }
                | FrameOutcome::Discarded => break,
                _ => {}
            }
        }

        if self.epoch() == epoch {
            Ok(self.finish())
        } else {
            Ok(self.state())
        }
    }

    /// Walk away from the reference in the session's direction, then
    /// re-seed at the reference and walk the other way.
    ///
    /// A cancel during the first leg skips the second. An interruption by
    /// tracking failures does not.
    pub async fn run_both(
        &self,
        source: &dyn FrameSource,
        range: FrameRange,
    ) -> GphyxResult<TrackingState> {
        let epoch = self.epoch();
        let first = self.run(source, range).await?;
        if self.epoch() != epoch {
            return Ok(first);
        }

        let direction = self
            .lock()
            .direction
            .ok_or_else(|| GphyxError::tracking("No direction for the first leg"))?;
        tracing::info!(first = ?first, "First leg done, tracking {:?}", direction.reversed());

        let state = self.reseed(direction.reversed()).await?;
        if !state.is_tracking() {
            return Ok(state);
        }
        self.run(source, range).await
    }
}
