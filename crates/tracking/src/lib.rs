//! gPHYX Tracking
//!
//! Walks a clip from a reference frame, asks the backend for per-frame
//! motion, and accumulates it into alignments stored in a
//! [`TrackingCache`]. Render threads read the cache concurrently and fall
//! back to identity for frames that have no valid alignment.

pub mod analysis;
pub mod cache;
pub mod session;

pub use analysis::{ExecutionPreference, HostAnalyzer};
pub use cache::{AlignmentRecord, TrackingCache};
pub use session::{AnalysisState, FrameOutcome, FrameSource, TrackingSession, TrackingState};
