//! gPHYX Mask Model
//!
//! Defines the data contracts for the object-removal mask:
//! - **Geometry:** Normalized points/vectors and 3×3 homographies
//! - **Path:** The editable bezier mask and its hit-testing
//! - **Snapshots:** Immutable, versioned copies handed to render threads
//! - **History / Documents:** Undo stack and JSON persistence
//!
//! All anchor coordinates are normalized to `[0.0, 1.0]` in the host's
//! object space (origin bottom-left, y up) so they survive resolution and
//! proxy changes. Homographies act on that same normalized space.

pub mod bezier;
pub mod document;
pub mod geometry;
pub mod history;
pub mod homography;
pub mod path;
pub mod snapshot;

pub use document::MaskDocument;
pub use geometry::*;
pub use history::EditHistory;
pub use homography::Homography;
pub use path::*;
pub use snapshot::*;
