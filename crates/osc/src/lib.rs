//! gPHYX On-Screen Control
//!
//! The bezier mask editor drawn over the host's viewer. The host forwards
//! draw, hit-test, pointer and key events; the editor mutates the
//! [`PathModel`](gphyx_mask_model::PathModel) and publishes snapshots for
//! rendering.

pub mod editor;
pub mod host;

pub use editor::{AnchorMarker, HandleLine, MaskEditor, OverlayGeometry};
pub use host::{
    decode_active_part, encode_active_part, CoordinateConverter, EventResponse, Key, Modifiers,
    ViewportConverter,
};
