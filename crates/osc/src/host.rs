//! Types exchanged with the host's on-screen-control contract.

use serde::{Deserialize, Serialize};

use gphyx_common::error::{GphyxError, GphyxResult};
use gphyx_mask_model::{Homography, PathHit, PathPart, Point2D};

/// Coordinate services the host provides to on-screen controls.
///
/// Object space is the normalized space of the mask (origin bottom-left,
/// y up). Canvas space is the view's pixel space.
pub trait CoordinateConverter: Send + Sync {
    fn object_to_canvas(&self, point: Point2D) -> Option<Point2D>;

    fn canvas_to_object(&self, point: Point2D) -> Option<Point2D>;

    /// Current view zoom (1.0 = 100%).
    fn zoom(&self) -> f64;

    /// Device pixels per canvas point.
    fn backing_scale(&self) -> f64;
}

/// Affine object→canvas transform measured from the converter.
pub fn object_to_canvas_transform(converter: &dyn CoordinateConverter) -> GphyxResult<Homography> {
    let map = |p: Point2D| {
        converter
            .object_to_canvas(p)
            .filter(Point2D::is_finite)
            .ok_or_else(|| GphyxError::geometry("Host could not convert object point to canvas"))
    };
    let origin = map(Point2D::new(0.0, 0.0))?;
    let ex = map(Point2D::new(1.0, 0.0))?;
    let ey = map(Point2D::new(0.0, 1.0))?;
    Ok(Homography::from_rows([
        [ex.x - origin.x, ey.x - origin.x, origin.x],
        [ex.y - origin.y, ey.y - origin.y, origin.y],
        [0.0, 0.0, 1.0],
    ]))
}

/// A canvas showing the whole frame at some zoom and pan.
///
/// Used by hosts that hand over raw view parameters instead of conversion
/// callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportConverter {
    /// Frame size in canvas points at 100% zoom.
    pub frame_width: f64,
    pub frame_height: f64,
    /// Canvas position of the frame's top-left corner.
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    pub backing_scale: f64,
}

impl ViewportConverter {
    pub fn new(frame_width: f64, frame_height: f64) -> Self {
        Self {
            frame_width,
            frame_height,
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
            backing_scale: 1.0,
        }
    }

    fn scale_x(&self) -> f64 {
        self.frame_width * self.zoom
    }

    fn scale_y(&self) -> f64 {
        self.frame_height * self.zoom
    }
}

impl CoordinateConverter for ViewportConverter {
    fn object_to_canvas(&self, p: Point2D) -> Option<Point2D> {
        Some(Point2D::new(
            self.pan_x + p.x * self.scale_x(),
            self.pan_y + (1.0 - p.y) * self.scale_y(),
        ))
    }

    fn canvas_to_object(&self, p: Point2D) -> Option<Point2D> {
        let (sx, sy) = (self.scale_x(), self.scale_y());
        if sx == 0.0 || sy == 0.0 {
            return None;
        }
        Some(Point2D::new(
            (p.x - self.pan_x) / sx,
            1.0 - (p.y - self.pan_y) / sy,
        ))
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn backing_scale(&self) -> f64 {
        self.backing_scale
    }
}

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
    pub command: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        option: false,
        command: false,
    };

    pub fn option() -> Self {
        Self {
            option: true,
            ..Self::NONE
        }
    }

    pub fn command() -> Self {
        Self {
            command: true,
            ..Self::NONE
        }
    }

    pub fn command_shift() -> Self {
        Self {
            command: true,
            shift: true,
            ..Self::NONE
        }
    }
}

/// Keys the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Char(char),
}

/// Output flags of an event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventResponse {
    /// The event was consumed by the editor.
    pub handled: bool,
    /// The overlay must be redrawn.
    pub force_redraw: bool,
}

impl EventResponse {
    pub const IGNORED: EventResponse = EventResponse {
        handled: false,
        force_redraw: false,
    };

    pub const REDRAW: EventResponse = EventResponse {
        handled: true,
        force_redraw: true,
    };

    pub fn handled(force_redraw: bool) -> Self {
        Self {
            handled: true,
            force_redraw,
        }
    }
}

/// Host "active part" index: `0` is nothing, otherwise
/// `1 + node · 3 + part` with part 0 anchor, 1 in-handle, 2 out-handle.
pub fn encode_active_part(hit: Option<PathHit>) -> u32 {
    match hit {
        None => 0,
        Some(hit) => 1 + (hit.index as u32) * 3 + hit.part.index() as u32,
    }
}

pub fn decode_active_part(active: u32) -> Option<PathHit> {
    let raw = active.checked_sub(1)? as usize;
    Some(PathHit {
        index: raw / 3,
        part: PathPart::from_index(raw % 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_part_encoding() {
        assert_eq!(encode_active_part(None), 0);
        assert_eq!(decode_active_part(0), None);

        let hit = PathHit {
            index: 4,
            part: PathPart::OutHandle,
        };
        assert_eq!(encode_active_part(Some(hit)), 15);
        assert_eq!(decode_active_part(15), Some(hit));
        assert_eq!(
            decode_active_part(1),
            Some(PathHit {
                index: 0,
                part: PathPart::Anchor
            })
        );
    }

    #[test]
    fn test_viewport_round_trip_and_transform() {
        let view = ViewportConverter {
            pan_x: 10.0,
            pan_y: 20.0,
            zoom: 2.0,
            ..ViewportConverter::new(100.0, 50.0)
        };
        let p = Point2D::new(0.25, 0.75);
        let canvas = view.object_to_canvas(p).unwrap();
        assert_eq!(canvas, Point2D::new(60.0, 45.0));
        assert_eq!(view.canvas_to_object(canvas).unwrap(), p);

        let h = object_to_canvas_transform(&view).unwrap();
        assert_eq!(h.apply(p).unwrap(), canvas);
    }
}
