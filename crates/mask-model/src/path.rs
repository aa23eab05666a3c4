//! The editable mask path.
//!
//! A [`PathModel`] is an ordered, implicitly closed list of bezier
//! [`ControlPoint`]s plus the transient selection/hover state of the
//! on-screen editor. It is owned by the UI thread; render threads only ever
//! see [`PathSnapshot`]s produced by [`PathModel::snapshot`].

use serde::{Deserialize, Serialize};

use gphyx_common::config::EditorConfig;
use gphyx_common::error::{GphyxError, GphyxResult};

use crate::geometry::{Point2D, Vector2D};
use crate::homography::Homography;
use crate::snapshot::PathSnapshot;

/// A bezier vertex of the mask outline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// Anchor position (normalized object space).
    pub anchor: Point2D,
    /// Incoming tangent, relative to the anchor.
    pub in_handle: Vector2D,
    /// Outgoing tangent, relative to the anchor.
    pub out_handle: Vector2D,
    /// `false` joins neighbours with straight lines, ignoring the handles.
    pub is_curve: bool,
    /// `true` lets the two handles move independently (cusp).
    pub handles_broken: bool,
}

impl ControlPoint {
    /// A smooth curve point with zero-length handles.
    pub fn new(anchor: Point2D) -> Self {
        Self {
            anchor,
            in_handle: Vector2D::ZERO,
            out_handle: Vector2D::ZERO,
            is_curve: true,
            handles_broken: false,
        }
    }

    /// A straight-line corner.
    pub fn corner(anchor: Point2D) -> Self {
        Self {
            is_curve: false,
            ..Self::new(anchor)
        }
    }

    pub fn in_point(&self) -> Point2D {
        self.anchor + self.in_handle
    }

    pub fn out_point(&self) -> Point2D {
        self.anchor + self.out_handle
    }

    /// Position of one part of this control point.
    pub fn part_position(&self, part: PathPart) -> Point2D {
        match part {
            PathPart::Anchor => self.anchor,
            PathPart::InHandle => self.in_point(),
            PathPart::OutHandle => self.out_point(),
        }
    }

    fn is_finite(&self) -> bool {
        self.anchor.is_finite() && self.in_handle.is_finite() && self.out_handle.is_finite()
    }
}

/// Which part of a control point is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPart {
    #[default]
    Anchor,
    InHandle,
    OutHandle,
}

impl PathPart {
    pub const ALL: [PathPart; 3] = [PathPart::Anchor, PathPart::InHandle, PathPart::OutHandle];

    pub fn index(self) -> usize {
        match self {
            PathPart::Anchor => 0,
            PathPart::InHandle => 1,
            PathPart::OutHandle => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Result of a hit-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathHit {
    pub index: usize,
    pub part: PathPart,
}

/// The live mask geometry plus editor state.
#[derive(Debug, Clone)]
pub struct PathModel {
    nodes: Vec<ControlPoint>,
    selected_index: Option<usize>,
    selected_part: PathPart,
    hover_index: Option<usize>,
    version: u64,
    hit_tolerance_px: f64,
    max_nodes: usize,
}

impl PathModel {
    /// Create an empty path using editor settings.
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            nodes: Vec::new(),
            selected_index: None,
            selected_part: PathPart::Anchor,
            hover_index: None,
            version: 0,
            hit_tolerance_px: config.hit_tolerance_px,
            max_nodes: config.max_nodes,
        }
    }

    /// Create a path pre-populated with nodes (e.g. from a saved document).
    pub fn with_nodes(config: &EditorConfig, nodes: Vec<ControlPoint>) -> GphyxResult<Self> {
        let mut model = Self::new(config);
        model.replace_nodes(nodes)?;
        Ok(model)
    }

    pub fn nodes(&self) -> &[ControlPoint] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&ControlPoint> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Geometry version; bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn hit_tolerance_px(&self) -> f64 {
        self.hit_tolerance_px
    }

    // Selection / hover

    pub fn selected(&self) -> Option<PathHit> {
        self.selected_index.map(|index| PathHit {
            index,
            part: self.selected_part,
        })
    }

    pub fn select(&mut self, hit: Option<PathHit>) {
        match hit {
            Some(hit) if hit.index < self.nodes.len() => {
                self.selected_index = Some(hit.index);
                self.selected_part = hit.part;
            }
            _ => self.clear_selection(),
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_index = None;
        self.selected_part = PathPart::Anchor;
    }

    pub fn hover_index(&self) -> Option<usize> {
        self.hover_index
    }

    pub fn set_hover(&mut self, index: Option<usize>) {
        self.hover_index = index.filter(|i| *i < self.nodes.len());
    }

    // Queries

    /// Find the control point part under a screen position.
    ///
    /// `transform` maps normalized path space to screen pixels (host
    /// object-to-screen conversion composed with the frame's alignment).
    /// Distances are measured in screen space so the tolerance does not
    /// change with zoom. Anchors win over handles; on equal distance the
    /// most recently added node wins.
    pub fn hit_test(&self, screen_point: Point2D, transform: &Homography) -> Option<PathHit> {
        let tolerance = self.hit_tolerance_px;

        let mut best: Option<(f64, PathHit)> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(screen) = transform.apply(node.anchor) else {
                continue;
            };
            let d = screen.distance_to(&screen_point);
            if d <= tolerance && best.map_or(true, |(bd, _)| d <= bd) {
                best = Some((
                    d,
                    PathHit {
                        index,
                        part: PathPart::Anchor,
                    },
                ));
            }
        }
        if let Some((_, hit)) = best {
            return Some(hit);
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if !node.is_curve {
                continue;
            }
            for (part, handle) in [
                (PathPart::InHandle, node.in_handle),
                (PathPart::OutHandle, node.out_handle),
            ] {
                if handle.is_zero() {
                    continue;
                }
                let Some(screen) = transform.apply(node.anchor + handle) else {
                    continue;
                };
                let d = screen.distance_to(&screen_point);
                if d <= tolerance && best.map_or(true, |(bd, _)| d <= bd) {
                    best = Some((d, PathHit { index, part }));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    /// Map a screen position back into normalized path space.
    pub fn screen_to_path(screen_point: Point2D, transform: &Homography) -> GphyxResult<Point2D> {
        let inverse = transform
            .inverse()
            .ok_or_else(|| GphyxError::geometry("Screen transform is not invertible"))?;
        inverse
            .apply(screen_point)
            .filter(Point2D::is_finite)
            .ok_or_else(|| GphyxError::geometry("Screen point maps to infinity"))
    }

    // Mutations

    /// Append a node under the given screen position.
    ///
    /// New nodes always go to the end of the sequence; they are not spliced
    /// into the nearest edge.
    pub fn add_node(&mut self, screen_point: Point2D, transform: &Homography) -> GphyxResult<usize> {
        let anchor = Self::screen_to_path(screen_point, transform)?;
        self.push_node(ControlPoint::new(anchor))
    }

    /// Append a control point given directly in normalized space.
    pub fn push_node(&mut self, node: ControlPoint) -> GphyxResult<usize> {
        if self.nodes.len() >= self.max_nodes {
            return Err(GphyxError::geometry(format!(
                "Mask already has the maximum of {} nodes",
                self.max_nodes
            )));
        }
        if !node.is_finite() {
            return Err(GphyxError::geometry("Control point is not finite"));
        }
        self.nodes.push(node);
        self.bump();
        tracing::debug!(index = self.nodes.len() - 1, "Mask node added");
        Ok(self.nodes.len() - 1)
    }

    /// Move an anchor (and its handles, which are relative) to a new position.
    pub fn move_node(&mut self, index: usize, to: Point2D) -> GphyxResult<()> {
        if !to.is_finite() {
            return Err(GphyxError::geometry("Target position is not finite"));
        }
        let node = self.node_mut(index)?;
        node.anchor = to;
        self.bump();
        Ok(())
    }

    /// Set one handle's offset. Smooth nodes mirror the opposite handle.
    pub fn move_handle(&mut self, index: usize, part: PathPart, offset: Vector2D) -> GphyxResult<()> {
        if !offset.is_finite() {
            return Err(GphyxError::geometry("Handle offset is not finite"));
        }
        let node = self.node_mut(index)?;
        match part {
            PathPart::Anchor => {
                return Err(GphyxError::geometry("Anchor is not a handle"));
            }
            PathPart::InHandle => {
                node.in_handle = offset;
                if !node.handles_broken {
                    node.out_handle = -offset;
                }
            }
            PathPart::OutHandle => {
                node.out_handle = offset;
                if !node.handles_broken {
                    node.in_handle = -offset;
                }
            }
        }
        self.bump();
        Ok(())
    }

    /// Switch a node between curve and straight-corner joins.
    pub fn toggle_curve(&mut self, index: usize) -> GphyxResult<bool> {
        let node = self.node_mut(index)?;
        node.is_curve = !node.is_curve;
        let is_curve = node.is_curve;
        self.bump();
        Ok(is_curve)
    }

    /// Switch a node between smooth (mirrored) and broken handles.
    ///
    /// Re-joining snaps the in-handle to mirror the out-handle.
    pub fn toggle_broken(&mut self, index: usize) -> GphyxResult<bool> {
        let node = self.node_mut(index)?;
        node.handles_broken = !node.handles_broken;
        if !node.handles_broken {
            node.in_handle = -node.out_handle;
        }
        let broken = node.handles_broken;
        self.bump();
        Ok(broken)
    }

    /// Remove a node. Selection and hover are cleared or shifted to keep
    /// pointing at the same node.
    pub fn delete_node(&mut self, index: usize) -> GphyxResult<ControlPoint> {
        if index >= self.nodes.len() {
            return Err(out_of_range(index, self.nodes.len()));
        }
        let removed = self.nodes.remove(index);

        match self.selected_index {
            Some(sel) if sel == index => self.clear_selection(),
            Some(sel) if sel > index => self.selected_index = Some(sel - 1),
            _ => {}
        }
        self.hover_index = match self.hover_index {
            Some(h) if h == index => None,
            Some(h) if h > index => Some(h - 1),
            other => other,
        };

        self.bump();
        tracing::debug!(index, "Mask node deleted");
        Ok(removed)
    }

    /// Remove every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.clear_selection();
        self.hover_index = None;
        self.bump();
    }

    /// Replace the node list wholesale (undo/redo, document load).
    pub fn replace_nodes(&mut self, nodes: Vec<ControlPoint>) -> GphyxResult<()> {
        if nodes.len() > self.max_nodes {
            return Err(GphyxError::geometry(format!(
                "{} nodes exceed the limit of {}",
                nodes.len(),
                self.max_nodes
            )));
        }
        if nodes.iter().any(|n| !n.is_finite()) {
            return Err(GphyxError::geometry("Control point is not finite"));
        }
        self.nodes = nodes;
        if self.selected_index.is_some_and(|i| i >= self.nodes.len()) {
            self.clear_selection();
        }
        if self.hover_index.is_some_and(|i| i >= self.nodes.len()) {
            self.hover_index = None;
        }
        self.bump();
        Ok(())
    }

    /// Immutable copy of the current geometry.
    pub fn snapshot(&self) -> PathSnapshot {
        PathSnapshot::new(self.version, self.nodes.clone())
    }

    fn node_mut(&mut self, index: usize) -> GphyxResult<&mut ControlPoint> {
        let len = self.nodes.len();
        self.nodes
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

fn out_of_range(index: usize, len: usize) -> GphyxError {
    GphyxError::geometry(format!("Node index {index} out of range (len {len})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Normalized → 1000×1000 screen, y flipped.
    fn screen() -> Homography {
        Homography::from_rows([[1000.0, 0.0, 0.0], [0.0, -1000.0, 1000.0], [0.0, 0.0, 1.0]])
    }

    fn model() -> PathModel {
        PathModel::new(&EditorConfig::default())
    }

    #[test]
    fn test_add_node_maps_through_inverse() {
        let mut path = model();
        let index = path.add_node(Point2D::new(250.0, 750.0), &screen()).unwrap();
        assert_eq!(index, 0);
        let node = path.node(0).unwrap();
        assert!((node.anchor.x - 0.25).abs() < 1e-12);
        assert!((node.anchor.y - 0.25).abs() < 1e-12);
        assert!(node.is_curve);
        assert!(node.in_handle.is_zero() && node.out_handle.is_zero());
    }

    #[test]
    fn test_add_node_with_singular_transform_is_refused() {
        let mut path = model();
        let err = path
            .add_node(Point2D::new(1.0, 1.0), &Homography::scale(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, GphyxError::Geometry { .. }));
        assert!(path.is_empty());
        assert_eq!(path.version(), 0);
    }

    #[test]
    fn test_hit_test_prefers_anchor_over_handle() {
        let mut path = model();
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();
        path.push_node(ControlPoint::new(Point2D::new(0.503, 0.5))).unwrap();
        // Node 0's out handle lands right under the cursor; node 1's anchor is 3px away.
        path.move_handle(0, PathPart::OutHandle, Vector2D::new(0.006, 0.0))
            .unwrap();

        let hit = path.hit_test(Point2D::new(506.0, 500.0), &screen()).unwrap();
        assert_eq!(
            hit,
            PathHit {
                index: 1,
                part: PathPart::Anchor
            }
        );
    }

    #[test]
    fn test_hit_test_tie_goes_to_latest_node() {
        let mut path = model();
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();
        let hit = path.hit_test(Point2D::new(500.0, 500.0), &screen()).unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn test_hit_test_tolerance_is_in_screen_pixels() {
        let mut path = model();
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();

        // 7px away at 1x zoom hits; at 4x zoom the same normalized offset is 28px.
        assert!(path.hit_test(Point2D::new(507.0, 500.0), &screen()).is_some());
        let zoomed = Homography::scale(4.0, 4.0) * screen();
        assert!(path.hit_test(Point2D::new(2028.0, 2000.0), &zoomed).is_none());
        assert!(path.hit_test(Point2D::new(2007.0, 2000.0), &zoomed).is_some());
    }

    #[test]
    fn test_hit_test_ignores_handles_of_corner_nodes() {
        let mut path = model();
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();
        path.move_handle(0, PathPart::OutHandle, Vector2D::new(0.1, 0.0))
            .unwrap();
        assert!(path.hit_test(Point2D::new(600.0, 500.0), &screen()).is_some());
        path.toggle_curve(0).unwrap();
        assert!(path.hit_test(Point2D::new(600.0, 500.0), &screen()).is_none());
    }

    #[test]
    fn test_smooth_handles_mirror_and_broken_do_not() {
        let mut path = model();
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();
        path.move_handle(0, PathPart::OutHandle, Vector2D::new(0.125, 0.25))
            .unwrap();
        assert_eq!(path.node(0).unwrap().in_handle, Vector2D::new(-0.125, -0.25));

        assert!(path.toggle_broken(0).unwrap());
        path.move_handle(0, PathPart::InHandle, Vector2D::new(0.0, 0.5))
            .unwrap();
        assert_eq!(path.node(0).unwrap().out_handle, Vector2D::new(0.125, 0.25));

        // Re-joining snaps the in handle back to mirror the out handle.
        assert!(!path.toggle_broken(0).unwrap());
        assert_eq!(path.node(0).unwrap().in_handle, Vector2D::new(-0.125, -0.25));
    }

    #[test]
    fn test_delete_selected_clears_selection() {
        let mut path = model();
        for x in [0.1, 0.2, 0.3] {
            path.push_node(ControlPoint::new(Point2D::new(x, 0.5))).unwrap();
        }
        path.select(Some(PathHit {
            index: 1,
            part: PathPart::Anchor,
        }));
        path.delete_node(1).unwrap();
        assert!(path.selected().is_none());
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_delete_before_selection_shifts_it() {
        let mut path = model();
        for x in [0.1, 0.2, 0.3] {
            path.push_node(ControlPoint::new(Point2D::new(x, 0.5))).unwrap();
        }
        path.select(Some(PathHit {
            index: 2,
            part: PathPart::OutHandle,
        }));
        path.delete_node(0).unwrap();
        assert_eq!(
            path.selected(),
            Some(PathHit {
                index: 1,
                part: PathPart::OutHandle
            })
        );
    }

    #[test]
    fn test_invalid_mutations_are_refused() {
        let mut path = model();
        assert!(path.move_node(0, Point2D::new(0.5, 0.5)).is_err());
        assert!(path.delete_node(3).is_err());
        path.push_node(ControlPoint::new(Point2D::new(0.5, 0.5))).unwrap();
        assert!(path.move_node(0, Point2D::new(f64::NAN, 0.5)).is_err());
        assert!(path
            .move_handle(0, PathPart::Anchor, Vector2D::new(0.1, 0.1))
            .is_err());
        assert_eq!(path.version(), 1);
    }

    #[test]
    fn test_node_limit() {
        let config = EditorConfig {
            max_nodes: 2,
            ..EditorConfig::default()
        };
        let mut path = PathModel::new(&config);
        path.push_node(ControlPoint::new(Point2D::new(0.1, 0.1))).unwrap();
        path.push_node(ControlPoint::new(Point2D::new(0.2, 0.2))).unwrap();
        assert!(path.push_node(ControlPoint::new(Point2D::new(0.3, 0.3))).is_err());
    }

    #[test]
    fn test_every_mutation_bumps_version() {
        let mut path = model();
        path.push_node(ControlPoint::new(Point2D::new(0.1, 0.1))).unwrap();
        path.move_node(0, Point2D::new(0.2, 0.2)).unwrap();
        path.toggle_curve(0).unwrap();
        path.toggle_broken(0).unwrap();
        path.move_handle(0, PathPart::InHandle, Vector2D::new(0.1, 0.0))
            .unwrap();
        path.delete_node(0).unwrap();
        path.clear();
        assert_eq!(path.version(), 7);
        assert_eq!(path.snapshot().version(), 7);
    }
}
