//! Interactive bezier mask editor.
//!
//! Pointer and key events from the host are turned into [`PathModel`]
//! edits. After every committed change a fresh snapshot is published for
//! the render threads.
//!
//! Gestures:
//! - click on empty canvas: append a node and start dragging it
//! - click on a node or handle: select it, drag to move
//! - shift-click on a curve anchor: drag out its handles
//! - option-click: toggle curve/corner
//! - command-click on a handle: break or re-join the handles
//! - delete/backspace: remove the selected node
//! - command-z / shift-command-z: undo / redo

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gphyx_common::clock::FrameKey;
use gphyx_common::config::{EditorConfig, RenderConfig};
use gphyx_common::error::GphyxResult;
use gphyx_mask_model::{
    EditHistory, Homography, MaskDocument, PathHit, PathModel, PathPart, Point2D,
    SnapshotPublisher,
};
use gphyx_tracking::TrackingCache;

use crate::host::{
    decode_active_part, encode_active_part, object_to_canvas_transform, CoordinateConverter,
    EventResponse, Key, Modifiers,
};

/// One anchor marker in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorMarker {
    pub index: usize,
    pub position: Point2D,
    pub is_curve: bool,
    pub selected: bool,
    pub hovered: bool,
    pub active: bool,
}

/// A tangent handle drawn as a line from its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandleLine {
    pub index: usize,
    pub part: PathPart,
    pub anchor: Point2D,
    pub tip: Point2D,
    pub active: bool,
}

/// Everything the host needs to paint the overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayGeometry {
    /// Flattened closed outline (canvas space).
    pub outline: Vec<Point2D>,
    pub anchors: Vec<AnchorMarker>,
    pub handles: Vec<HandleLine>,
    /// Marker radius in canvas points.
    pub marker_radius: f64,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    hit: PathHit,
    // Pre-drag nodes are already in the history.
    recorded: bool,
}

/// The mask editor attached to one effect instance.
pub struct MaskEditor {
    path: PathModel,
    history: EditHistory,
    publisher: Arc<SnapshotPublisher>,
    tracking: Option<Arc<TrackingCache>>,
    frame: FrameKey,
    drag: Option<Drag>,
    flatness: f64,
    max_subdivision_depth: u32,
}

impl MaskEditor {
    pub fn new(editor: &EditorConfig, render: &RenderConfig, publisher: Arc<SnapshotPublisher>) -> Self {
        Self {
            path: PathModel::new(editor),
            history: EditHistory::new(editor.undo_depth),
            publisher,
            tracking: None,
            frame: FrameKey(0),
            drag: None,
            flatness: render.flatness,
            max_subdivision_depth: render.max_subdivision_depth,
        }
    }

    /// Draw and edit the mask in each frame's tracked position.
    pub fn with_tracking(mut self, cache: Arc<TrackingCache>) -> Self {
        self.tracking = Some(cache);
        self
    }

    pub fn path(&self) -> &PathModel {
        &self.path
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn frame(&self) -> FrameKey {
        self.frame
    }

    /// The frame currently shown in the viewer.
    pub fn set_frame(&mut self, frame: FrameKey) {
        self.frame = frame;
    }

    /// Alignment of the current frame, identity when untracked.
    pub fn alignment(&self) -> Homography {
        self.tracking
            .as_ref()
            .map_or(Homography::IDENTITY, |cache| cache.alignment_or_identity(self.frame))
    }

    /// Normalized reference space → canvas.
    pub fn screen_transform(&self, converter: &dyn CoordinateConverter) -> GphyxResult<Homography> {
        Ok(object_to_canvas_transform(converter)?.compose(&self.alignment()))
    }

    fn publish(&self) {
        self.publisher.publish(self.path.snapshot());
    }

    fn record(&mut self) {
        self.history.record(self.path.nodes());
    }

    /// Host hit-test: active part under the pointer, `0` for none.
    pub fn hit_test(&self, pointer: Point2D, converter: &dyn CoordinateConverter) -> u32 {
        match self.screen_transform(converter) {
            Ok(transform) => encode_active_part(self.path.hit_test(pointer, &transform)),
            Err(e) => {
                tracing::debug!(error = %e, "Hit-test without a usable transform");
                0
            }
        }
    }

    /// Overlay geometry for the current frame.
    pub fn draw(
        &self,
        converter: &dyn CoordinateConverter,
        active_part: u32,
    ) -> GphyxResult<OverlayGeometry> {
        let transform = self.screen_transform(converter)?;
        let active = decode_active_part(active_part);
        let selected = self.path.selected();
        let hover = self.path.hover_index();

        let outline = self
            .path
            .snapshot()
            .aligned_polygon(&transform, self.flatness, self.max_subdivision_depth);

        let mut geometry = OverlayGeometry {
            outline,
            marker_radius: self.path.hit_tolerance_px() * 0.5 * converter.backing_scale().max(1.0),
            ..OverlayGeometry::default()
        };

        for (index, node) in self.path.nodes().iter().enumerate() {
            let Some(position) = transform.apply(node.anchor) else {
                continue;
            };
            geometry.anchors.push(AnchorMarker {
                index,
                position,
                is_curve: node.is_curve,
                selected: selected.is_some_and(|s| s.index == index),
                hovered: hover == Some(index),
                active: active == Some(PathHit { index, part: PathPart::Anchor }),
            });

            if !node.is_curve {
                continue;
            }
            for part in [PathPart::InHandle, PathPart::OutHandle] {
                let tip = node.part_position(part);
                if tip == node.anchor {
                    continue;
                }
                if let Some(tip) = transform.apply(tip) {
                    geometry.handles.push(HandleLine {
                        index,
                        part,
                        anchor: position,
                        tip,
                        active: active == Some(PathHit { index, part }),
                    });
                }
            }
        }
        Ok(geometry)
    }

    /// Pointer moved without a button held.
    pub fn mouse_moved(&mut self, pointer: Point2D, converter: &dyn CoordinateConverter) -> EventResponse {
        let hover = decode_active_part(self.hit_test(pointer, converter)).map(|hit| hit.index);
        if hover == self.path.hover_index() {
            return EventResponse::IGNORED;
        }
        self.path.set_hover(hover);
        EventResponse::REDRAW
    }

    pub fn mouse_down(
        &mut self,
        pointer: Point2D,
        modifiers: Modifiers,
        converter: &dyn CoordinateConverter,
    ) -> GphyxResult<EventResponse> {
        let transform = self.screen_transform(converter)?;
        let hit = self.path.hit_test(pointer, &transform);

        match hit {
            Some(hit) if modifiers.option => {
                self.record();
                let is_curve = self.path.toggle_curve(hit.index)?;
                tracing::debug!(index = hit.index, is_curve, "Toggled curve");
                self.path.select(Some(PathHit { index: hit.index, part: PathPart::Anchor }));
                self.publish();
            }
            Some(hit) if modifiers.command && hit.part != PathPart::Anchor => {
                self.record();
                let broken = self.path.toggle_broken(hit.index)?;
                tracing::debug!(index = hit.index, broken, "Toggled handle link");
                self.path.select(Some(hit));
                self.publish();
            }
            Some(hit)
                if modifiers.shift
                    && hit.part == PathPart::Anchor
                    && self.path.node(hit.index).is_some_and(|n| n.is_curve) =>
            {
                self.path.select(Some(hit));
                let handle = PathHit { index: hit.index, part: PathPart::OutHandle };
                self.drag = Some(Drag { hit: handle, recorded: false });
            }
            Some(hit) => {
                self.path.select(Some(hit));
                self.drag = Some(Drag { hit, recorded: false });
            }
            None => {
                let before = self.path.nodes().to_vec();
                let index = self.path.add_node(pointer, &transform)?;
                self.history.record(&before);
                let hit = PathHit { index, part: PathPart::Anchor };
                self.path.select(Some(hit));
                self.drag = Some(Drag { hit, recorded: true });
                self.publish();
            }
        }
        Ok(EventResponse::REDRAW)
    }

    pub fn mouse_dragged(
        &mut self,
        pointer: Point2D,
        converter: &dyn CoordinateConverter,
    ) -> GphyxResult<EventResponse> {
        let Some(drag) = self.drag else {
            return Ok(EventResponse::IGNORED);
        };
        let transform = self.screen_transform(converter)?;
        let target = PathModel::screen_to_path(pointer, &transform)?;

        if !drag.recorded {
            self.record();
            self.drag = Some(Drag { recorded: true, ..drag });
        }
        match drag.hit.part {
            PathPart::Anchor => self.path.move_node(drag.hit.index, target)?,
            part => {
                let anchor = self
                    .path
                    .node(drag.hit.index)
                    .map(|n| n.anchor)
                    .unwrap_or(target);
                self.path.move_handle(drag.hit.index, part, target - anchor)?;
            }
        }
        self.publish();
        Ok(EventResponse::REDRAW)
    }

    pub fn mouse_up(&mut self) -> EventResponse {
        match self.drag.take() {
            Some(_) => EventResponse::REDRAW,
            None => EventResponse::IGNORED,
        }
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> GphyxResult<EventResponse> {
        match key {
            Key::Delete | Key::Backspace => {
                let Some(selected) = self.path.selected() else {
                    return Ok(EventResponse::IGNORED);
                };
                self.record();
                self.path.delete_node(selected.index)?;
                self.drag = None;
                self.publish();
                Ok(EventResponse::REDRAW)
            }
            Key::Escape => {
                let had_selection = self.path.selected().is_some();
                self.path.clear_selection();
                Ok(EventResponse::handled(had_selection))
            }
            Key::Char(c) if modifiers.command && c.eq_ignore_ascii_case(&'z') => {
                let changed = if modifiers.shift { self.redo()? } else { self.undo()? };
                Ok(EventResponse::handled(changed))
            }
            Key::Char(_) => Ok(EventResponse::IGNORED),
        }
    }

    pub fn undo(&mut self) -> GphyxResult<bool> {
        let changed = self.history.undo(&mut self.path)?;
        if changed {
            self.drag = None;
            self.publish();
        }
        Ok(changed)
    }

    pub fn redo(&mut self) -> GphyxResult<bool> {
        let changed = self.history.redo(&mut self.path)?;
        if changed {
            self.drag = None;
            self.publish();
        }
        Ok(changed)
    }

    /// Remove every node (undoable).
    pub fn clear(&mut self) {
        if self.path.is_empty() {
            return;
        }
        self.record();
        self.path.clear();
        self.drag = None;
        self.publish();
    }

    pub fn document(&self, instance_id: &str) -> MaskDocument {
        MaskDocument::from_path(instance_id, &self.path)
    }

    /// Replace the mask with a saved document. Starts a fresh history.
    pub fn load_document(&mut self, document: &MaskDocument) -> GphyxResult<()> {
        self.path.replace_nodes(document.control_points())?;
        self.history.clear();
        self.drag = None;
        self.publish();
        tracing::info!(
            instance = %document.instance_id,
            nodes = self.path.len(),
            "Mask loaded"
        );
        Ok(())
    }
}
