//! Immutable path snapshots and their handoff to render threads.
//!
//! The UI thread publishes a new [`PathSnapshot`] after every edit; render
//! threads load the latest `Arc` without touching the live [`PathModel`].
//!
//! [`PathModel`]: crate::path::PathModel

use std::sync::{Arc, PoisonError, RwLock};

use crate::bezier::CubicSegment;
use crate::geometry::Point2D;
use crate::homography::Homography;
use crate::path::ControlPoint;

/// A frozen copy of the mask geometry at one version.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSnapshot {
    version: u64,
    nodes: Arc<[ControlPoint]>,
}

impl PathSnapshot {
    pub fn new(version: u64, nodes: Vec<ControlPoint>) -> Self {
        Self {
            version,
            nodes: nodes.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn nodes(&self) -> &[ControlPoint] {
        &self.nodes
    }

    /// Whether the outline can enclose any area.
    pub fn encloses_area(&self) -> bool {
        self.nodes.len() >= 3
    }

    /// Segments of the closed outline, last node joining back to the first.
    ///
    /// A segment is curved when either end is a curve node; a corner end
    /// contributes its anchor as the control point.
    pub fn segments(&self) -> impl Iterator<Item = CubicSegment> + '_ {
        let n = self.nodes.len();
        let count = if n >= 2 { n } else { 0 };
        (0..count).map(move |i| {
            let a = &self.nodes[i];
            let b = &self.nodes[(i + 1) % n];
            if !a.is_curve && !b.is_curve {
                return CubicSegment::line(a.anchor, b.anchor);
            }
            let c1 = if a.is_curve { a.out_point() } else { a.anchor };
            let c2 = if b.is_curve { b.in_point() } else { b.anchor };
            CubicSegment::new(a.anchor, c1, c2, b.anchor)
        })
    }

    /// Flatten the closed outline into a polygon in normalized space.
    ///
    /// The first vertex is the first anchor; the closing edge is implicit.
    pub fn flatten(&self, tolerance: f64, max_depth: u32) -> Vec<Point2D> {
        let mut polygon = Vec::with_capacity(self.nodes.len() * 4);
        match self.nodes.len() {
            0 => return polygon,
            1 => {
                polygon.push(self.nodes[0].anchor);
                return polygon;
            }
            _ => {}
        }
        polygon.push(self.nodes[0].anchor);
        for segment in self.segments() {
            segment.flatten_into(tolerance, max_depth, &mut polygon);
        }
        // The last segment ends back on the first anchor.
        polygon.pop();
        polygon
    }

    /// Flattened outline moved into a frame's position by its alignment.
    ///
    /// Vertices mapped to infinity are dropped.
    pub fn aligned_polygon(
        &self,
        alignment: &Homography,
        tolerance: f64,
        max_depth: u32,
    ) -> Vec<Point2D> {
        self.flatten(tolerance, max_depth)
            .into_iter()
            .filter_map(|p| alignment.apply(p))
            .collect()
    }
}

impl Default for PathSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Copy-on-publish slot holding the latest snapshot.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    current: RwLock<Arc<PathSnapshot>>,
}

impl SnapshotPublisher {
    pub fn new(initial: PathSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Publish a snapshot. Older versions than the current one are ignored.
    ///
    /// Returns whether the snapshot was accepted.
    pub fn publish(&self, snapshot: PathSnapshot) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if snapshot.version < current.version {
            tracing::debug!(
                stale = snapshot.version,
                current = current.version,
                "Ignoring stale path snapshot"
            );
            return false;
        }
        *current = Arc::new(snapshot);
        true
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<PathSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.latest().version
    }
}
