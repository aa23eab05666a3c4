//! JSON persistence for masks.
//!
//! Documents carry the full control-point list. Files written by the
//! standalone point editor only had a `points` array of `{x, y}` values in
//! top-left normalized canvas space; those are still accepted and loaded as
//! straight corners.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gphyx_common::error::{GphyxError, GphyxResult};

use crate::geometry::Point2D;
use crate::path::{ControlPoint, PathModel};

/// A saved mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskDocument {
    /// Effect instance the mask belongs to.
    #[serde(alias = "instanceID")]
    pub instance_id: String,

    /// When the document was written.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,

    /// Bezier control points (object space, y up).
    #[serde(default)]
    pub nodes: Vec<ControlPoint>,

    /// Plain polygon points from older editors (canvas space, y down).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point2D>,
}

impl MaskDocument {
    /// Capture the current geometry of a path.
    pub fn from_path(instance_id: impl Into<String>, path: &PathModel) -> Self {
        Self {
            instance_id: instance_id.into(),
            saved_at: Some(Utc::now()),
            nodes: path.nodes().to_vec(),
            points: Vec::new(),
        }
    }

    /// Conventional location of an instance's mask file.
    pub fn default_path(instance_id: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gPHYX_mask_{instance_id}.json"))
    }

    /// Control points described by this document, converting legacy points.
    pub fn control_points(&self) -> Vec<ControlPoint> {
        if !self.nodes.is_empty() {
            return self.nodes.clone();
        }
        self.points
            .iter()
            .map(|p| ControlPoint::corner(Point2D::new(p.x, 1.0 - p.y)))
            .collect()
    }

    pub fn load(path: &Path) -> GphyxResult<Self> {
        if !path.exists() {
            return Err(GphyxError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> GphyxResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), nodes = self.nodes.len(), "Mask saved");
        Ok(())
    }
}
