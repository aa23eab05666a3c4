//! Per-frame alignment store shared between analysis and rendering.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use gphyx_common::clock::FrameKey;
use gphyx_common::error::{GphyxError, GphyxResult};
use gphyx_mask_model::Homography;

/// Alignment of one frame relative to the reference frame.
///
/// `matrix` maps reference coordinates to this frame's coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub frame: FrameKey,
    pub matrix: Homography,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AlignmentRecord {
    /// The reference frame itself.
    pub fn reference(frame: FrameKey) -> Self {
        Self {
            frame,
            matrix: Homography::IDENTITY,
            valid: true,
            error: None,
        }
    }

    pub fn tracked(frame: FrameKey, matrix: Homography) -> Self {
        Self {
            frame,
            matrix,
            valid: true,
            error: None,
        }
    }

    /// A frame the tracker could not align. `last_good` is kept for
    /// inspection only; readers treat invalid records as untracked.
    pub fn failed(frame: FrameKey, last_good: Homography, error: impl Into<String>) -> Self {
        Self {
            frame,
            matrix: last_good,
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Thread-safe map of frame → alignment.
///
/// Many render threads read while the tracking session writes. Locks are
/// held only for the map operation itself.
#[derive(Debug, Default)]
pub struct TrackingCache {
    records: RwLock<HashMap<FrameKey, AlignmentRecord>>,
}

impl TrackingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its frame.
    pub fn insert(&self, record: AlignmentRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.frame, record);
    }

    pub fn get(&self, frame: FrameKey) -> Option<AlignmentRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&frame)
            .cloned()
    }

    /// Alignment to render with: the tracked matrix, or identity when the
    /// frame is missing or invalid.
    pub fn alignment_or_identity(&self, frame: FrameKey) -> Homography {
        match self.get(frame) {
            Some(record) if record.valid => record.matrix,
            _ => Homography::IDENTITY,
        }
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn valid_count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.valid)
            .count()
    }

    /// All records ordered by frame.
    pub fn records(&self) -> Vec<AlignmentRecord> {
        let mut out: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        out.sort_by_key(|r| r.frame);
        out
    }

    /// Write all records to a JSON file.
    pub fn export(&self, path: &Path) -> GphyxResult<()> {
        let records = self.records();
        let json = serde_json::to_string_pretty(&records)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), count = records.len(), "Exported alignments");
        Ok(())
    }

    /// Load records previously written by [`export`](Self::export).
    pub fn import(path: &Path) -> GphyxResult<Self> {
        if !path.exists() {
            return Err(GphyxError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let records: Vec<AlignmentRecord> = serde_json::from_str(&content)?;
        let cache = Self::new();
        for record in records {
            if !record.matrix.is_finite() {
                return Err(GphyxError::tracking(format!(
                    "Non-finite alignment for frame {}",
                    record.frame
                )));
            }
            cache.insert(record);
        }
        Ok(cache)
    }
}
