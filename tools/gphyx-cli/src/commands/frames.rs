//! Image-sequence frame source.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use image::RgbaImage;

use gphyx_common::clock::{FrameKey, FrameRange};
use gphyx_common::error::{GphyxError, GphyxResult};
use gphyx_tracking::FrameSource;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// PNG/JPEG files of a directory, sorted by name. Frame `n` is the n-th file.
pub struct FrameSequence {
    paths: Vec<PathBuf>,
}

impl FrameSequence {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read frame directory {}", dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            anyhow::bail!("No PNG or JPEG frames in {}", dir.display());
        }
        tracing::debug!(dir = %dir.display(), frames = paths.len(), "Opened frame sequence");
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Every frame of the sequence.
    pub fn range(&self) -> FrameRange {
        FrameRange::new(FrameKey(0), FrameKey(self.paths.len() as i64 - 1))
    }

    pub fn path(&self, key: FrameKey) -> Option<&Path> {
        usize::try_from(key.index())
            .ok()
            .and_then(|i| self.paths.get(i))
            .map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameKey, &Path)> {
        self.paths
            .iter()
            .enumerate()
            .map(|(i, p)| (FrameKey(i as i64), p.as_path()))
    }
}

#[async_trait]
impl FrameSource for FrameSequence {
    async fn frame(&self, key: FrameKey) -> GphyxResult<RgbaImage> {
        let path = self
            .path(key)
            .ok_or_else(|| GphyxError::render(format!("Frame {key} is outside the sequence")))?
            .to_path_buf();
        tokio::task::spawn_blocking(move || {
            image::open(&path)
                .map(|img| img.to_rgba8())
                .map_err(|e| GphyxError::render(format!("Failed to decode {}: {e}", path.display())))
        })
        .await
        .map_err(|e| GphyxError::render(format!("Frame decoder panicked: {e}")))?
    }
}
