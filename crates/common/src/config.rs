//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clock::FrameRate;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote tracking/inpainting service.
    pub backend: BackendConfig,

    /// Analysis settings.
    pub tracking: TrackingConfig,

    /// Mask editor settings.
    pub editor: EditorConfig,

    /// Rasterization and tile rendering settings.
    pub render: RenderConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Remote backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the processing service.
    pub url: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Tracking session parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Consecutive per-frame failures that interrupt an analysis run.
    pub max_consecutive_failures: u32,

    /// Clip frame rate used to map host times to frames.
    pub frame_rate: FrameRate,
}

/// On-screen mask editor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Hit-test radius in screen pixels.
    pub hit_tolerance_px: f64,

    /// Upper bound on control points per mask.
    pub max_nodes: usize,

    /// Number of undo steps kept.
    pub undo_depth: usize,
}

/// Mask rasterization and tile rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sub-scanlines per pixel row for anti-aliasing.
    pub subsamples: u32,

    /// Maximum deviation (normalized units) of a flattened curve from the
    /// true bezier.
    pub flatness: f64,

    /// Recursion cap for curve subdivision.
    pub max_subdivision_depth: u32,

    /// Number of frames whose inpaint result is kept.
    pub inpaint_cache_frames: usize,

    /// Edge length of tiles produced by the CLI host.
    pub tile_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gphyx_tracking=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8989".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            frame_rate: FrameRate::default(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_px: 8.0,
            max_nodes: 256,
            undo_depth: 64,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            subsamples: 4,
            flatness: 0.0005,
            max_subdivision_depth: 12,
            inpaint_cache_frames: 8,
            tile_size: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Self::default()
    }

    /// Load config from an explicit path, falling back to defaults when the
    /// file cannot be read or parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, e);
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gphyx").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "tracking": { "max_consecutive_failures": 2 } }"#).unwrap();
        assert_eq!(config.tracking.max_consecutive_failures, 2);
        assert_eq!(config.tracking.frame_rate, FrameRate::NTSC_FILM);
        assert_eq!(config.backend.url, "http://127.0.0.1:8989");
        assert_eq!(config.render.subsamples, 4);
    }

    #[test]
    fn test_unreadable_config_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("gphyx_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.editor.max_nodes, 256);

        std::fs::remove_dir_all(&dir).ok();
    }
}
