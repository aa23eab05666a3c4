//! Frame clock and frame addressing.
//!
//! Tracking results are keyed by frame index rather than by host time so
//! that lookups stay exact. The host hands us times in seconds; a
//! [`FrameRate`] converts them to [`FrameKey`]s and back.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a frame within a clip (zero-based, may be negative for
/// frames before the clip start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameKey(pub i64);

impl FrameKey {
    pub fn new(index: i64) -> Self {
        Self(index)
    }

    pub fn index(self) -> i64 {
        self.0
    }

    /// The neighbouring frame in the given direction.
    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Direction::Forward => Self(self.0 + 1),
            Direction::Backward => Self(self.0 - 1),
        }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direction in which a clip is walked during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Rational frame rate (`numerator / denominator` frames per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    /// 23.976 fps, the stepping rate of the standalone mask editor.
    pub const NTSC_FILM: FrameRate = FrameRate {
        numerator: 24000,
        denominator: 1001,
    };

    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator: denominator.max(1),
        }
    }

    /// Frames per second as a float.
    pub fn fps(&self) -> f64 {
        self.numerator as f64 / self.denominator.max(1) as f64
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(&self) -> f64 {
        self.denominator.max(1) as f64 / self.numerator.max(1) as f64
    }

    /// Frame containing the given host time (nearest frame boundary).
    pub fn key_at(&self, secs: f64) -> FrameKey {
        FrameKey((secs * self.fps()).round() as i64)
    }

    /// Start time of a frame in seconds.
    pub fn secs_at(&self, key: FrameKey) -> f64 {
        key.0 as f64 * self.frame_duration_secs()
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::NTSC_FILM
    }
}

/// Inclusive range of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub first: FrameKey,
    pub last: FrameKey,
}

impl FrameRange {
    /// Build a range, swapping the ends if they are reversed.
    pub fn new(a: FrameKey, b: FrameKey) -> Self {
        Self {
            first: a.min(b),
            last: a.max(b),
        }
    }

    /// Range covering a host time span `[start, start + duration]`.
    pub fn from_secs(rate: &FrameRate, start_secs: f64, duration_secs: f64) -> Self {
        let first = rate.key_at(start_secs);
        let last = rate.key_at(start_secs + duration_secs.max(0.0));
        // A span ending exactly on a frame boundary does not include that frame.
        let last = if last > first && rate.secs_at(last) >= start_secs + duration_secs {
            FrameKey(last.0 - 1)
        } else {
            last
        };
        Self::new(first, last)
    }

    pub fn contains(&self, key: FrameKey) -> bool {
        key >= self.first && key <= self.last
    }

    pub fn len(&self) -> u64 {
        (self.last.0 - self.first.0 + 1) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    /// Frames strictly after `from` in the given direction, staying inside
    /// the range.
    pub fn walk_from(&self, from: FrameKey, direction: Direction) -> impl Iterator<Item = FrameKey> {
        let range = *self;
        let mut current = from;
        std::iter::from_fn(move || {
            current = current.step(direction);
            range.contains(current).then_some(current)
        })
    }
}
