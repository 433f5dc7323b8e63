//! Hand landmarks, per-frame snapshots and the planar geometry used by the
//! recognizers.

use serde::Deserialize;

/// Number of landmarks the detector reports per hand.
pub const LANDMARK_COUNT: usize = 21;

/// Landmark indices (hand skeleton convention used by the detector).
pub mod lm {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_TIP: usize = 20;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl LandmarkPoint {
    #[cfg(test)]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Detector-reported handedness label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Parses the detector label; anything but "Left"/"Right" is rejected.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            l if l.eq_ignore_ascii_case("left") => Some(Self::Left),
            l if l.eq_ignore_ascii_case("right") => Some(Self::Right),
            _ => None,
        }
    }
}

/// Dominant (major) vs non-dominant (minor) role of a tracked hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandRole {
    Major,
    Minor,
}

impl HandRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

/// One detected hand as it comes out of the detector stream.
#[derive(Debug, Clone)]
pub struct DetectedHand {
    pub points: [LandmarkPoint; LANDMARK_COUNT],
    /// `None` when the detector sent a label we don't understand.
    pub handedness: Option<Handedness>,
    pub score: f32,
}

/// A hand for one frame, tagged with the role it plays this frame.
#[derive(Debug, Clone)]
pub struct HandSnapshot {
    pub points: [LandmarkPoint; LANDMARK_COUNT],
    pub role: HandRole,
}

impl HandSnapshot {
    pub fn new(points: [LandmarkPoint; LANDMARK_COUNT], role: HandRole) -> Self {
        Self { points, role }
    }

    pub fn point(&self, idx: usize) -> LandmarkPoint {
        self.points[idx]
    }

    /// Planar distance signed by vertical order: positive when `a` sits above
    /// `b` in image space (smaller y).
    pub fn signed_dist(&self, a: usize, b: usize) -> f32 {
        let sign = if self.points[a].y < self.points[b].y { 1.0 } else { -1.0 };
        self.dist(a, b) * sign
    }

    pub fn dist(&self, a: usize, b: usize) -> f32 {
        let (pa, pb) = (self.points[a], self.points[b]);
        let dx = pa.x - pb.x;
        let dy = pa.y - pb.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Absolute depth difference.
    pub fn dz(&self, a: usize, b: usize) -> f32 {
        (self.points[a].z - self.points[b].z).abs()
    }
}

/// Rounds to one decimal place.
pub fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
