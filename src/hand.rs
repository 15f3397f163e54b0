//! Per-frame hand landmarks and the planar geometry used on them.
//!
//! Coordinates are in pixel space with y growing downward. `z` is relative
//! depth reported by the landmark model and is carried but never classified.

use serde::{Deserialize, Serialize};

/// Landmarks per hand in the model's fixed anatomical order.
pub const LANDMARK_COUNT: usize = 21;

/// The core accepts at most this many hands per frame.
pub const MAX_HANDS: usize = 2;

pub const WRIST: usize = 0;
#[cfg(test)]
pub const THUMB_CMC: usize = 1;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
#[cfg(test)]
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// (MCP, PIP, TIP) for index, middle, ring and pinky.
pub const FINGER_JOINTS: [(usize, usize, usize); 4] = [
    (INDEX_MCP, INDEX_PIP, INDEX_TIP),
    (MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP),
    (RING_MCP, RING_PIP, RING_TIP),
    (PINKY_MCP, PINKY_PIP, PINKY_TIP),
];

// keeps unit vectors and cosines finite for degenerate (zero-length) bones
const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Euclidean pixel distance; depth is ignored.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    #[default]
    Right,
}

/// One detected hand. Produced fresh every frame; nothing ties it to the
/// hand seen in the previous frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    #[serde(default)]
    pub side: Side,
    pub landmarks: Vec<Landmark>,
}

impl Hand {
    pub fn new(side: Side, landmarks: Vec<Landmark>) -> Self {
        Self { side, landmarks }
    }

    /// A hand with fewer than [`LANDMARK_COUNT`] points is malformed; every
    /// detector answers conservatively for it instead of indexing.
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }

    pub fn point(&self, idx: usize) -> Landmark {
        self.landmarks[idx]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub hands: Vec<Hand>,
}

impl Frame {
    /// Drops hands beyond `max`; returns how many were dropped.
    pub fn truncate_hands(&mut self, max: usize) -> usize {
        let extra = self.hands.len().saturating_sub(max);
        self.hands.truncate(max);
        extra
    }
}

/// Unit vector from `from` to `to`. The length is padded by a small epsilon
/// so coincident points give a near-zero vector rather than NaN.
pub fn unit_vector(from: &Landmark, to: &Landmark) -> (f32, f32) {
    let vx = to.x - from.x;
    let vy = to.y - from.y;
    let len = (vx * vx + vy * vy).sqrt() + EPS;
    (vx / len, vy / len)
}

/// Angle in degrees between two unit vectors, via the clamped arccosine of
/// their dot product.
pub fn angle_between_deg(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dot = a.0 * b.0 + a.1 * b.1;
    dot.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Bend at `joint` between bone `start→joint` and bone `joint→end`, reported
/// as `180 - raw` so that a perfectly straight chain reads 180°.
pub fn joint_straightness_deg(start: &Landmark, joint: &Landmark, end: &Landmark) -> f32 {
    let v1 = (joint.x - start.x, joint.y - start.y);
    let v2 = (end.x - joint.x, end.y - joint.y);
    let norms = (v1.0 * v1.0 + v1.1 * v1.1).sqrt() * (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    let cos = (v1.0 * v2.0 + v1.1 * v2.1) / (norms + EPS);
    180.0 - cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Synthetic hands for tests.
///
/// Every hand is laid out in a local frame: `a` runs from the wrist toward the
/// fingertips and `c` runs across the palm. Finger rows sit at `c = -20, -7, 7,
/// 20` (index..pinky) so the fingertips stay within the level band used by the
/// horizontal-orientation test.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    const ROWS: [f32; 4] = [-20.0, -7.0, 7.0, 20.0];

    // (a) along the finger for MCP, PIP, DIP, TIP
    const EXTENDED: [f32; 4] = [100.0, 150.0, 180.0, 210.0];
    const FLEXED: [f32; 4] = [100.0, 130.0, 120.0, 90.0];

    // (a, c) for CMC, MCP, IP, TIP
    const THUMB_OUT: [(f32, f32); 4] = [(20.0, -30.0), (40.0, -60.0), (55.0, -85.0), (70.0, -110.0)];
    const THUMB_IN: [(f32, f32); 4] = [(20.0, -30.0), (45.0, -50.0), (70.0, -60.0), (75.0, -40.0)];

    /// Fingers point up the image (toward smaller y).
    pub fn upright(wrist: (f32, f32), fingers: [u8; 5]) -> Hand {
        build(wrist, (0.0, -1.0), (1.0, 0.0), fingers)
    }

    /// Fingers point toward larger x, palm rows stacked along y.
    pub fn pointing_right(wrist: (f32, f32), fingers: [u8; 5]) -> Hand {
        build(wrist, (1.0, 0.0), (0.0, 1.0), fingers)
    }

    pub fn with_point(mut hand: Hand, idx: usize, x: f32, y: f32) -> Hand {
        hand.landmarks[idx] = Landmark::new(x, y);
        hand
    }

    fn build(wrist: (f32, f32), along: (f32, f32), across: (f32, f32), fingers: [u8; 5]) -> Hand {
        let at = |a: f32, c: f32| {
            Landmark::new(
                wrist.0 + along.0 * a + across.0 * c,
                wrist.1 + along.1 * a + across.1 * c,
            )
        };

        let mut lm = vec![Landmark::default(); LANDMARK_COUNT];
        lm[WRIST] = at(0.0, 0.0);

        let thumb = if fingers[0] == 1 { THUMB_OUT } else { THUMB_IN };
        for (k, (a, c)) in thumb.iter().enumerate() {
            lm[THUMB_CMC + k] = at(*a, *c);
        }

        for (f, row) in ROWS.iter().enumerate() {
            let profile = if fingers[f + 1] == 1 { EXTENDED } else { FLEXED };
            let base = INDEX_MCP + 4 * f;
            for (k, a) in profile.iter().enumerate() {
                lm[base + k] = at(*a, *row);
            }
        }

        Hand::new(Side::Right, lm)
    }
}
