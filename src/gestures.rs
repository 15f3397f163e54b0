use log::trace;
use serde::Serialize;
use std::{fmt, str::FromStr};

use crate::config::{CrossThresholds, FingerThresholds, OrientationThresholds, Profile, XThresholds};
use crate::fingers::{self, FingerState};
use crate::hand::{Hand, THUMB_TIP, WRIST};
use crate::relations;
use crate::stabilizer::Stabilizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureId {
    None,
    Unknown,
    #[serde(rename = "num_0")]
    Num0,
    #[serde(rename = "num_1")]
    Num1,
    #[serde(rename = "num_2")]
    Num2,
    #[serde(rename = "num_3")]
    Num3,
    #[serde(rename = "num_4")]
    Num4,
    #[serde(rename = "num_5")]
    Num5,
    #[serde(rename = "num_6")]
    Num6,
    #[serde(rename = "num_7")]
    Num7,
    #[serde(rename = "num_8")]
    Num8,
    #[serde(rename = "num_9")]
    Num9,
    Add,
    /// Its four-finger pose is claimed by `num_4` first, so no classifier
    /// rule reaches it; only a binding can produce it.
    Subtract,
    Multiply,
    Divide,
    Equal,
    ClearAll,
    /// Bound to an action but produced by no classifier rule.
    Backspace,
}

const DIGITS: [GestureId; 10] = [
    GestureId::Num0,
    GestureId::Num1,
    GestureId::Num2,
    GestureId::Num3,
    GestureId::Num4,
    GestureId::Num5,
    GestureId::Num6,
    GestureId::Num7,
    GestureId::Num8,
    GestureId::Num9,
];

impl GestureId {
    pub const ALL: [GestureId; 19] = [
        Self::None,
        Self::Unknown,
        Self::Num0,
        Self::Num1,
        Self::Num2,
        Self::Num3,
        Self::Num4,
        Self::Num5,
        Self::Num6,
        Self::Num7,
        Self::Num8,
        Self::Num9,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Equal,
        Self::ClearAll,
        Self::Backspace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Unknown => "unknown",
            Self::Num0 => "num_0",
            Self::Num1 => "num_1",
            Self::Num2 => "num_2",
            Self::Num3 => "num_3",
            Self::Num4 => "num_4",
            Self::Num5 => "num_5",
            Self::Num6 => "num_6",
            Self::Num7 => "num_7",
            Self::Num8 => "num_8",
            Self::Num9 => "num_9",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Equal => "equal",
            Self::ClearAll => "clear_all",
            Self::Backspace => "backspace",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "No hand",
            Self::Unknown => "...",
            Self::Num0 => "ZERO (0)",
            Self::Num1 => "ONE (1)",
            Self::Num2 => "TWO (2)",
            Self::Num3 => "THREE (3)",
            Self::Num4 => "FOUR (4)",
            Self::Num5 => "FIVE (5)",
            Self::Num6 => "SIX (6)",
            Self::Num7 => "SEVEN (7)",
            Self::Num8 => "EIGHT (8)",
            Self::Num9 => "NINE (9)",
            Self::Add => "+ ADD",
            Self::Subtract => "- SUBTRACT",
            Self::Multiply => "MULTIPLY (x)",
            Self::Divide => "DIVIDE (/)",
            Self::Equal => "= CALCULATE",
            Self::ClearAll => "CLEAR ALL",
            Self::Backspace => "<- BACKSPACE",
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Self::None | Self::Unknown => Rgb::GRAY,
            Self::Num0 => Rgb(255, 100, 100),
            Self::Num1
            | Self::Num2
            | Self::Num3
            | Self::Num4
            | Self::Num5
            | Self::Num6
            | Self::Num7
            | Self::Num8
            | Self::Num9 => Rgb(100, 255, 100),
            Self::Add => Rgb(0, 255, 0),
            Self::Subtract => Rgb(255, 150, 0),
            Self::Multiply => Rgb(255, 100, 255),
            Self::Divide => Rgb(150, 100, 255),
            Self::Equal => Rgb(0, 255, 255),
            Self::ClearAll => Rgb(255, 50, 50),
            Self::Backspace => Rgb(255, 200, 0),
        }
    }

    pub fn digit(&self) -> Option<u8> {
        DIGITS.iter().position(|d| d == self).map(|d| d as u8)
    }

    pub fn from_digit(d: usize) -> Option<Self> {
        DIGITS.get(d).copied()
    }

    /// `none` and `unknown` are never confirmed by the stabilizer.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::None | Self::Unknown)
    }
}

impl fmt::Display for GestureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|g| g.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown gesture id: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GRAY: Rgb = Rgb(150, 150, 150);
    pub const RED: Rgb = Rgb(255, 50, 50);
}

/// One frame's verdict, raw or stabilized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub gesture: GestureId,
    pub name: &'static str,
    pub confidence: f32,
    pub color: Rgb,
}

impl Classification {
    pub fn new(gesture: GestureId, confidence: f32) -> Self {
        Self {
            gesture,
            name: gesture.display_name(),
            confidence,
            color: gesture.color(),
        }
    }

    pub fn no_hand() -> Self {
        Self::new(GestureId::None, 0.0)
    }

    pub fn unknown() -> Self {
        Self::new(GestureId::Unknown, UNKNOWN)
    }

    /// A `none` carrying a status label instead of "No hand".
    pub fn suppressed(status: &'static str) -> Self {
        Self {
            name: status,
            ..Self::no_hand()
        }
    }
}

// Fixed per-rule confidences.
const CERTAIN: f32 = 1.0;
const SHORTCUT: f32 = 0.98;
const TWO_HAND: f32 = 0.95;
const PINKY_CLEAR: f32 = 0.95;
const PALMS_CLEAR: f32 = 0.9;
const UNKNOWN: f32 = 0.2;

/// Stateless per-frame classifier: finger states plus geometric relations,
/// resolved through a fixed first-match hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    fingers: FingerThresholds,
    orientation: OrientationThresholds,
    cross: CrossThresholds,
    x: XThresholds,
}

impl Classifier {
    pub fn new(profile: &Profile) -> Self {
        Self {
            fingers: profile.fingers.clone(),
            orientation: profile.orientation.clone(),
            cross: profile.cross.clone(),
            x: profile.x_formation.clone(),
        }
    }

    pub fn finger_state(&self, hand: &Hand) -> FingerState {
        fingers::estimate(hand, &self.fingers)
    }

    pub fn classify(&self, hands: &[Hand]) -> Classification {
        match hands {
            [] => Classification::no_hand(),
            [hand] => self.one_hand(hand),
            [a, b] => self.two_hands(a, b),
            // callers truncate to MAX_HANDS before reaching here
            _ => Classification::unknown(),
        }
    }

    fn one_hand(&self, hand: &Hand) -> Classification {
        if !hand.is_complete() {
            return Classification::unknown();
        }
        let f = self.finger_state(hand);

        let digit = match f.total() {
            0 => Some(GestureId::Num0),
            1 if f.index() => Some(GestureId::Num1),
            2 if f.index() && f.middle() => Some(GestureId::Num2),
            3 => Some(GestureId::Num3),
            4 if !f.thumb() => Some(GestureId::Num4),
            5 => Some(GestureId::Num5),
            _ => None,
        };
        if let Some(g) = digit {
            return Classification::new(g, CERTAIN);
        }

        if f == FingerState::THUMB_ONLY
            && hand.point(THUMB_TIP).y < hand.point(WRIST).y - self.orientation.thumb_up_margin_px
        {
            return Classification::new(GestureId::Equal, CERTAIN);
        }
        if f == FingerState::THUMB_INDEX {
            return Classification::new(GestureId::Add, SHORTCUT);
        }
        // shadowed by the four-finger digit above
        if f == FingerState::FOUR_NO_THUMB && relations::is_horizontal(hand, &self.orientation) {
            return Classification::new(GestureId::Subtract, SHORTCUT);
        }
        if f == FingerState::PINKY_ONLY {
            return Classification::new(GestureId::ClearAll, PINKY_CLEAR);
        }
        Classification::unknown()
    }

    fn two_hands(&self, a: &Hand, b: &Hand) -> Classification {
        if !a.is_complete() || !b.is_complete() {
            return Classification::unknown();
        }
        let (fa, fb) = (self.finger_state(a), self.finger_state(b));
        let (ta, tb) = (fa.total(), fb.total());

        // open palm plus 1..=4 on the other hand reads as 6..=9
        if let Some(g) = open_palm_plus(ta, tb).and_then(|n| GestureId::from_digit(5 + n)) {
            return Classification::new(g, TWO_HAND);
        }
        if fa == FingerState::INDEX_ONLY
            && fb == FingerState::INDEX_ONLY
            && relations::forms_cross(a, b, &self.cross)
        {
            return Classification::new(GestureId::Add, SHORTCUT);
        }
        if relations::forms_x(a, b, &self.x) {
            return Classification::new(GestureId::Multiply, TWO_HAND);
        }
        if fa == FingerState::INDEX_MIDDLE && fb == FingerState::INDEX_MIDDLE {
            return Classification::new(GestureId::Divide, TWO_HAND);
        }
        if ta == 5 && tb == 5 {
            return Classification::new(GestureId::ClearAll, PALMS_CLEAR);
        }
        match (ta, tb) {
            (1.., 0) => self.one_hand(a),
            (0, 1..) => self.one_hand(b),
            _ => Classification::unknown(),
        }
    }
}

fn open_palm_plus(ta: usize, tb: usize) -> Option<usize> {
    match (ta, tb) {
        (5, n @ 1..=4) | (n @ 1..=4, 5) => Some(n),
        _ => None,
    }
}

/// Classifier plus temporal stabilizer: one instance per camera stream,
/// created once, reset by the dispatcher after each action.
#[derive(Debug)]
pub struct GestureDetector {
    classifier: Classifier,
    stabilizer: Stabilizer,
}

impl GestureDetector {
    pub fn new(profile: &Profile) -> Self {
        Self {
            classifier: Classifier::new(profile),
            stabilizer: Stabilizer::new(profile.stabilizer.clone()),
        }
    }

    pub fn classify_stable(&mut self, hands: &[Hand]) -> Classification {
        let raw = self.classifier.classify(hands);
        trace!(
            "raw {} ({:.2}) window={}",
            raw.gesture,
            raw.confidence,
            self.stabilizer.len()
        );
        self.stabilizer.push(&raw)
    }

    pub fn reset(&mut self) {
        self.stabilizer.reset();
    }

    #[cfg(test)]
    pub fn window_len(&self) -> usize {
        self.stabilizer.len()
    }

    /// Swaps in new thresholds; history gathered under the old ones is dropped.
    pub fn update_profile(&mut self, profile: &Profile) {
        *self = Self::new(profile);
    }
}
