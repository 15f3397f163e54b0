//! Extended/flexed state of each finger of one hand.
//!
//! The thumb opens sideways, so it gets a radial test only. The other four
//! fingers each take a majority vote over three independent signals
//! (vertical position, radial reach, straightness at the PIP joint), since
//! no single one survives every hand rotation.

use std::fmt;

use crate::config::FingerThresholds;
use crate::hand::{FINGER_JOINTS, Hand, Landmark, THUMB_IP, THUMB_TIP, WRIST, joint_straightness_deg};

/// thumb, index, middle, ring, pinky
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FingerState(pub [bool; 5]);

impl FingerState {
    pub const THUMB_ONLY: Self = Self::from_bits([1, 0, 0, 0, 0]);
    pub const THUMB_INDEX: Self = Self::from_bits([1, 1, 0, 0, 0]);
    pub const INDEX_ONLY: Self = Self::from_bits([0, 1, 0, 0, 0]);
    pub const INDEX_MIDDLE: Self = Self::from_bits([0, 1, 1, 0, 0]);
    pub const FOUR_NO_THUMB: Self = Self::from_bits([0, 1, 1, 1, 1]);
    pub const PINKY_ONLY: Self = Self::from_bits([0, 0, 0, 0, 1]);

    pub const fn from_bits(b: [u8; 5]) -> Self {
        Self([b[0] != 0, b[1] != 0, b[2] != 0, b[3] != 0, b[4] != 0])
    }

    pub fn bits(&self) -> [u8; 5] {
        self.0.map(u8::from)
    }

    pub fn total(&self) -> usize {
        self.0.iter().filter(|e| **e).count()
    }

    pub fn thumb(&self) -> bool {
        self.0[0]
    }
    pub fn index(&self) -> bool {
        self.0[1]
    }
    pub fn middle(&self) -> bool {
        self.0[2]
    }
}

impl fmt::Display for FingerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bits();
        write!(f, "[{},{},{},{},{}]", b[0], b[1], b[2], b[3], b[4])
    }
}

/// All-flexed for a malformed hand.
pub fn estimate(hand: &Hand, th: &FingerThresholds) -> FingerState {
    if !hand.is_complete() {
        return FingerState::default();
    }
    let wrist = hand.point(WRIST);

    let mut state = [false; 5];
    state[0] = thumb_extended(&wrist, &hand.point(THUMB_IP), &hand.point(THUMB_TIP), th);
    for (slot, (mcp, pip, tip)) in state[1..].iter_mut().zip(FINGER_JOINTS) {
        *slot = finger_extended(
            &wrist,
            &hand.point(mcp),
            &hand.point(pip),
            &hand.point(tip),
            th,
        );
    }
    FingerState(state)
}

fn thumb_extended(wrist: &Landmark, ip: &Landmark, tip: &Landmark, th: &FingerThresholds) -> bool {
    wrist.distance(tip) > wrist.distance(ip) * th.thumb_ratio
}

fn finger_extended(
    wrist: &Landmark,
    mcp: &Landmark,
    pip: &Landmark,
    tip: &Landmark,
    th: &FingerThresholds,
) -> bool {
    // only meaningful for an upright hand; pixel y grows downward
    let vertical = tip.y < pip.y - th.vertical_margin_px && pip.y < mcp.y;
    let radial = wrist.distance(tip) > wrist.distance(mcp) * th.radial_ratio;
    let straight = joint_straightness_deg(mcp, pip, tip) > th.straight_angle_deg;

    let votes = [vertical, radial, straight].iter().filter(|v| **v).count();
    votes >= th.min_votes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::fixtures::{pointing_right, upright, with_point};
    use crate::hand::{INDEX_DIP, INDEX_PIP, INDEX_TIP, Side};

    fn th() -> FingerThresholds {
        FingerThresholds::default()
    }

    #[test]
    fn test_upright_patterns() {
        for bits in [
            [0, 0, 0, 0, 0],
            [1, 1, 1, 1, 1],
            [0, 1, 1, 0, 0],
            [1, 0, 0, 0, 0],
            [0, 0, 0, 0, 1],
            [0, 1, 1, 1, 1],
        ] {
            let hand = upright((300.0, 400.0), bits);
            assert_eq!(estimate(&hand, &th()).bits(), bits, "pattern {bits:?}");
        }
    }

    #[test]
    fn test_rotated_hand_still_reads_extended() {
        // vertical vote fails for a sideways hand; radial + angle carry it
        let hand = pointing_right((100.0, 300.0), [0, 1, 1, 1, 1]);
        assert_eq!(estimate(&hand, &th()), FingerState::FOUR_NO_THUMB);
    }

    #[test]
    fn test_bent_finger_loses_angle_vote() {
        // index reaches far from the wrist but kinks hard at the PIP,
        // and the tip drops below the PIP: only the radial vote passes
        let hand = upright((300.0, 400.0), [0, 1, 0, 0, 0]);
        let hand = with_point(hand, INDEX_PIP, 280.0, 250.0);
        let hand = with_point(hand, INDEX_DIP, 330.0, 255.0);
        let hand = with_point(hand, INDEX_TIP, 380.0, 260.0);
        assert!(!estimate(&hand, &th()).index());
    }

    #[test]
    fn test_min_votes_is_configurable() {
        let hand = upright((300.0, 400.0), [0, 1, 0, 0, 0]);
        let hand = with_point(hand, INDEX_TIP, 380.0, 260.0);
        let strict = FingerThresholds { min_votes: 1, ..th() };
        assert!(estimate(&hand, &strict).index());
    }

    #[test]
    fn test_thumb_radial_ratio() {
        let hand = upright((300.0, 400.0), [1, 0, 0, 0, 0]);
        assert!(estimate(&hand, &th()).thumb());
        let lax = FingerThresholds { thumb_ratio: 2.0, ..th() };
        assert!(!estimate(&hand, &lax).thumb());
    }

    #[test]
    fn test_malformed_hand_is_all_flexed() {
        let mut hand = upright((300.0, 400.0), [1, 1, 1, 1, 1]);
        hand.landmarks.truncate(20);
        assert_eq!(estimate(&hand, &th()), FingerState::default());
        let empty = Hand::new(Side::Left, vec![]);
        assert_eq!(estimate(&empty, &th()).total(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(FingerState::INDEX_MIDDLE.to_string(), "[0,1,1,0,0]");
        assert_eq!(FingerState::INDEX_MIDDLE.total(), 2);
    }
}
