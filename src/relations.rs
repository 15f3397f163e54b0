//! Orientation and two-hand formation tests. Every test answers `false` when
//! any hand involved is malformed.

use crate::config::{CrossThresholds, OrientationThresholds, XThresholds};
use crate::hand::{
    Hand, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, MIDDLE_TIP, PINKY_TIP, WRIST, angle_between_deg,
    unit_vector,
};

/// Fingertips level and the wrist→middle-tip span mostly horizontal.
pub fn is_horizontal(hand: &Hand, th: &OrientationThresholds) -> bool {
    if !hand.is_complete() {
        return false;
    }
    let wrist = hand.point(WRIST);
    let middle_tip = hand.point(MIDDLE_TIP);

    let tips_level = (hand.point(INDEX_TIP).y - hand.point(PINKY_TIP).y).abs() < th.tip_level_px;
    let dx = (middle_tip.x - wrist.x).abs();
    let dy = (middle_tip.y - wrist.y).abs();
    tips_level && dx > dy * th.extent_ratio
}

/// "+" made from the two middle fingers: near-perpendicular, tips touching,
/// and one finger lying along each image axis. All three must hold, which
/// keeps a loose diagonal crossing out (that is the "X").
pub fn forms_cross(a: &Hand, b: &Hand, th: &CrossThresholds) -> bool {
    if !a.is_complete() || !b.is_complete() {
        return false;
    }
    let va = unit_vector(&a.point(MIDDLE_MCP), &a.point(MIDDLE_TIP));
    let vb = unit_vector(&b.point(MIDDLE_MCP), &b.point(MIDDLE_TIP));

    let angle = angle_between_deg(va, vb);
    let angle_ok = angle > th.min_angle_deg && angle < th.max_angle_deg;
    let close = a.point(MIDDLE_TIP).distance(&b.point(MIDDLE_TIP)) < th.max_tip_distance_px;

    let horizontal = |v: (f32, f32)| v.0.abs() > v.1.abs() * th.axis_ratio;
    let vertical = |v: (f32, f32)| v.1.abs() > v.0.abs() * th.axis_ratio;
    let orthogonal = (horizontal(va) && vertical(vb)) || (vertical(va) && horizontal(vb));

    angle_ok && close && orthogonal
}

/// "X" made from the two index fingers. Bases must be spread apart and both
/// tips must converge on the midpoint between the bases, which separates a
/// real crossing from two fingers merely pointing at each other.
pub fn forms_x(a: &Hand, b: &Hand, th: &XThresholds) -> bool {
    if !a.is_complete() || !b.is_complete() {
        return false;
    }
    let (base_a, tip_a) = (a.point(INDEX_MCP), a.point(INDEX_TIP));
    let (base_b, tip_b) = (b.point(INDEX_MCP), b.point(INDEX_TIP));

    let angle = angle_between_deg(unit_vector(&base_a, &tip_a), unit_vector(&base_b, &tip_b));
    let tip_distance = tip_a.distance(&tip_b);
    let base_distance = base_a.distance(&base_b);
    let center = base_a.midpoint(&base_b);
    let reach = base_distance * th.convergence_ratio;

    angle > th.min_angle_deg
        && angle < th.max_angle_deg
        && tip_distance < th.max_tip_distance_px
        && base_distance > th.min_base_distance_px
        && tip_a.distance(&center) < reach
        && tip_b.distance(&center) < reach
}


#[cfg(test)]
mod tests {
    use super::scenes::{plus_sign, x_sign};
    use super::*;
    use crate::hand::fixtures::{pointing_right, upright};

    #[test]
    fn test_horizontal_hand() {
        let th = OrientationThresholds::default();
        assert!(is_horizontal(&pointing_right((100.0, 300.0), [0, 1, 1, 1, 1]), &th));
        assert!(!is_horizontal(&upright((100.0, 300.0), [0, 1, 1, 1, 1]), &th));
    }

    #[test]
    fn test_horizontal_needs_level_tips() {
        let th = OrientationThresholds {
            tip_level_px: 30.0,
            ..Default::default()
        };
        // index and pinky rows are 40 px apart
        assert!(!is_horizontal(&pointing_right((100.0, 300.0), [0, 1, 1, 1, 1]), &th));
    }

    #[test]
    fn test_plus_sign_is_cross_not_x() {
        let (a, b) = plus_sign();
        assert!(forms_cross(&a, &b, &CrossThresholds::default()));
        assert!(forms_cross(&b, &a, &CrossThresholds::default()));
        assert!(!forms_x(&a, &b, &XThresholds::default()));
    }

    #[test]
    fn test_x_sign_is_x_not_cross() {
        let (a, b) = x_sign();
        assert!(forms_x(&a, &b, &XThresholds::default()));
        assert!(forms_x(&b, &a, &XThresholds::default()));
        assert!(!forms_cross(&a, &b, &CrossThresholds::default()));
    }

    #[test]
    fn test_cross_rejects_distant_tips() {
        let (a, b) = plus_sign();
        let th = CrossThresholds {
            max_tip_distance_px: 100.0,
            ..Default::default()
        };
        // tips are exactly 100 px apart; the bound is strict
        assert!(!forms_cross(&a, &b, &th));
    }

    #[test]
    fn test_x_needs_spread_bases() {
        // parallel upright index fingers side by side
        let a = upright((200.0, 400.0), [0, 1, 0, 0, 0]);
        let b = upright((330.0, 400.0), [0, 1, 0, 0, 0]);
        assert!(!forms_x(&a, &b, &XThresholds::default()));

        let (a, b) = x_sign();
        let th = XThresholds {
            min_base_distance_px: 160.0,
            ..Default::default()
        };
        assert!(!forms_x(&a, &b, &th));
    }

    #[test]
    fn test_malformed_hands_never_match() {
        let (a, mut b) = x_sign();
        b.landmarks.truncate(10);
        assert!(!forms_x(&a, &b, &XThresholds::default()));
        assert!(!forms_cross(&a, &b, &CrossThresholds::default()));
        assert!(!is_horizontal(&b, &OrientationThresholds::default()));
    }
}
