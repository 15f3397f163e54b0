//! Sliding-window majority vote over raw classifications.

use std::collections::VecDeque;

use log::debug;

use crate::config::StabilizerSettings;
use crate::gestures::{Classification, GestureId};

pub const FILLING: &str = "Detecting...";
pub const UNSETTLED: &str = "Stabilizing...";

#[derive(Debug)]
pub struct Stabilizer {
    window: VecDeque<GestureId>,
    settings: StabilizerSettings,
}

impl Stabilizer {
    pub fn new(settings: StabilizerSettings) -> Self {
        Self {
            window: VecDeque::with_capacity(settings.capacity),
            settings,
        }
    }

    /// Records `raw` and returns the stable verdict for this frame.
    ///
    /// A winner must hold at least `threshold` of the current window and may
    /// not be `none`/`unknown`. The stable id comes from the window, while
    /// confidence and color come from this frame's raw result, so a frame
    /// whose raw verdict disagrees with the winner still reports the raw
    /// confidence scaled by stability.
    pub fn push(&mut self, raw: &Classification) -> Classification {
        if self.window.len() == self.settings.capacity {
            self.window.pop_front();
        }
        self.window.push_back(raw.gesture);

        if self.window.len() < self.settings.min_fill {
            return Classification::suppressed(FILLING);
        }

        let Some((winner, count)) = self.majority() else {
            return Classification::suppressed(FILLING);
        };
        let stability = count as f64 / self.window.len() as f64;

        if stability < self.settings.threshold || !winner.is_actionable() {
            return Classification::suppressed(UNSETTLED);
        }
        if winner != raw.gesture {
            debug!("stable {winner} held while raw reads {}", raw.gesture);
        }

        Classification {
            gesture: winner,
            name: winner.display_name(),
            confidence: raw.confidence * stability as f32,
            color: raw.color,
        }
    }

    /// Most frequent id; on a tie the one seen earliest in the window wins.
    fn majority(&self) -> Option<(GestureId, usize)> {
        let mut counts: Vec<(GestureId, usize)> = Vec::new();
        for g in &self.window {
            match counts.iter_mut().find(|(id, _)| id == g) {
                Some((_, n)) => *n += 1,
                None => counts.push((*g, 1)),
            }
        }
        counts
            .into_iter()
            .fold(None, |best: Option<(GestureId, usize)>, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }
}
