use std::collections::VecDeque;

use log::info;

use crate::cw::{MAX_LEVEL, MIN_LEVEL};

/// Drills considered for promotion
pub const PROMOTION_WINDOW: usize = 10;
/// Drills considered for demotion
pub const DEMOTION_WINDOW: usize = 15;
pub const PROMOTE_THRESHOLD: f64 = 0.9;
pub const DEMOTE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Promoted(u8),
    Demoted(u8),
}

/// Decides automatic lesson level changes from recent drill outcomes.
///
/// Promotion and demotion each keep their own window of outcomes. A window
/// is emptied once it has produced a change, so the same run of drills can
/// never move the level twice.
#[derive(Debug, Clone, Default)]
pub struct LevelController {
    promotion: VecDeque<bool>,
    demotion: VecDeque<bool>,
}

fn window_accuracy(window: &VecDeque<bool>, size: usize) -> Option<f64> {
    if window.len() < size {
        return None;
    }
    let correct = window.iter().filter(|c| **c).count();
    Some(correct as f64 / size as f64)
}

impl LevelController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one scored drill and return the level change it triggers, if any
    pub fn observe(&mut self, correct: bool, level: u8) -> Option<LevelChange> {
        self.promotion.push_back(correct);
        if self.promotion.len() > PROMOTION_WINDOW {
            self.promotion.pop_front();
        }
        self.demotion.push_back(correct);
        if self.demotion.len() > DEMOTION_WINDOW {
            self.demotion.pop_front();
        }

        let promote = window_accuracy(&self.promotion, PROMOTION_WINDOW)
            .map(|acc| acc >= PROMOTE_THRESHOLD)
            .unwrap_or(false);
        if promote && level < MAX_LEVEL {
            self.promotion.clear();
            info!(target: "trainer", "Auto-promoting to level {}", level + 1);
            return Some(LevelChange::Promoted(level + 1));
        }

        let demote = window_accuracy(&self.demotion, DEMOTION_WINDOW)
            .map(|acc| acc < DEMOTE_THRESHOLD)
            .unwrap_or(false);
        if demote && level > MIN_LEVEL {
            self.demotion.clear();
            info!(target: "trainer", "Auto-demoting to level {}", level - 1);
            return Some(LevelChange::Demoted(level - 1));
        }

        None
    }

    /// Forget all evidence, as after a manual level change
    pub fn reset(&mut self) {
        self.promotion.clear();
        self.demotion.clear();
    }
}
