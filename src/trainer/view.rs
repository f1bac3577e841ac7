use std::fmt;

use serde::Serialize;

use super::drill::DrillPhase;
use crate::config::ContentMode;
use crate::input::Tab;
use crate::stats::{LevelChange, StatsRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackClass {
    Success,
    Error,
    Info,
}

/// User-visible outcome of the last interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Correct(Option<LevelChange>),
    Incorrect { expected: String },
    /// Submission was blank
    EmptyInput,
    /// Submission before the challenge was heard
    NotHeardYet,
    AudioUnavailable,
    Skipped { challenge: String },
    Coaching { weak: Vec<char> },
    LevelSet(u8),
    Reset,
}

impl Notice {
    pub fn class(&self) -> FeedbackClass {
        match self {
            Notice::Correct(_) => FeedbackClass::Success,
            Notice::Incorrect { .. } => FeedbackClass::Error,
            _ => FeedbackClass::Info,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Correct(None) => write!(f, "Correct!"),
            Notice::Correct(Some(LevelChange::Promoted(level))) => {
                write!(f, "Correct! Advanced to level {}", level)
            }
            Notice::Correct(Some(LevelChange::Demoted(level))) => {
                write!(f, "Correct! Level adjusted to {}", level)
            }
            Notice::Incorrect { expected } => write!(f, "Not quite. The answer was {}", expected),
            Notice::EmptyInput => write!(f, "Type what you heard first"),
            Notice::NotHeardYet => write!(f, "Play the challenge before answering"),
            Notice::AudioUnavailable => write!(f, "Audio is unavailable. Try playing again"),
            Notice::Skipped { challenge } => write!(f, "Skipped {}", challenge),
            Notice::Coaching { weak } if weak.is_empty() => {
                write!(f, "No weak characters yet, drilling the full set")
            }
            Notice::Coaching { weak } => {
                let chars: String = weak.iter().collect();
                write!(f, "Coaching on {}", chars)
            }
            Notice::LevelSet(level) => write!(f, "Lesson level {}", level),
            Notice::Reset => write!(f, "Progress and settings reset"),
        }
    }
}

/// Snapshot of everything the view renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerView {
    pub current_challenge: Option<String>,
    pub has_played_current: bool,
    pub is_playing: bool,
    pub phase: DrillPhase,
    pub feedback_text: Option<String>,
    pub feedback_class: Option<FeedbackClass>,
    pub overall_accuracy_percent: u32,
    pub drill_count: u32,
    /// Most recent first
    pub history: Vec<StatsRecord>,
    pub unlocked_characters: Vec<char>,
    pub weak_characters: Vec<char>,
    pub lesson_level: u8,
    pub content_mode: ContentMode,
    pub active_tab: Tab,
    pub settings_open: bool,
}
