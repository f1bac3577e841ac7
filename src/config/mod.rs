use std::collections::BTreeSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::cw::{clamp_effective_wpm, clamp_level, clamp_wpm, is_encodable, TimingParameters, MIN_LEVEL};
use crate::storage::{KeyValueStore, StorageError};

/// Storage key for the settings document
pub const SETTINGS_KEY: &str = "morse-settings-v3";

pub const MIN_FREQUENCY: f32 = 300.0;
pub const MAX_FREQUENCY: f32 = 1500.0;

/// Which kind of content drills are built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentMode {
    #[default]
    RandomGroups,
    Callsigns,
    QCodes,
    Abbreviations,
    Prosigns,
    Mixed,
}

impl ContentMode {
    /// Parse a mode from its stored name or a short alias
    pub fn from_name(name: &str) -> Option<Self> {
        let mode = match name.trim().to_ascii_lowercase().as_str() {
            "randomgroups" | "groups" => ContentMode::RandomGroups,
            "callsigns" | "calls" => ContentMode::Callsigns,
            "qcodes" | "q" => ContentMode::QCodes,
            "abbreviations" | "abbr" => ContentMode::Abbreviations,
            "prosigns" => ContentMode::Prosigns,
            "mixed" => ContentMode::Mixed,
            _ => return None,
        };
        Some(mode)
    }
}

/// Trainer settings, persisted as one JSON document
///
/// Reading is permissive: unknown fields are ignored and missing ones take
/// their defaults. Writing emits exactly these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // Keying
    pub wpm: f32,
    pub effective_wpm: f32,
    pub frequency: f32,
    pub volume: f32,

    // Curriculum
    pub lesson_level: u8,
    pub manual_chars: BTreeSet<char>,
    pub content_mode: ContentMode,

    // Behaviour
    pub auto_play: bool,
    pub auto_level: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wpm: 20.0,
            effective_wpm: 20.0,
            frequency: 600.0,
            volume: 0.5,
            lesson_level: MIN_LEVEL,
            manual_chars: BTreeSet::new(),
            content_mode: ContentMode::default(),
            auto_play: false,
            auto_level: true,
            api_key: None,
        }
    }
}

impl Settings {
    /// Load settings from the store, or return defaults if absent or unreadable
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let contents = match store.get(SETTINGS_KEY) {
            Ok(Some(c)) => c,
            Ok(None) => {
                debug!(target: "storage", "No saved settings, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(target: "storage", "Failed to read settings: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Settings>(&contents) {
            Ok(mut settings) => {
                settings.normalize();
                debug!(target: "storage", "Loaded settings");
                settings
            }
            Err(e) => {
                warn!(target: "storage", "Failed to parse settings: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings, replacing the stored document
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        let json = serde_json::to_string(self).map_err(|e| StorageError::Serialize(e.to_string()))?;
        store.set(SETTINGS_KEY, &json)
    }

    /// Clamp every field into its legal range
    pub fn normalize(&mut self) {
        self.wpm = clamp_wpm(self.wpm);
        self.effective_wpm = clamp_effective_wpm(self.wpm, self.effective_wpm);
        self.frequency = if self.frequency.is_finite() {
            self.frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY)
        } else {
            Self::default().frequency
        };
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            Self::default().volume
        };
        self.lesson_level = clamp_level(self.lesson_level as i32);
        self.manual_chars = self
            .manual_chars
            .iter()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| is_encodable(*c))
            .collect();
        if self.api_key.as_deref().map(|k| k.trim().is_empty()).unwrap_or(false) {
            self.api_key = None;
        }
    }

    pub fn timing(&self) -> TimingParameters {
        TimingParameters::new(self.wpm, self.effective_wpm)
    }

    pub fn set_wpm(&mut self, wpm: f32) {
        self.wpm = clamp_wpm(wpm);
        self.effective_wpm = clamp_effective_wpm(self.wpm, self.effective_wpm);
    }

    pub fn set_effective_wpm(&mut self, effective_wpm: f32) {
        self.effective_wpm = clamp_effective_wpm(self.wpm, effective_wpm);
    }

    /// Shift the lesson level by `delta`, staying within the curriculum.
    /// Returns true if the level changed.
    pub fn change_level(&mut self, delta: i32) -> bool {
        let level = clamp_level(self.lesson_level as i32 + delta);
        let changed = level != self.lesson_level;
        self.lesson_level = level;
        changed
    }

    /// Add or remove a manually unlocked character. Returns false if the
    /// character cannot be keyed.
    pub fn toggle_char(&mut self, ch: char) -> bool {
        let ch = ch.to_ascii_uppercase();
        if !is_encodable(ch) {
            return false;
        }
        if !self.manual_chars.remove(&ch) {
            self.manual_chars.insert(ch);
        }
        true
    }

    /// Unlock or lock a manual character regardless of its current state
    pub fn set_char(&mut self, ch: char, unlocked: bool) -> bool {
        let ch = ch.to_ascii_uppercase();
        if !is_encodable(ch) {
            return false;
        }
        if unlocked {
            self.manual_chars.insert(ch);
        } else {
            self.manual_chars.remove(&ch);
        }
        true
    }
}
