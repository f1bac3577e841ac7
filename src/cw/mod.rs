mod alphabet;
mod reference;
mod schedule;
mod timing;

pub use alphabet::{
    clamp_level, is_encodable, pattern_for, unlocked_at, CURRICULUM, MAX_LEVEL, MIN_LEVEL,
};
pub use reference::{
    validate_tables, ReferenceEntry, ReferenceKind, ABBREVIATIONS, CALLSIGN_PREFIXES, PROSIGNS,
    Q_CODES,
};
pub use schedule::{KeyedTone, MorseSchedule};
pub use timing::{clamp_effective_wpm, clamp_wpm, TimingParameters, MAX_WPM, MIN_WPM};
