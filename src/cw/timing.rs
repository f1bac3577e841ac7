/// Slowest speed the trainer will key at
pub const MIN_WPM: f32 = 5.0;
/// Fastest speed the trainer will key at
pub const MAX_WPM: f32 = 60.0;

/// Calculate dit duration in seconds from WPM
///
/// Standard Morse timing: 1 word = 50 dit-lengths
/// "PARIS" is the standard word used for WPM measurement
/// dit = 1.2 / WPM seconds
pub fn calculate_dit_duration(wpm: f32) -> f64 {
    1.2 / wpm as f64
}

/// Calculate dah duration (3x dit)
pub fn calculate_dah_duration(wpm: f32) -> f64 {
    calculate_dit_duration(wpm) * 3.0
}

/// Calculate inter-character gap (3 Farnsworth units)
pub fn calculate_character_gap(effective_wpm: f32) -> f64 {
    calculate_dit_duration(effective_wpm) * 3.0
}

/// Calculate inter-word gap (7 Farnsworth units)
pub fn calculate_word_gap(effective_wpm: f32) -> f64 {
    calculate_dit_duration(effective_wpm) * 7.0
}

/// Element and gap durations for one playback, all in seconds.
///
/// Elements are keyed at `wpm`; spacing between characters and words is
/// stretched to `effective_wpm` (Farnsworth).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingParameters {
    pub wpm: f32,
    pub effective_wpm: f32,
    pub dot: f64,
    pub dash: f64,
    pub intra_char_gap: f64,
    pub inter_char_gap: f64,
    pub inter_word_gap: f64,
}

impl TimingParameters {
    /// Derive timing from character speed and Farnsworth speed.
    /// Out of range speeds are clamped and `effective_wpm` never exceeds `wpm`.
    pub fn new(wpm: f32, effective_wpm: f32) -> Self {
        let wpm = clamp_wpm(wpm);
        let effective_wpm = clamp_effective_wpm(wpm, effective_wpm);
        let dot = calculate_dit_duration(wpm);

        Self {
            wpm,
            effective_wpm,
            dot,
            dash: calculate_dah_duration(wpm),
            intra_char_gap: dot,
            inter_char_gap: calculate_character_gap(effective_wpm),
            inter_word_gap: calculate_word_gap(effective_wpm),
        }
    }
}

pub fn clamp_wpm(wpm: f32) -> f32 {
    if wpm.is_finite() {
        wpm.clamp(MIN_WPM, MAX_WPM)
    } else {
        MIN_WPM
    }
}

pub fn clamp_effective_wpm(wpm: f32, effective_wpm: f32) -> f32 {
    let wpm = clamp_wpm(wpm);
    if effective_wpm.is_finite() {
        effective_wpm.clamp(MIN_WPM, wpm)
    } else {
        wpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dit_duration_at_common_speeds() {
        // At 12 WPM, dit should be 100ms
        assert!((calculate_dit_duration(12.0) - 0.100).abs() < 1e-9);

        // At 20 WPM, dit should be 60ms
        assert!((calculate_dit_duration(20.0) - 0.060).abs() < 1e-9);

        // At 25 WPM, dit should be 48ms
        assert!((calculate_dit_duration(25.0) - 0.048).abs() < 1e-9);
    }

    #[test]
    fn test_dah_is_3x_dit() {
        for wpm in [10.0, 15.0, 20.0, 25.0, 30.0] {
            let t = TimingParameters::new(wpm, wpm);
            assert!((t.dash - t.dot * 3.0).abs() < 1e-9);
            assert!((t.intra_char_gap - t.dot).abs() < 1e-9);
        }
    }

    #[test]
    fn test_farnsworth_stretches_spacing_only() {
        let t = TimingParameters::new(20.0, 10.0);
        assert!((t.dot - 0.060).abs() < 1e-9);
        assert!((t.inter_char_gap - 0.360).abs() < 1e-9);
        assert!((t.inter_word_gap - 0.840).abs() < 1e-9);
    }

    #[test]
    fn test_effective_wpm_clamped_to_wpm() {
        let t = TimingParameters::new(15.0, 30.0);
        assert_eq!(t.effective_wpm, 15.0);
        assert!((t.inter_char_gap - 3.0 * t.dot).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_speeds_clamped() {
        assert_eq!(TimingParameters::new(2.0, 1.0).wpm, MIN_WPM);
        assert_eq!(TimingParameters::new(99.0, 99.0).wpm, MAX_WPM);
        assert_eq!(TimingParameters::new(f32::NAN, 20.0).wpm, MIN_WPM);
    }
}
