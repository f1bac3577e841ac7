use std::f32::consts::PI;

/// Attack/release time of a keyed tone
pub const RAMP_SECONDS: f64 = 0.005;

/// Sine oscillator for keyed sidetone. Phase runs continuously across tones
/// so back-to-back elements never restart mid-cycle.
pub struct SidetoneGenerator {
    phase: f32,
    sample_rate: f32,
}

impl SidetoneGenerator {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
        }
    }

    /// Generate the next raw sine sample at `frequency`
    pub fn next_sample(&mut self, frequency: f32) -> f32 {
        let sample = self.phase.sin();

        // Advance phase
        self.phase += 2.0 * PI * frequency / self.sample_rate;
        if self.phase >= 2.0 * PI {
            self.phase -= 2.0 * PI;
        }

        sample
    }

    /// Update the sample rate
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}

/// Ramp length in samples for a tone of `total` samples: nominally 5 ms,
/// never more than half the tone so short dits still reach full level.
pub fn ramp_samples(sample_rate: u32, total: u64) -> u64 {
    let nominal = (sample_rate as f64 * RAMP_SECONDS).round() as u64;
    nominal.min(total / 2).max(1)
}

/// Raised cosine gain for sample `position` of a `total` sample tone
pub fn envelope(position: u64, total: u64, ramp: u64) -> f32 {
    if position < ramp {
        // Attack
        0.5 * (1.0 - (PI * position as f32 / ramp as f32).cos())
    } else if position >= total.saturating_sub(ramp) {
        // Release
        let release_pos = position - (total - ramp);
        0.5 * (1.0 + (PI * release_pos as f32 / ramp as f32).cos())
    } else {
        1.0
    }
}

/// Gain of a cancel fade that started at `start_level`, `position` samples in
pub fn release(start_level: f32, position: u64, ramp: u64) -> f32 {
    if position >= ramp {
        return 0.0;
    }
    start_level * 0.5 * (1.0 + (PI * position as f32 / ramp as f32).cos())
}
