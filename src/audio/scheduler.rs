use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::sidetone::{envelope, ramp_samples, release, SidetoneGenerator, RAMP_SECONDS};

/// A tone pinned to the output's sample clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    /// First sample of the tone on the output clock
    pub start: u64,
    /// Length in samples
    pub length: u64,
    pub frequency: f32,
    pub volume: f32,
}

struct ActiveTone {
    tone: ScheduledTone,
    position: u64,
    ramp: u64,
    /// Level and progress of a cancel fade, once one has begun
    fade: Option<(f32, u64)>,
}

/// Sample-clock tone queue shared between the synthesizer and whatever
/// drives the output (device callback or offline renderer).
///
/// Silence is never queued: the clock simply runs past gaps between tones,
/// so clearing the queue drops every pending element outright.
pub struct ToneScheduler {
    sample_rate: u32,
    clock: u64,
    pending: VecDeque<ScheduledTone>,
    active: Option<ActiveTone>,
    generator: SidetoneGenerator,
    fade_samples: u64,
}

pub type SharedScheduler = Arc<Mutex<ToneScheduler>>;

impl ToneScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            clock: 0,
            pending: VecDeque::new(),
            active: None,
            generator: SidetoneGenerator::new(sample_rate as f32),
            fade_samples: (sample_rate as f64 * RAMP_SECONDS).round().max(1.0) as u64,
        }
    }

    pub fn shared(sample_rate: u32) -> SharedScheduler {
        Arc::new(Mutex::new(Self::new(sample_rate)))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples rendered so far; the monotonic audio clock
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Change sample rate when a device opens. Only legal while idle.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if self.sample_rate == sample_rate {
            return;
        }
        // Rescale the clock so already-issued positions stay meaningful
        self.clock = (self.clock as f64 * sample_rate as f64 / self.sample_rate as f64) as u64;
        self.sample_rate = sample_rate;
        self.generator.set_sample_rate(sample_rate as f32);
        self.fade_samples = (sample_rate as f64 * RAMP_SECONDS).round().max(1.0) as u64;
        self.pending.clear();
        self.active = None;
    }

    /// Queue tones. Tones are kept ordered by start sample.
    pub fn enqueue(&mut self, tones: impl IntoIterator<Item = ScheduledTone>) {
        for tone in tones {
            if tone.length == 0 {
                continue;
            }
            let idx = self.pending.partition_point(|t| t.start <= tone.start);
            self.pending.insert(idx, tone);
        }
    }

    /// Drop every pending tone and fade the sounding one out.
    /// Returns the clock position at which output is silent.
    pub fn cancel(&mut self) -> u64 {
        self.pending.clear();
        match self.active.as_mut() {
            Some(active) => {
                if active.fade.is_none() {
                    let level = envelope(active.position, active.tone.length, active.ramp);
                    active.fade = Some((level, 0));
                }
                let done = active.fade.map(|(_, pos)| pos).unwrap_or(0);
                self.clock + self.fade_samples.saturating_sub(done)
            }
            None => self.clock,
        }
    }

    /// True while any tone is sounding or queued
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.pending.is_empty()
    }

    /// Render mono samples, advancing the clock by `out.len()`
    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Render interleaved frames, writing the same sample to every channel
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let value = self.next_sample();
            for s in frame.iter_mut() {
                *s = value;
            }
        }
    }

    /// Advance the clock without keeping the output
    pub fn skip(&mut self, samples: u64) {
        for _ in 0..samples {
            self.next_sample();
        }
    }

    fn next_sample(&mut self) -> f32 {
        if self.active.is_none() {
            if let Some(front) = self.pending.front() {
                if front.start <= self.clock {
                    let tone = *front;
                    self.pending.pop_front();
                    self.active = Some(ActiveTone {
                        tone,
                        position: 0,
                        ramp: ramp_samples(self.sample_rate, tone.length),
                        fade: None,
                    });
                }
            }
        }

        let mut value = 0.0;
        let mut finished = false;
        if let Some(active) = self.active.as_mut() {
            let raw = self.generator.next_sample(active.tone.frequency);
            let gain = match active.fade.as_mut() {
                Some((level, pos)) => {
                    let g = release(*level, *pos, self.fade_samples);
                    *pos += 1;
                    if *pos >= self.fade_samples {
                        finished = true;
                    }
                    g
                }
                None => envelope(active.position, active.tone.length, active.ramp),
            };
            value = raw * gain * active.tone.volume;
            active.position += 1;
            if active.position >= active.tone.length {
                finished = true;
            }
        }
        if finished {
            self.active = None;
        }

        self.clock += 1;
        value
    }
}
