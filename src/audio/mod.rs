mod scheduler;
mod sidetone;
mod synth;

#[cfg(feature = "device")]
mod device;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use scheduler::{ScheduledTone, SharedScheduler, ToneScheduler};
pub use sidetone::{SidetoneGenerator, RAMP_SECONDS};
pub use synth::{MorseSynth, PlaybackHandle, PlaybackId, PlaybackParams, PlaybackState, SynthEvent};

#[cfg(feature = "device")]
pub use device::{DeviceInfo, DeviceOutput};

/// Default rate for outputs that are not bound to a device
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No output could be opened or the output stopped responding
    Unavailable(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Unavailable(msg) => write!(f, "Audio output unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// An audio sink that renders tones from a shared sample-clock scheduler.
///
/// The synthesizer only ever touches the scheduler through this trait; the
/// output decides how the clock advances (device callback or explicit
/// offline rendering).
pub trait AudioOutput: Send {
    fn scheduler(&self) -> &SharedScheduler;

    /// Make sure the output is running. Called before every playback.
    fn resume(&mut self) -> Result<(), AudioError>;

    fn sample_rate(&self) -> u32 {
        self.scheduler().lock().sample_rate()
    }

    /// Current audio clock in samples
    fn clock(&self) -> u64 {
        self.scheduler().lock().clock()
    }
}

/// Output with a clock that only moves when told to. Used by tests and by
/// the silent terminal mode, which advances it from wall time.
#[derive(Clone)]
pub struct OfflineOutput {
    scheduler: SharedScheduler,
    available: Arc<AtomicBool>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            scheduler: ToneScheduler::shared(sample_rate),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// An output that refuses to start, as when no device is present
    pub fn unavailable(sample_rate: u32) -> Self {
        let output = Self::new(sample_rate);
        output.set_available(false);
        output
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Render the next `seconds` of audio and return the mono samples
    pub fn advance(&self, seconds: f64) -> Vec<f32> {
        let mut scheduler = self.scheduler.lock();
        let count = (seconds * scheduler.sample_rate() as f64).round() as usize;
        let mut buf = vec![0.0; count];
        scheduler.render(&mut buf);
        buf
    }

    /// Advance the clock by `samples` without keeping the output
    pub fn advance_samples(&self, samples: u64) {
        self.scheduler.lock().skip(samples);
    }
}

impl AudioOutput for OfflineOutput {
    fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(AudioError::Unavailable("offline output disabled".to_string()))
        }
    }
}
