use std::collections::VecDeque;

use log::{debug, warn};

use super::{AudioError, AudioOutput, ScheduledTone};
use crate::cw::{MorseSchedule, TimingParameters};

/// Delay between `play()` and the first tone so the whole message is queued
/// before the clock reaches it
const SCHEDULE_LEAD_SECONDS: f64 = 0.05;

pub type PlaybackId = u64;

/// Everything needed to key one message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    pub timing: TimingParameters,
    pub frequency: f32,
    pub volume: f32,
}

/// Returned by `play()`; identifies the playback in later events
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackHandle {
    pub id: PlaybackId,
    pub tone_count: usize,
    /// Seconds from the first tone to the end of the last
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Scheduling,
    Playing,
    Canceling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEvent {
    FirstToneStarted(PlaybackId),
    Completed(PlaybackId),
    Canceled(PlaybackId),
}

struct ActivePlayback {
    id: PlaybackId,
    first_tone_at: u64,
    ends_at: u64,
}

/// Morse synthesizer: turns text into tones on an `AudioOutput` and reports
/// progress as the output clock moves.
///
/// Nothing here blocks. The owner calls `poll()` to collect events once the
/// clock has advanced.
pub struct MorseSynth {
    output: Box<dyn AudioOutput>,
    state: PlaybackState,
    next_id: PlaybackId,
    current: Option<ActivePlayback>,
    silent_at: u64,
    events: VecDeque<SynthEvent>,
}

impl MorseSynth {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            state: PlaybackState::Idle,
            next_id: 1,
            current: None,
            silent_at: 0,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// True from scheduling until completion or `stop()`
    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Scheduling | PlaybackState::Playing)
    }

    /// Key `text`. Any playback in progress is canceled first.
    pub fn play(&mut self, text: &str, params: &PlaybackParams) -> Result<PlaybackHandle, AudioError> {
        if self.is_playing() {
            self.stop();
        }

        if let Err(e) = self.output.resume() {
            warn!(target: "audio", "Cannot start playback: {}", e);
            return Err(e);
        }

        let schedule = MorseSchedule::build(&text.to_uppercase(), &params.timing);
        let id = self.next_id;
        self.next_id += 1;

        if schedule.is_empty() {
            debug!(target: "audio", "Playback {} has nothing to key", id);
            self.events.push_back(SynthEvent::Completed(id));
            return Ok(PlaybackHandle {
                id,
                tone_count: 0,
                duration: 0.0,
            });
        }

        let tones = {
            let scheduler = self.output.scheduler();
            let mut scheduler = scheduler.lock();
            let rate = scheduler.sample_rate() as f64;
            let base = scheduler.clock() + (SCHEDULE_LEAD_SECONDS * rate).round() as u64;

            let tones: Vec<ScheduledTone> = schedule
                .tones
                .iter()
                .map(|t| ScheduledTone {
                    start: base + (t.offset * rate).round() as u64,
                    length: ((t.duration * rate).round() as u64).max(1),
                    frequency: params.frequency,
                    volume: params.volume.clamp(0.0, 1.0),
                })
                .collect();
            scheduler.enqueue(tones.iter().copied());
            tones
        };

        let first = tones[0];
        let last = tones[tones.len() - 1];
        self.current = Some(ActivePlayback {
            id,
            first_tone_at: first.start,
            ends_at: last.start + last.length,
        });
        self.state = PlaybackState::Scheduling;

        debug!(
            target: "audio",
            "Playback {} scheduled: {} tones over {:.2}s at {} Hz",
            id,
            tones.len(),
            schedule.duration,
            params.frequency
        );

        Ok(PlaybackHandle {
            id,
            tone_count: tones.len(),
            duration: schedule.duration,
        })
    }

    /// Cancel any scheduled tones and fade out the sounding one
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }

        self.silent_at = self.output.scheduler().lock().cancel();
        if let Some(active) = self.current.take() {
            debug!(target: "audio", "Playback {} canceled", active.id);
            self.events.push_back(SynthEvent::Canceled(active.id));
        }
        self.state = if self.silent_at > self.output.clock() {
            PlaybackState::Canceling
        } else {
            PlaybackState::Idle
        };
    }

    /// Check the output clock and collect events that have become due
    pub fn poll(&mut self) -> Vec<SynthEvent> {
        let clock = self.output.clock();

        if self.state == PlaybackState::Scheduling {
            if let Some(active) = &self.current {
                if clock >= active.first_tone_at {
                    self.events.push_back(SynthEvent::FirstToneStarted(active.id));
                    self.state = PlaybackState::Playing;
                }
            }
        }

        if self.state == PlaybackState::Playing {
            let done = self.current.as_ref().map(|a| clock >= a.ends_at).unwrap_or(true);
            if done {
                if let Some(active) = self.current.take() {
                    debug!(target: "audio", "Playback {} completed", active.id);
                    self.events.push_back(SynthEvent::Completed(active.id));
                }
                self.state = PlaybackState::Idle;
            }
        }

        if self.state == PlaybackState::Canceling && clock >= self.silent_at {
            self.state = PlaybackState::Idle;
        }

        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OfflineOutput;

    fn params() -> PlaybackParams {
        PlaybackParams {
            timing: TimingParameters::new(20.0, 20.0),
            frequency: 600.0,
            volume: 0.5,
        }
    }

    fn synth() -> (MorseSynth, OfflineOutput) {
        let output = OfflineOutput::new(48_000);
        (MorseSynth::new(Box::new(output.clone())), output)
    }

    #[test]
    fn test_events_in_order_on_natural_completion() {
        let (mut synth, output) = synth();
        let handle = synth.play("km", &params()).unwrap();
        assert_eq!(synth.state(), PlaybackState::Scheduling);
        assert!(synth.is_playing());
        assert!(synth.poll().is_empty());

        output.advance(0.06);
        assert_eq!(synth.poll(), vec![SynthEvent::FirstToneStarted(handle.id)]);
        assert_eq!(synth.state(), PlaybackState::Playing);

        output.advance(handle.duration + 0.05);
        assert_eq!(synth.poll(), vec![SynthEvent::Completed(handle.id)]);
        assert!(!synth.is_playing());
        assert_eq!(synth.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_both_events_in_one_poll_keep_order() {
        let (mut synth, output) = synth();
        let handle = synth.play("E", &params()).unwrap();
        output.advance(1.0);
        assert_eq!(
            synth.poll(),
            vec![
                SynthEvent::FirstToneStarted(handle.id),
                SynthEvent::Completed(handle.id)
            ]
        );
    }

    #[test]
    fn test_empty_text_completes_immediately() {
        let (mut synth, output) = synth();
        let handle = synth.play("", &params()).unwrap();
        assert_eq!(handle.tone_count, 0);
        assert!(!synth.is_playing());
        assert_eq!(synth.poll(), vec![SynthEvent::Completed(handle.id)]);
        assert!(!output.scheduler().lock().is_busy());
    }

    #[test]
    fn test_stop_cancels_without_further_events() {
        let (mut synth, output) = synth();
        let handle = synth.play("TEST", &params()).unwrap();
        synth.stop();
        assert!(!synth.is_playing());
        assert_eq!(synth.poll(), vec![SynthEvent::Canceled(handle.id)]);

        // Well past where the message would have ended: nothing sounds, nothing fires
        let rendered = output.advance(5.0);
        assert!(rendered.iter().all(|s| *s == 0.0));
        assert!(synth.poll().is_empty());
        assert_eq!(synth.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_stop_mid_tone_fades_within_ten_ms() {
        let (mut synth, output) = synth();
        synth.play("TTTT", &params()).unwrap();
        output.advance(0.1);
        synth.poll();
        synth.stop();
        assert_eq!(synth.state(), PlaybackState::Canceling);
        assert!(!synth.is_playing());

        let fade = output.advance(0.010);
        assert!(fade.last().map(|s| s.abs() < 1e-3).unwrap_or(true));
        synth.poll();
        assert_eq!(synth.state(), PlaybackState::Idle);
        assert!(output.advance(1.0).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_play_replaces_active_playback() {
        let (mut synth, output) = synth();
        let first = synth.play("PARIS", &params()).unwrap();
        let second = synth.play("E", &params()).unwrap();
        assert_ne!(first.id, second.id);

        output.advance(2.0);
        assert_eq!(
            synth.poll(),
            vec![
                SynthEvent::Canceled(first.id),
                SynthEvent::FirstToneStarted(second.id),
                SynthEvent::Completed(second.id)
            ]
        );
    }

    #[test]
    fn test_unavailable_output_stays_idle() {
        let output = OfflineOutput::unavailable(48_000);
        let mut synth = MorseSynth::new(Box::new(output));
        let result = synth.play("K", &params());
        assert!(matches!(result, Err(AudioError::Unavailable(_))));
        assert_eq!(synth.state(), PlaybackState::Idle);
        assert!(synth.poll().is_empty());
    }
}
