//! Drill coordinator.
//!
//! `Trainer` owns settings, stats, the synthesizer and the drill state
//! machine. It never blocks: the host calls `tick()` regularly to deliver
//! audio-clock events, collect remote replies and fire the auto-advance
//! timer. Failures become
//! feedback notices or log lines, never errors returned to the view.

mod drill;
mod view;

use std::sync::Arc;

use crossbeam_channel::TryRecvError;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio::{AudioOutput, MorseSynth, PlaybackParams, SynthEvent};
use crate::clock::Clock;
use crate::config::{ContentMode, Settings};
use crate::content::{self, GeneratorInput, Hints, RemoteError, RemoteGenerator, REMOTE_BUDGET};
use crate::input::{parse_action, parse_field, parse_flag, parse_key, Action, InputField, Key, Tab};
use crate::stats::{LevelChange, LevelController, Stats};
use crate::storage::{KeyValueStore, StorageError};

pub use drill::{DrillPhase, DrillState};
pub use view::{FeedbackClass, Notice, TrainerView};

use drill::{ActivePlayback, PendingAdvance, PendingRemote};

/// Delay between a correct answer and the next drill
pub const AUTO_ADVANCE_DELAY_MS: u64 = 1200;

pub struct Trainer {
    settings: Settings,
    stats: Stats,
    levels: LevelController,
    synth: MorseSynth,
    store: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    rng: StdRng,
    remote: Option<Arc<dyn RemoteGenerator>>,

    drill: DrillState,
    phase: DrillPhase,
    playback: Option<ActivePlayback>,
    advance: Option<PendingAdvance>,
    remote_request: Option<PendingRemote>,
    user_input: String,
    drill_count: u32,

    feedback: Option<Notice>,
    tab: Tab,
    settings_open: bool,
    storage_warned: bool,
}

impl Trainer {
    /// Restore settings and stats from `store` and start idle
    pub fn new(store: Box<dyn KeyValueStore>, output: Box<dyn AudioOutput>, clock: Box<dyn Clock>) -> Self {
        Self::with_rng(store, output, clock, StdRng::from_os_rng())
    }

    pub fn with_rng(
        store: Box<dyn KeyValueStore>,
        output: Box<dyn AudioOutput>,
        clock: Box<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let settings = Settings::load(store.as_ref());
        let stats = Stats::load(store.as_ref());
        info!(
            target: "trainer",
            "Starting at level {} ({} wpm, {} history entries)",
            settings.lesson_level,
            settings.wpm,
            stats.history.len()
        );

        Self {
            settings,
            stats,
            levels: LevelController::new(),
            synth: MorseSynth::new(output),
            store,
            clock,
            rng,
            remote: None,
            drill: DrillState::default(),
            phase: DrillPhase::Idle,
            playback: None,
            advance: None,
            remote_request: None,
            user_input: String::new(),
            drill_count: 0,
            feedback: None,
            tab: Tab::Train,
            settings_open: false,
            storage_warned: false,
        }
    }

    /// Attach or detach the remote challenge provider
    pub fn set_remote(&mut self, remote: Option<Arc<dyn RemoteGenerator>>) {
        self.remote = remote;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn phase(&self) -> DrillPhase {
        self.phase
    }

    pub fn drill(&self) -> &DrillState {
        &self.drill
    }

    pub fn feedback(&self) -> Option<&Notice> {
        self.feedback.as_ref()
    }

    pub fn view(&self) -> TrainerView {
        TrainerView {
            current_challenge: self.drill.current_challenge.clone(),
            has_played_current: self.drill.has_played_current,
            is_playing: self.synth.is_playing(),
            phase: self.phase,
            feedback_text: self.feedback.as_ref().map(|n| n.to_string()),
            feedback_class: self.feedback.as_ref().map(|n| n.class()),
            overall_accuracy_percent: self.stats.overall_accuracy(),
            drill_count: self.drill_count,
            history: self.stats.history.iter().cloned().collect(),
            unlocked_characters: content::unlocked_characters(self.settings.lesson_level, &self.settings.manual_chars),
            weak_characters: self.stats.weak_characters(),
            lesson_level: self.settings.lesson_level,
            content_mode: self.settings.content_mode,
            active_tab: self.tab,
            settings_open: self.settings_open,
        }
    }

    // ---- Input surface ----

    /// Dispatch a named view action. Unknown names are logged and ignored.
    pub fn handle_action(&mut self, name: &str) {
        match parse_action(name) {
            Some(action) => self.dispatch(action),
            None => warn!(target: "trainer", "Ignoring unknown action {:?}", name),
        }
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!(target: "trainer", "Action {:?} in {:?}", action, self.phase);
        match action {
            Action::TogglePlay => self.toggle_play(),
            Action::SkipWord => self.skip(),
            Action::SubmitAnswer => self.submit(),
            Action::LevelNext => self.change_level(1),
            Action::LevelPrev => self.change_level(-1),
            Action::SelectTab(tab) => self.select_tab(tab),
            Action::OpenSettings => self.settings_open = true,
            Action::CloseSettings => self.settings_open = false,
            Action::Broadcast => self.broadcast(),
            Action::Coach => self.coach(),
            Action::ConfirmReset => self.reset(),
        }
    }

    /// Apply a value typed into a named field
    pub fn set_input(&mut self, name: &str, value: &str) {
        let Some(field) = parse_field(name) else {
            warn!(target: "trainer", "Ignoring unknown input {:?}", name);
            return;
        };

        let number = || value.trim().parse::<f32>().ok();
        match field {
            InputField::User => {
                self.user_input = value.to_string();
                if self.phase == DrillPhase::Playing && !value.trim().is_empty() {
                    self.phase = DrillPhase::AwaitingInput;
                }
                return;
            }
            InputField::Wpm => match number() {
                Some(v) => self.settings.set_wpm(v),
                None => return,
            },
            InputField::EffectiveWpm => match number() {
                Some(v) => self.settings.set_effective_wpm(v),
                None => return,
            },
            InputField::Frequency => match number() {
                Some(v) => {
                    self.settings.frequency = v;
                    self.settings.normalize();
                }
                None => return,
            },
            InputField::Volume => match number() {
                Some(v) => {
                    self.settings.volume = v;
                    self.settings.normalize();
                }
                None => return,
            },
            InputField::ApiKey => {
                let key = value.trim();
                self.settings.api_key = if key.is_empty() { None } else { Some(key.to_string()) };
            }
            InputField::ContentMode => match ContentMode::from_name(value) {
                Some(mode) => self.settings.content_mode = mode,
                None => return,
            },
            InputField::AutoPlay => match parse_flag(value) {
                Some(flag) => self.settings.auto_play = flag,
                None => return,
            },
            InputField::AutoLevel => match parse_flag(value) {
                Some(flag) => self.settings.auto_level = flag,
                None => return,
            },
            InputField::CharToggle(ch) => {
                let applied = match parse_flag(value) {
                    Some(unlocked) => self.settings.set_char(ch, unlocked),
                    None => self.settings.toggle_char(ch),
                };
                if !applied {
                    debug!(target: "trainer", "Cannot unlock {:?}", ch);
                    return;
                }
            }
        }
        self.persist_settings();
    }

    pub fn handle_key(&mut self, name: &str) {
        match parse_key(name) {
            Some(Key::Enter) => self.submit(),
            Some(Key::Escape) => self.stop_playback(),
            Some(Key::CtrlSpace) => self.replay(),
            None => debug!(target: "trainer", "Unbound key {:?}", name),
        }
    }

    // ---- Event loop ----

    /// Deliver synthesizer events, collect a remote reply and fire the
    /// advance timer if due
    pub fn tick(&mut self) {
        for event in self.synth.poll() {
            self.on_synth_event(event);
        }

        self.poll_remote();

        if let Some(advance) = self.advance {
            if self.clock.now_ms() >= advance.due_ms {
                self.advance = None;
                // Autoplay is decided when the timer fires, not when it was set
                let autoplay = self.settings.auto_play && self.tab == Tab::Train;
                self.generate_next_challenge(autoplay);
            }
        }
    }

    /// Install the remote reply once it arrives, or an offline drill once
    /// the budget has run out
    fn poll_remote(&mut self) {
        let Some(pending) = &self.remote_request else {
            return;
        };
        let reply = match pending.reply.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Disconnected) => Err(RemoteError::Failed("provider thread exited".to_string())),
            Err(TryRecvError::Empty) if self.clock.now_ms() >= pending.due_ms => Err(RemoteError::Timeout),
            Err(TryRecvError::Empty) => return,
        };
        let Some(pending) = self.remote_request.take() else {
            return;
        };

        let unlocked = content::unlocked_characters(self.settings.lesson_level, &self.settings.manual_chars);
        let remote = match reply {
            Ok(text) => content::accept_remote(&text, &unlocked),
            Err(e) => {
                debug!(target: "trainer", "{}; generating offline", e);
                None
            }
        };
        let challenge = match remote {
            Some(challenge) => challenge,
            None => {
                let input = GeneratorInput {
                    lesson_level: self.settings.lesson_level,
                    manual_chars: &self.settings.manual_chars,
                    accuracy: &self.stats.accuracy,
                    mode: self.settings.content_mode,
                };
                content::offline(&input, pending.bias_weak_chars, &mut self.rng)
            }
        };
        // The learner may have left the train tab while waiting
        let autoplay = pending.autoplay && self.tab == Tab::Train;
        self.install_challenge(challenge, autoplay);
    }

    fn on_synth_event(&mut self, event: SynthEvent) {
        let current = self.playback.map(|p| p.id);
        match event {
            SynthEvent::FirstToneStarted(id) if Some(id) == current => {
                self.drill.has_played_current = true;
            }
            SynthEvent::Completed(id) if Some(id) == current => {
                self.playback = None;
                if self.phase == DrillPhase::Playing {
                    self.phase = DrillPhase::AwaitingInput;
                }
            }
            SynthEvent::Canceled(id) if Some(id) == current => {
                self.playback = None;
            }
            stale => debug!(target: "trainer", "Dropping stale {:?}", stale),
        }
    }

    // ---- Drill operations ----

    /// Generate a fresh challenge in the current content mode and
    /// optionally start playing it
    pub fn generate_next_challenge(&mut self, autoplay: bool) {
        self.generate_with(Hints::default(), autoplay);
    }

    /// Offline requests are answered at once. A remote request is left
    /// pending for `tick()` to collect.
    fn generate_with(&mut self, hints: Hints, autoplay: bool) {
        self.stop_playback();
        self.remote_request = None;
        self.advance = None;
        if self.phase == DrillPhase::Advancing {
            self.phase = DrillPhase::Idle;
        }

        let input = GeneratorInput {
            lesson_level: self.settings.lesson_level,
            manual_chars: &self.settings.manual_chars,
            accuracy: &self.stats.accuracy,
            mode: self.settings.content_mode,
        };

        if let Some(remote) = hints.remote {
            let prompt = content::remote_prompt(&input, hints.bias_weak_chars);
            let reply = content::spawn_request(remote, prompt, self.settings.api_key.clone());
            let due_ms = self.clock.now_ms() + REMOTE_BUDGET.as_millis() as u64;
            debug!(target: "trainer", "Remote challenge requested, due by {}", due_ms);
            self.remote_request = Some(PendingRemote {
                reply,
                due_ms,
                bias_weak_chars: hints.bias_weak_chars,
                autoplay,
            });
            return;
        }

        let challenge = content::offline(&input, hints.bias_weak_chars, &mut self.rng);
        self.install_challenge(challenge, autoplay);
    }

    fn install_challenge(&mut self, challenge: String, autoplay: bool) {
        debug!(target: "trainer", "Next challenge {:?}", challenge);

        self.drill = DrillState::fresh(challenge);
        self.user_input.clear();
        self.phase = DrillPhase::Idle;

        if autoplay {
            self.play_current();
        }
    }

    fn play_current(&mut self) {
        let Some(challenge) = self.drill.current_challenge.clone() else {
            return;
        };

        let params = PlaybackParams {
            timing: self.settings.timing(),
            frequency: self.settings.frequency,
            volume: self.settings.volume,
        };
        match self.synth.play(&challenge, &params) {
            Ok(handle) => {
                self.playback = Some(ActivePlayback { id: handle.id });
                if self.phase != DrillPhase::Advancing {
                    self.phase = DrillPhase::Playing;
                }
            }
            Err(e) => {
                warn!(target: "trainer", "Playback failed: {}", e);
                self.playback = None;
                if self.phase != DrillPhase::Advancing {
                    self.phase = DrillPhase::AwaitingInput;
                }
                self.feedback = Some(Notice::AudioUnavailable);
            }
        }
    }

    fn stop_playback(&mut self) {
        if self.synth.is_playing() {
            self.synth.stop();
        }
        if self.phase == DrillPhase::Playing {
            self.phase = DrillPhase::AwaitingInput;
        }
    }

    fn toggle_play(&mut self) {
        if self.synth.is_playing() {
            self.stop_playback();
        } else {
            self.replay();
        }
    }

    /// Play the current challenge again, or start a new one if there is none
    fn replay(&mut self) {
        if self.drill.current_challenge.is_some() {
            self.play_current();
        } else {
            self.generate_next_challenge(true);
        }
    }

    fn submit(&mut self) {
        let Some(challenge) = self.drill.current_challenge.clone() else {
            debug!(target: "trainer", "Submit with no challenge");
            return;
        };
        if self.phase == DrillPhase::Advancing {
            return;
        }
        if self.user_input.trim().is_empty() {
            self.feedback = Some(Notice::EmptyInput);
            return;
        }
        if !self.drill.has_played_current {
            self.feedback = Some(Notice::NotHeardYet);
            return;
        }

        self.phase = DrillPhase::Scoring;
        let now = self.clock.now_ms();
        let correct = self.stats.record(&challenge, &self.user_input, now);
        self.drill_count += 1;
        self.drill.last_correct = Some(correct);
        self.persist_stats();

        let level_change = self.check_level(correct);

        if correct {
            self.stop_playback();
            self.drill.awaiting_score = false;
            self.user_input.clear();
            self.advance = Some(PendingAdvance {
                due_ms: now + AUTO_ADVANCE_DELAY_MS,
            });
            self.phase = DrillPhase::Advancing;
            self.feedback = Some(Notice::Correct(level_change));
        } else {
            self.phase = DrillPhase::AwaitingInput;
            self.feedback = Some(Notice::Incorrect { expected: challenge });
        }
        info!(
            target: "trainer",
            "Drill {} scored {} (overall {}%)",
            self.drill_count,
            if correct { "correct" } else { "wrong" },
            self.stats.overall_accuracy()
        );
    }

    fn check_level(&mut self, correct: bool) -> Option<LevelChange> {
        if !self.settings.auto_level {
            return None;
        }
        let change = self.levels.observe(correct, self.settings.lesson_level)?;
        self.settings.lesson_level = match change {
            LevelChange::Promoted(level) | LevelChange::Demoted(level) => level,
        };
        self.persist_settings();
        Some(change)
    }

    fn skip(&mut self) {
        self.advance = None;
        self.remote_request = None;
        self.stop_playback();
        if let Some(challenge) = self.drill.current_challenge.take() {
            self.feedback = Some(Notice::Skipped { challenge });
        }
        self.generate_next_challenge(false);
    }

    /// Manual level change; clears the auto-level evidence
    pub fn change_level(&mut self, delta: i32) {
        if self.settings.change_level(delta) {
            self.levels.reset();
            self.feedback = Some(Notice::LevelSet(self.settings.lesson_level));
            self.persist_settings();
        }
    }

    pub fn toggle_char(&mut self, ch: char) {
        if self.settings.toggle_char(ch) {
            self.persist_settings();
        }
    }

    fn select_tab(&mut self, tab: Tab) {
        if tab != Tab::Train {
            self.stop_playback();
        }
        self.tab = tab;
    }

    fn broadcast(&mut self) {
        let hints = Hints {
            remote: self.remote.clone(),
            ..Hints::default()
        };
        self.generate_with(hints, true);
    }

    fn coach(&mut self) {
        let hints = Hints {
            bias_weak_chars: true,
            remote: self.remote.clone(),
            ..Hints::default()
        };
        self.generate_with(hints, true);
        let unlocked = content::unlocked_characters(self.settings.lesson_level, &self.settings.manual_chars);
        let weak = self
            .stats
            .weak_characters()
            .into_iter()
            .filter(|c| unlocked.contains(c))
            .collect();
        if self.feedback != Some(Notice::AudioUnavailable) {
            self.feedback = Some(Notice::Coaching { weak });
        }
    }

    /// Restore default settings and clear all progress
    pub fn reset(&mut self) {
        self.advance = None;
        self.remote_request = None;
        self.stop_playback();
        self.playback = None;

        self.settings = Settings::default();
        self.stats = Stats::default();
        self.levels.reset();
        self.drill = DrillState::default();
        self.phase = DrillPhase::Idle;
        self.user_input.clear();
        self.drill_count = 0;
        self.feedback = Some(Notice::Reset);

        self.persist_settings();
        self.persist_stats();
        info!(target: "trainer", "Reset to defaults");
    }

    // ---- Persistence ----

    fn persist_settings(&mut self) {
        let result = self.settings.save(self.store.as_mut());
        self.note_storage(result);
    }

    fn persist_stats(&mut self) {
        let result = self.stats.save(self.store.as_mut());
        self.note_storage(result);
    }

    /// Storage failures are logged once; the trainer carries on in memory
    fn note_storage(&mut self, result: Result<(), StorageError>) {
        if let Err(e) = result {
            if !self.storage_warned {
                warn!(target: "storage", "{}; continuing without saving", e);
                self.storage_warned = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OfflineOutput;
    use crate::clock::ManualClock;
    use crate::stats::CharAccuracy;
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;

    struct Harness {
        trainer: Trainer,
        output: OfflineOutput,
        clock: ManualClock,
        store: Arc<Mutex<MemoryStore>>,
    }

    fn harness_with(store: Arc<Mutex<MemoryStore>>, output: OfflineOutput) -> Harness {
        let clock = ManualClock::new();
        let trainer = Trainer::with_rng(
            Box::new(store.clone()),
            Box::new(output.clone()),
            Box::new(clock.clone()),
            StdRng::seed_from_u64(42),
        );
        Harness {
            trainer,
            output,
            clock,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(Mutex::new(MemoryStore::new())), OfflineOutput::new(48_000))
    }

    impl Harness {
        /// Let audio and timers run for `ms`
        fn run(&mut self, ms: u64) {
            self.output.advance(ms as f64 / 1000.0);
            self.clock.advance(ms);
            self.trainer.tick();
        }

        fn answer(&mut self, text: &str) {
            self.trainer.set_input("user", text);
            self.trainer.handle_action("submitAnswer");
        }

        fn challenge(&self) -> String {
            self.trainer.drill.current_challenge.clone().unwrap_or_default()
        }

        /// Put a heard challenge in front of the learner
        fn heard(&mut self, challenge: &str) {
            self.trainer.drill = DrillState::fresh(challenge.to_string());
            self.trainer.drill.has_played_current = true;
            self.trainer.phase = DrillPhase::AwaitingInput;
        }
    }

    #[test]
    fn test_correct_answer_without_autoplay() {
        let mut h = harness();
        h.trainer.generate_next_challenge(false);
        let challenge = h.challenge();
        assert!(!challenge.is_empty());
        assert!(!h.trainer.view().is_playing);

        h.trainer.drill.has_played_current = true;
        h.answer(&challenge);

        let view = h.trainer.view();
        assert!(view.history[0].correct);
        assert_eq!(view.overall_accuracy_percent, 100);
        assert_eq!(view.current_challenge.as_deref(), Some(challenge.as_str()));
        assert_eq!(view.feedback_class, Some(FeedbackClass::Success));
        assert!(!view.is_playing);

        // Timer fires; the next drill is prepared but not played
        h.run(AUTO_ADVANCE_DELAY_MS);
        assert!(!h.trainer.view().is_playing);
        assert_eq!(h.trainer.phase(), DrillPhase::Idle);
        assert!(!h.trainer.drill().has_played_current);
    }

    #[test]
    fn test_auto_advance_plays_next_drill() {
        let mut h = harness();
        h.trainer.settings.auto_play = true;
        h.heard("KM");
        h.answer("KM");
        assert_eq!(h.trainer.phase(), DrillPhase::Advancing);

        h.run(AUTO_ADVANCE_DELAY_MS - 1);
        assert_eq!(h.challenge(), "KM");

        h.run(1);
        assert_ne!(h.challenge(), "KM");
        assert!(h.trainer.view().is_playing);
        assert_eq!(h.trainer.phase(), DrillPhase::Playing);
    }

    #[test]
    fn test_autoplay_skipped_off_train_tab() {
        let mut h = harness();
        h.trainer.settings.auto_play = true;
        h.heard("KM");
        h.answer("KM");
        h.trainer.handle_action("tab:stats");
        h.run(AUTO_ADVANCE_DELAY_MS);
        assert_ne!(h.challenge(), "KM");
        assert!(!h.trainer.view().is_playing);
    }

    #[test]
    fn test_auto_promote_after_ten_correct() {
        let mut h = harness();
        h.trainer.settings.lesson_level = 5;
        for i in 0..10 {
            assert_eq!(h.trainer.settings().lesson_level, 5, "drill {}", i);
            h.heard("A");
            h.answer("A");
            h.run(AUTO_ADVANCE_DELAY_MS);
        }
        assert_eq!(h.trainer.settings().lesson_level, 6);
        assert_eq!(Settings::load(&h.store).lesson_level, 6);
    }

    #[test]
    fn test_auto_demote_on_poor_run() {
        let mut h = harness();
        h.trainer.settings.lesson_level = 5;
        let pattern = [true, true, false, false];
        for i in 0..15 {
            h.heard("KM");
            h.answer(if pattern[i % 4] { "KM" } else { "MK" });
            h.run(AUTO_ADVANCE_DELAY_MS);
        }
        assert!(h.trainer.settings().lesson_level < 5);
    }

    #[test]
    fn test_auto_level_disabled() {
        let mut h = harness();
        h.trainer.settings.lesson_level = 5;
        h.trainer.settings.auto_level = false;
        for _ in 0..12 {
            h.heard("A");
            h.answer("A");
            h.run(AUTO_ADVANCE_DELAY_MS);
        }
        assert_eq!(h.trainer.settings().lesson_level, 5);
    }

    #[test]
    fn test_wrong_answer_keeps_challenge() {
        let mut h = harness();
        h.heard("KMR");
        h.answer("kmx");
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
        assert_eq!(h.challenge(), "KMR");
        assert_eq!(
            h.trainer.feedback(),
            Some(&Notice::Incorrect { expected: "KMR".to_string() })
        );
        assert_eq!(h.trainer.drill().last_correct, Some(false));

        h.run(AUTO_ADVANCE_DELAY_MS * 2);
        assert_eq!(h.challenge(), "KMR");

        // Retry succeeds
        h.answer("KMR");
        assert_eq!(h.trainer.stats().history.len(), 2);
        assert!(h.trainer.stats().history[0].correct);
    }

    #[test]
    fn test_empty_input_is_not_recorded() {
        let mut h = harness();
        h.heard("KM");
        for blank in ["", "   ", "\t"] {
            h.answer(blank);
            assert_eq!(h.trainer.feedback(), Some(&Notice::EmptyInput));
        }
        assert!(h.trainer.stats().history.is_empty());
        assert!(h.trainer.stats().accuracy.is_empty());
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
    }

    #[test]
    fn test_submit_before_hearing_is_refused() {
        let mut h = harness();
        h.trainer.generate_next_challenge(false);
        let challenge = h.challenge();
        h.answer(&challenge);
        assert_eq!(h.trainer.feedback(), Some(&Notice::NotHeardYet));
        assert!(h.trainer.stats().history.is_empty());
    }

    #[test]
    fn test_playback_marks_challenge_heard() {
        let mut h = harness();
        h.trainer.handle_action("togglePlay");
        assert_eq!(h.trainer.phase(), DrillPhase::Playing);
        assert!(!h.trainer.drill().has_played_current);

        h.run(60);
        assert!(h.trainer.drill().has_played_current);

        h.run(20_000);
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
        assert!(!h.trainer.view().is_playing);
    }

    #[test]
    fn test_typing_moves_to_awaiting_input() {
        let mut h = harness();
        h.trainer.generate_next_challenge(true);
        assert_eq!(h.trainer.phase(), DrillPhase::Playing);
        h.trainer.set_input("user", "K");
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
        assert!(h.trainer.view().is_playing);
    }

    #[test]
    fn test_audio_unavailable() {
        let output = OfflineOutput::unavailable(48_000);
        let mut h = harness_with(Arc::new(Mutex::new(MemoryStore::new())), output);
        h.trainer.generate_next_challenge(true);
        assert_eq!(h.trainer.feedback(), Some(&Notice::AudioUnavailable));
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
        assert!(!h.trainer.view().is_playing);

        h.output.set_available(true);
        h.trainer.handle_key("Ctrl+Space");
        assert_eq!(h.trainer.phase(), DrillPhase::Playing);
    }

    #[test]
    fn test_escape_and_tab_switch_cancel_playback() {
        let mut h = harness();
        h.trainer.generate_next_challenge(true);
        h.run(60);
        h.trainer.handle_key("Escape");
        assert!(!h.trainer.view().is_playing);

        h.trainer.handle_key("Ctrl+Space");
        assert!(h.trainer.view().is_playing);
        h.trainer.handle_action("tab:guide");
        assert!(!h.trainer.view().is_playing);
        assert_eq!(h.trainer.view().active_tab, Tab::Guide);

        // The canceled playback never completes
        h.run(20_000);
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
    }

    #[test]
    fn test_replay_replaces_playback() {
        let mut h = harness();
        h.trainer.generate_next_challenge(true);
        let first = h.trainer.playback.map(|p| p.id);
        h.trainer.handle_key("Ctrl+Space");
        let second = h.trainer.playback.map(|p| p.id);
        assert_ne!(first, second);

        h.run(20_000);
        assert_eq!(h.trainer.playback, None);
        assert!(h.trainer.drill().has_played_current);
    }

    #[test]
    fn test_skip_cancels_timer_and_does_not_play() {
        let mut h = harness();
        h.trainer.settings.auto_play = true;
        h.heard("KM");
        h.answer("KM");
        h.trainer.handle_action("skipWord");
        let after_skip = h.challenge();
        assert!(!after_skip.is_empty());
        assert!(!h.trainer.view().is_playing);
        assert_eq!(h.trainer.feedback(), Some(&Notice::Skipped { challenge: "KM".to_string() }));

        h.run(AUTO_ADVANCE_DELAY_MS);
        assert_eq!(h.challenge(), after_skip);
        assert!(!h.trainer.view().is_playing);
    }

    #[test]
    fn test_manual_level_change_bounds() {
        let mut h = harness();
        h.trainer.handle_action("level:prev");
        assert_eq!(h.trainer.settings().lesson_level, 2);
        for _ in 0..50 {
            h.trainer.handle_action("level:next");
        }
        assert_eq!(h.trainer.settings().lesson_level, crate::cw::MAX_LEVEL);
    }

    #[test]
    fn test_manual_level_change_resets_windows() {
        let mut h = harness();
        h.trainer.settings.lesson_level = 5;
        for _ in 0..9 {
            h.heard("A");
            h.answer("A");
            h.run(AUTO_ADVANCE_DELAY_MS);
        }
        h.trainer.change_level(1);
        assert_eq!(h.trainer.settings().lesson_level, 6);
        h.heard("A");
        h.answer("A");
        assert_eq!(h.trainer.settings().lesson_level, 6);
    }

    #[test]
    fn test_settings_inputs_are_clamped_and_saved() {
        let mut h = harness();
        h.trainer.set_input("wpm", "80");
        h.trainer.set_input("effectiveWpm", "90");
        h.trainer.set_input("frequency", "5000");
        h.trainer.set_input("volume", "-1");
        h.trainer.set_input("apiKey", "  sk-abc ");
        h.trainer.set_input("char:x", "on");
        h.trainer.set_input("wpm", "fast");
        h.trainer.set_input("contentMode", "mixed");
        h.trainer.set_input("autoPlay", "on");
        h.trainer.set_input("autoLevel", "off");

        let s = h.trainer.settings();
        assert_eq!(s.wpm, 60.0);
        assert_eq!(s.effective_wpm, 60.0);
        assert_eq!(s.frequency, 1500.0);
        assert_eq!(s.volume, 0.0);
        assert_eq!(s.api_key.as_deref(), Some("sk-abc"));
        assert!(s.manual_chars.contains(&'X'));
        assert_eq!(s.content_mode, ContentMode::Mixed);
        assert!(s.auto_play);
        assert!(!s.auto_level);
        assert_eq!(&Settings::load(&h.store), s);

        assert!(h.trainer.view().unlocked_characters.contains(&'X'));
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        let mut h = harness();
        h.heard("KM");
        h.trainer.handle_action("launch:rockets");
        h.trainer.set_input("theme", "dark");
        assert_eq!(h.trainer.phase(), DrillPhase::AwaitingInput);
        assert_eq!(h.trainer.feedback(), None);
    }

    #[test]
    fn test_settings_modal() {
        let mut h = harness();
        h.trainer.handle_action("modal:settings:open");
        assert!(h.trainer.view().settings_open);
        h.trainer.handle_action("modal:settings:close");
        assert!(!h.trainer.view().settings_open);
    }

    #[test]
    fn test_reset_then_reload_yields_defaults() {
        let mut h = harness();
        h.trainer.set_input("wpm", "30");
        h.trainer.change_level(3);
        h.heard("KM");
        h.answer("KM");
        assert!(!Stats::load(&h.store).history.is_empty());

        h.trainer.handle_action("reset:confirm");
        assert_eq!(h.trainer.view().drill_count, 0);
        assert_eq!(h.trainer.view().current_challenge, None);
        assert_eq!(Settings::load(&h.store), Settings::default());
        assert_eq!(Stats::load(&h.store), Stats::default());

        // The pending advance was dropped
        h.run(AUTO_ADVANCE_DELAY_MS);
        assert_eq!(h.trainer.view().current_challenge, None);
    }

    #[test]
    fn test_state_restored_from_store() {
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let mut first = harness_with(store.clone(), OfflineOutput::new(48_000));
        first.trainer.change_level(4);
        first.heard("KM");
        first.answer("KM");

        let second = harness_with(store, OfflineOutput::new(48_000));
        assert_eq!(second.trainer.settings().lesson_level, 6);
        assert_eq!(second.trainer.stats().history.len(), 1);
    }

    #[test]
    fn test_storage_failure_keeps_trainer_running() {
        let store = Arc::new(Mutex::new(MemoryStore::failing()));
        let mut h = harness_with(store, OfflineOutput::new(48_000));
        h.trainer.set_input("wpm", "25");
        h.heard("KM");
        h.answer("KM");
        assert!(h.trainer.storage_warned);
        assert_eq!(h.trainer.settings().wpm, 25.0);
        assert_eq!(h.trainer.stats().history.len(), 1);
    }

    #[test]
    fn test_coach_reports_weak_characters() {
        let mut h = harness();
        h.trainer.settings.lesson_level = 5;
        h.trainer.stats.accuracy.insert('M', CharAccuracy { correct: 3, total: 10 });
        h.trainer.stats.accuracy.insert('R', CharAccuracy { correct: 2, total: 10 });
        h.trainer.handle_action("ai:coach");
        assert_eq!(h.trainer.feedback(), Some(&Notice::Coaching { weak: vec!['M', 'R'] }));
        assert!(h.trainer.view().is_playing);
        assert_eq!(h.trainer.view().weak_characters, vec!['M', 'R']);
    }

    #[test]
    fn test_coach_drills_weak_characters_in_any_mode() {
        let mut h = harness();
        h.trainer.settings.lesson_level = 40;
        h.trainer.settings.content_mode = ContentMode::Prosigns;
        h.trainer.stats.accuracy.insert('M', CharAccuracy { correct: 3, total: 10 });
        h.trainer.stats.accuracy.insert('R', CharAccuracy { correct: 2, total: 10 });

        for _ in 0..5 {
            h.trainer.dispatch(Action::Coach);
            let challenge = h.challenge();
            assert!(!crate::cw::PROSIGNS.iter().any(|e| e.code == challenge), "{}", challenge);
            for group in challenge.split(' ') {
                assert!((content::MIN_GROUP_LEN..=content::MAX_GROUP_LEN).contains(&group.len()), "{}", challenge);
            }
        }
    }

    /// Replies after `delay` of real time
    struct Canned(&'static str, std::time::Duration);

    impl RemoteGenerator for Canned {
        fn generate(&self, _prompt: &str, _api_key: Option<&str>) -> Result<String, RemoteError> {
            std::thread::sleep(self.1);
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_broadcast_uses_remote_provider() {
        let mut h = harness();
        h.trainer.set_remote(Some(Arc::new(Canned("km mk", std::time::Duration::ZERO))));
        h.trainer.handle_action("ai:broadcast");

        // The manual clock stands still, so only the reply can end the wait
        for _ in 0..500 {
            h.trainer.tick();
            if h.trainer.remote_request.is_none() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(h.challenge(), "KM MK");
        assert_eq!(h.trainer.phase(), DrillPhase::Playing);
    }

    #[test]
    fn test_slow_remote_falls_back_at_deadline() {
        let mut h = harness();
        h.trainer.set_remote(Some(Arc::new(Canned("km mk", std::time::Duration::from_secs(5)))));

        let started = std::time::Instant::now();
        h.trainer.dispatch(Action::Broadcast);
        assert!(started.elapsed() < std::time::Duration::from_millis(200));
        assert_eq!(h.trainer.view().current_challenge, None);

        let budget = REMOTE_BUDGET.as_millis() as u64;
        h.run(budget - 1);
        assert_eq!(h.trainer.view().current_challenge, None);
        assert!(h.trainer.remote_request.is_some());

        h.run(1);
        let challenge = h.challenge();
        let unlocked = h.trainer.view().unlocked_characters;
        assert!(!challenge.is_empty());
        assert!(challenge.chars().all(|c| c == ' ' || unlocked.contains(&c)), "{}", challenge);
        assert_eq!(h.trainer.phase(), DrillPhase::Playing);
        assert!(h.trainer.remote_request.is_none());
    }

    #[test]
    fn test_skip_and_reset_drop_pending_remote() {
        let mut h = harness();
        h.trainer.set_remote(Some(Arc::new(Canned("km mk", std::time::Duration::from_secs(5)))));

        h.trainer.dispatch(Action::Broadcast);
        h.trainer.handle_action("skipWord");
        assert!(h.trainer.remote_request.is_none());
        let after_skip = h.challenge();
        assert!(!after_skip.is_empty());
        h.run(REMOTE_BUDGET.as_millis() as u64);
        assert_eq!(h.challenge(), after_skip);
        assert!(!h.trainer.view().is_playing);

        h.trainer.dispatch(Action::Coach);
        h.trainer.handle_action("reset:confirm");
        assert!(h.trainer.remote_request.is_none());
        h.run(REMOTE_BUDGET.as_millis() as u64);
        assert_eq!(h.trainer.view().current_challenge, None);
    }

    #[test]
    fn test_char_input_sets_explicit_state() {
        let mut h = harness();
        h.trainer.set_input("char:x", "off");
        assert!(!h.trainer.settings().manual_chars.contains(&'X'));

        h.trainer.set_input("char:x", "on");
        h.trainer.set_input("char:x", "on");
        assert!(h.trainer.settings().manual_chars.contains(&'X'));

        h.trainer.set_input("char:x", "toggle");
        assert!(!h.trainer.settings().manual_chars.contains(&'X'));
        assert!(Settings::load(&h.store).manual_chars.is_empty());
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let mut h = harness();
        h.heard("KM");
        h.answer("KM");
        let json = serde_json::to_value(h.trainer.view()).unwrap();
        assert_eq!(json["currentChallenge"], "KM");
        assert_eq!(json["feedbackClass"], "success");
        assert_eq!(json["overallAccuracyPercent"], 100);
        assert_eq!(json["activeTab"], "train");
        assert_eq!(json["history"][0]["correct"], true);
    }
}
