use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use log::{error, info, warn};

use morse_trainer::audio::{AudioOutput, OfflineOutput};
use morse_trainer::clock::SystemClock;
use morse_trainer::cw::validate_tables;
use morse_trainer::storage::{FileStore, KeyValueStore, MemoryStore};
use morse_trainer::trainer::{DrillPhase, Trainer, TrainerView};

#[cfg(feature = "device")]
use morse_trainer::audio::DeviceOutput;
#[cfg(not(feature = "device"))]
use morse_trainer::audio::DEFAULT_SAMPLE_RATE;

/// Selects the output device by name when built with `device`
#[cfg(feature = "device")]
const AUDIO_DEVICE_ENV: &str = "MORSE_TRAINER_AUDIO_DEVICE";

/// How often the trainer is ticked while waiting for input
const TICK_INTERVAL: Duration = Duration::from_millis(10);

const HELP: &str = "\
Type what you hear and press Enter to answer.
  :play          play or stop the current challenge
  :replay        play the current challenge again
  :stop          stop playback
  :skip          skip to a new challenge
  :next / :prev  change lesson level
  :coach         drill your weak characters
  :broadcast     remote-generated drill (falls back offline)
  :tab NAME      switch to train, stats or guide
  :set FIELD V   wpm, effectiveWpm, frequency, volume, apiKey,
                 contentMode, autoPlay, autoLevel
  :char C        toggle a manually unlocked character
  :status        show the current state
  :reset         restore defaults and clear progress
  :quit";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = validate_tables() {
        error!("Reference tables are corrupt: {}", e);
        std::process::exit(1);
    }

    let store: Box<dyn KeyValueStore> = match FileStore::open_default() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(target: "storage", "{}; progress will not be saved", e);
            Box::new(MemoryStore::new())
        }
    };

    let (output, offline) = open_output();
    let mut trainer = Trainer::new(store, output, Box::new(SystemClock::new()));
    attach_remote(&mut trainer);

    println!("{}\n", HELP);
    trainer.generate_next_challenge(false);
    print_view(&trainer.view());

    let lines = spawn_stdin_reader();
    let started = Instant::now();
    let mut last = trainer.view();

    loop {
        let mut handled = false;
        match lines.recv_timeout(TICK_INTERVAL) {
            Ok(line) => {
                if !handle_line(&mut trainer, line.trim()) {
                    break;
                }
                handled = true;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(offline) = &offline {
            follow_wall_clock(offline, started);
        }
        trainer.tick();

        let view = trainer.view();
        if handled || changed(&last, &view) {
            print_view(&view);
        }
        last = view;
    }

    info!("Goodbye");
}

#[cfg(feature = "device")]
fn open_output() -> (Box<dyn AudioOutput>, Option<OfflineOutput>) {
    let device = std::env::var(AUDIO_DEVICE_ENV).ok();
    for d in DeviceOutput::list_output_devices() {
        log::debug!(target: "audio", "Output device: {} ({})", d.display_name, d.internal_name);
    }
    (Box::new(DeviceOutput::new(device)), None)
}

#[cfg(not(feature = "device"))]
fn open_output() -> (Box<dyn AudioOutput>, Option<OfflineOutput>) {
    info!(target: "audio", "Built without the device feature; playback is silent");
    let output = OfflineOutput::new(DEFAULT_SAMPLE_RATE);
    (Box::new(output.clone()), Some(output))
}

#[cfg(feature = "remote")]
fn attach_remote(trainer: &mut Trainer) {
    use morse_trainer::content::remote::ChatCompletionsGenerator;
    use std::sync::Arc;

    match ChatCompletionsGenerator::from_env() {
        Ok(remote) => trainer.set_remote(Some(Arc::new(remote))),
        Err(e) => warn!(target: "content", "{}", e),
    }
}

#[cfg(not(feature = "remote"))]
fn attach_remote(_trainer: &mut Trainer) {}

/// Keep the silent output's sample clock in step with wall time
fn follow_wall_clock(output: &OfflineOutput, started: Instant) {
    let target = (started.elapsed().as_secs_f64() * output.sample_rate() as f64) as u64;
    let clock = output.clock();
    if target > clock {
        output.advance_samples(target - clock);
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Returns false when the user asked to quit
fn handle_line(trainer: &mut Trainer, line: &str) -> bool {
    let Some(command) = line.strip_prefix(':') else {
        if !line.is_empty() {
            trainer.set_input("user", line);
            trainer.handle_key("Enter");
        }
        return true;
    };

    let mut parts = command.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let arg = parts.next();
    let rest: Vec<&str> = parts.collect();

    match (verb, arg) {
        ("quit", _) | ("q", _) => return false,
        ("help", _) => println!("{}", HELP),
        ("status", _) => {}
        ("play", _) => trainer.handle_action("togglePlay"),
        ("replay", _) => trainer.handle_key("Ctrl+Space"),
        ("stop", _) => trainer.handle_key("Escape"),
        ("skip", _) => trainer.handle_action("skipWord"),
        ("next", _) => trainer.handle_action("level:next"),
        ("prev", _) => trainer.handle_action("level:prev"),
        ("coach", _) => trainer.handle_action("ai:coach"),
        ("broadcast", _) => trainer.handle_action("ai:broadcast"),
        ("reset", _) => trainer.handle_action("reset:confirm"),
        ("tab", Some(tab)) => trainer.handle_action(&format!("tab:{}", tab)),
        ("char", Some(ch)) => trainer.set_input(&format!("char:{}", ch), "toggle"),
        ("set", Some(field)) => trainer.set_input(field, &rest.join(" ")),
        _ => println!("Unknown command. Type :help for the list."),
    }
    true
}

fn changed(before: &TrainerView, after: &TrainerView) -> bool {
    before.feedback_text != after.feedback_text
        || before.current_challenge != after.current_challenge
        || before.phase != after.phase
        || before.lesson_level != after.lesson_level
}

fn print_view(view: &TrainerView) {
    let unlocked: String = view.unlocked_characters.iter().collect();
    let weak: String = view.weak_characters.iter().collect();
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "[level {} | {} | {}% over {} drills] unlocked {}{}",
        view.lesson_level,
        match view.phase {
            DrillPhase::Idle => "ready",
            DrillPhase::Playing => "playing",
            DrillPhase::AwaitingInput => "your answer",
            DrillPhase::Scoring => "scoring",
            DrillPhase::Advancing => "next drill soon",
        },
        view.overall_accuracy_percent,
        view.drill_count,
        unlocked,
        if weak.is_empty() { String::new() } else { format!(" | weak {}", weak) },
    );
    if let Some(text) = &view.feedback_text {
        let _ = writeln!(out, "  {}", text);
    }
    let _ = out.flush();
}
