//! Drill content: the unlocked character set and challenge generation.
//!
//! Generation is a pure function of its inputs plus the caller's RNG; it
//! holds no state and never touches drill bookkeeping.

pub mod remote;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::ContentMode;
use crate::cw::{unlocked_at, ReferenceEntry, ABBREVIATIONS, CALLSIGN_PREFIXES, PROSIGNS, Q_CODES};
use crate::stats::{weak_characters, AccuracyMap};

pub use remote::{call_with_budget, spawn_request, RemoteError, RemoteGenerator, REMOTE_BUDGET};

pub const MIN_GROUPS: usize = 1;
pub const MAX_GROUPS: usize = 4;
pub const MIN_GROUP_LEN: usize = 3;
pub const MAX_GROUP_LEN: usize = 5;
/// Sampling weight of a weak character relative to the others
pub const WEAK_WEIGHT: u32 = 3;

/// Curriculum prefix for `level` followed by any extra manual characters
pub fn unlocked_characters(level: u8, manual_chars: &BTreeSet<char>) -> Vec<char> {
    let mut chars = unlocked_at(level).to_vec();
    for ch in manual_chars {
        if !chars.contains(ch) {
            chars.push(*ch);
        }
    }
    chars
}

/// What the generator works from
pub struct GeneratorInput<'a> {
    pub lesson_level: u8,
    pub manual_chars: &'a BTreeSet<char>,
    pub accuracy: &'a AccuracyMap,
    pub mode: ContentMode,
}

/// Optional steering for one request
#[derive(Clone, Default)]
pub struct Hints {
    pub bias_weak_chars: bool,
    pub remote: Option<Arc<dyn RemoteGenerator>>,
    pub api_key: Option<String>,
    /// Defaults to `REMOTE_BUDGET` when unset
    pub budget: Option<Duration>,
}

/// Produce a challenge made only of unlocked characters and single spaces.
///
/// With a remote provider in `hints` this waits up to the budget for its
/// reply. Callers that must not block use `remote_prompt` with
/// `spawn_request`, then `accept_remote` or `offline`.
pub fn generate<R: Rng + ?Sized>(input: &GeneratorInput<'_>, hints: &Hints, rng: &mut R) -> String {
    if let Some(remote) = &hints.remote {
        let prompt = remote_prompt(input, hints.bias_weak_chars);
        let budget = hints.budget.unwrap_or(REMOTE_BUDGET);
        let unlocked = unlocked_characters(input.lesson_level, input.manual_chars);
        match call_with_budget(Arc::clone(remote), prompt, hints.api_key.clone(), budget) {
            Ok(reply) => {
                if let Some(challenge) = accept_remote(&reply, &unlocked) {
                    return challenge;
                }
            }
            Err(e) => debug!(target: "content", "{}; generating offline", e),
        }
    }

    offline(input, hints.bias_weak_chars, rng)
}

/// Offline generation. When biasing towards weak characters and there are
/// any, the drill is always weighted random groups whatever the mode.
pub fn offline<R: Rng + ?Sized>(input: &GeneratorInput<'_>, bias_weak_chars: bool, rng: &mut R) -> String {
    let unlocked = unlocked_characters(input.lesson_level, input.manual_chars);
    let weak = weak_unlocked(input.accuracy, &unlocked);

    if bias_weak_chars && !weak.is_empty() {
        return synthetic(&unlocked, &weak, rng);
    }

    let mode = match input.mode {
        ContentMode::Mixed => pick_mixed_mode(&unlocked, rng),
        mode => mode,
    };

    let generated = match mode {
        ContentMode::Callsigns => callsign(&unlocked, rng),
        ContentMode::QCodes => reference_pick(Q_CODES, &unlocked, rng),
        ContentMode::Abbreviations => reference_pick(ABBREVIATIONS, &unlocked, rng),
        ContentMode::Prosigns => reference_pick(PROSIGNS, &unlocked, rng),
        ContentMode::RandomGroups | ContentMode::Mixed => None,
    };

    generated.unwrap_or_else(|| synthetic(&unlocked, &[], rng))
}

/// Prompt for a remote provider describing what the learner can copy
pub fn remote_prompt(input: &GeneratorInput<'_>, bias_weak_chars: bool) -> String {
    let unlocked = unlocked_characters(input.lesson_level, input.manual_chars);
    let weak = weak_unlocked(input.accuracy, &unlocked);
    build_prompt(&unlocked, &weak, input.mode, bias_weak_chars)
}

/// Cleaned remote reply, or `None` if nothing usable is left
pub fn accept_remote(reply: &str, unlocked: &[char]) -> Option<String> {
    let cleaned = clean_remote(reply, unlocked);
    if cleaned.is_empty() {
        debug!(target: "content", "Remote reply had no usable characters");
        return None;
    }
    info!(target: "content", "Using remote challenge ({} chars)", cleaned.len());
    Some(cleaned)
}

fn weak_unlocked(accuracy: &AccuracyMap, unlocked: &[char]) -> Vec<char> {
    weak_characters(accuracy)
        .into_iter()
        .filter(|c| unlocked.contains(c))
        .collect()
}

/// Random character groups. Characters in `weak` are drawn `WEAK_WEIGHT`
/// times as often as the rest.
pub fn synthetic<R: Rng + ?Sized>(unlocked: &[char], weak: &[char], rng: &mut R) -> String {
    if unlocked.is_empty() {
        return String::new();
    }

    let weights = unlocked
        .iter()
        .map(|c| if weak.contains(c) { WEAK_WEIGHT } else { 1 });
    let dist = WeightedIndex::new(weights).ok();

    let groups = rng.random_range(MIN_GROUPS..=MAX_GROUPS);
    let mut out = String::new();
    for g in 0..groups {
        if g > 0 {
            out.push(' ');
        }
        let len = rng.random_range(MIN_GROUP_LEN..=MAX_GROUP_LEN);
        for _ in 0..len {
            let idx = match &dist {
                Some(d) => d.sample(rng),
                None => rng.random_range(0..unlocked.len()),
            };
            out.push(unlocked[idx]);
        }
    }
    out
}

fn all_unlocked(code: &str, unlocked: &[char]) -> bool {
    code.chars().all(|c| unlocked.contains(&c))
}

fn eligible<'t>(table: &'t [ReferenceEntry], unlocked: &[char]) -> Vec<&'t ReferenceEntry> {
    table.iter().filter(|e| all_unlocked(e.code, unlocked)).collect()
}

fn reference_pick<R: Rng + ?Sized>(table: &[ReferenceEntry], unlocked: &[char], rng: &mut R) -> Option<String> {
    eligible(table, unlocked).choose(rng).map(|e| e.code.to_string())
}

/// Prefix, optional digit, then a two or three letter suffix
fn callsign<R: Rng + ?Sized>(unlocked: &[char], rng: &mut R) -> Option<String> {
    let prefixes = eligible(CALLSIGN_PREFIXES, unlocked);
    let letters: Vec<char> = unlocked.iter().copied().filter(|c| c.is_ascii_alphabetic()).collect();
    let digits: Vec<char> = unlocked.iter().copied().filter(|c| c.is_ascii_digit()).collect();

    let prefix = prefixes.choose(rng)?;
    if letters.is_empty() {
        return None;
    }

    let mut call = prefix.code.to_string();
    if rng.random_bool(0.5) {
        if let Some(d) = digits.choose(rng) {
            call.push(*d);
        }
    }
    for _ in 0..rng.random_range(2..=3) {
        if let Some(l) = letters.choose(rng) {
            call.push(*l);
        }
    }
    Some(call)
}

fn callsign_possible(unlocked: &[char]) -> bool {
    !eligible(CALLSIGN_PREFIXES, unlocked).is_empty() && unlocked.iter().any(|c| c.is_ascii_alphabetic())
}

/// Uniform choice among the modes that currently have content
fn pick_mixed_mode<R: Rng + ?Sized>(unlocked: &[char], rng: &mut R) -> ContentMode {
    let mut modes = vec![ContentMode::RandomGroups];
    if callsign_possible(unlocked) {
        modes.push(ContentMode::Callsigns);
    }
    for (mode, table) in [
        (ContentMode::QCodes, Q_CODES),
        (ContentMode::Abbreviations, ABBREVIATIONS),
        (ContentMode::Prosigns, PROSIGNS),
    ] {
        if !eligible(table, unlocked).is_empty() {
            modes.push(mode);
        }
    }
    *modes.choose(rng).unwrap_or(&ContentMode::RandomGroups)
}

/// Keep only unlocked characters, with words separated by single spaces
pub fn clean_remote(reply: &str, unlocked: &[char]) -> String {
    reply
        .to_uppercase()
        .split_whitespace()
        .map(|word| word.chars().filter(|c| unlocked.contains(c)).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_prompt(unlocked: &[char], weak: &[char], mode: ContentMode, bias_weak: bool) -> String {
    let charset: String = unlocked.iter().collect();
    let kind = match mode {
        ContentMode::RandomGroups => "random groups of 3 to 5 characters",
        ContentMode::Callsigns => "a plausible amateur radio callsign",
        ContentMode::QCodes => "a Q-code",
        ContentMode::Abbreviations => "common CW abbreviations",
        ContentMode::Prosigns => "a prosign written as its letters",
        ContentMode::Mixed => "a short realistic on-air exchange",
    };
    let mut prompt = format!(
        "Write Morse practice text: {}. Use ONLY these characters and spaces: {}. \
         At most {} words.",
        kind, charset, MAX_GROUPS
    );
    if bias_weak && !weak.is_empty() {
        let weak: String = weak.iter().collect();
        prompt.push_str(&format!(" Favour these characters the learner often misses: {}.", weak));
    }
    prompt
}
