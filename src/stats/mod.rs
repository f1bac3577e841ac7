//! Drill history and per-character accuracy.

mod level;

use std::collections::{BTreeMap, VecDeque};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, StorageError};

pub use level::{LevelChange, LevelController};

/// Storage key for the stats document
pub const STATS_KEY: &str = "morse-stats-v3";

/// Most history entries kept
pub const HISTORY_CAP: usize = 200;

/// Attempts a character needs before it can be judged weak
pub const WEAK_MIN_ATTEMPTS: u32 = 3;
/// Accuracy below which a character is weak
pub const WEAK_ACCURACY: f64 = 0.6;

/// One scored drill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsRecord {
    pub challenge: String,
    pub response: String,
    pub correct: bool,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharAccuracy {
    pub correct: u32,
    pub total: u32,
}

impl CharAccuracy {
    pub fn ratio(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f64 / self.total as f64)
        }
    }

    pub fn is_weak(&self) -> bool {
        self.total > WEAK_MIN_ATTEMPTS
            && self.ratio().map(|r| r < WEAK_ACCURACY).unwrap_or(false)
    }
}

pub type AccuracyMap = BTreeMap<char, CharAccuracy>;

/// Characters meeting the weak criterion, in character order
pub fn weak_characters(accuracy: &AccuracyMap) -> Vec<char> {
    accuracy
        .iter()
        .filter(|(_, a)| a.is_weak())
        .map(|(c, _)| *c)
        .collect()
}

/// Upper-case and trim; interior spacing is kept as typed
pub fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

/// Scored history (most recent first) and per-character accuracy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub history: VecDeque<StatsRecord>,
    pub accuracy: AccuracyMap,
}

impl Stats {
    /// Score `actual` against `expected` and record the outcome.
    /// Returns whether the whole answer was correct.
    pub fn record(&mut self, expected: &str, actual: &str, timestamp_ms: u64) -> bool {
        let expected_norm = normalize(expected);
        let actual_norm = normalize(actual);

        let e: Vec<char> = expected_norm.chars().collect();
        let a: Vec<char> = actual_norm.chars().collect();
        for (i, ch) in e.iter().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let entry = self.accuracy.entry(*ch).or_default();
            entry.total += 1;
            if a.get(i) == Some(ch) {
                entry.correct += 1;
            }
        }

        let correct = expected_norm == actual_norm;
        self.history.push_front(StatsRecord {
            challenge: expected_norm,
            response: actual_norm,
            correct,
            timestamp_ms,
        });
        self.history.truncate(HISTORY_CAP);
        correct
    }

    /// Percentage of characters copied correctly, 0 when nothing is recorded
    pub fn overall_accuracy(&self) -> u32 {
        let (correct, total) = self
            .accuracy
            .values()
            .fold((0u64, 0u64), |(c, t), a| (c + a.correct as u64, t + a.total as u64));
        if total == 0 {
            0
        } else {
            (100.0 * correct as f64 / total as f64).round() as u32
        }
    }

    pub fn weak_characters(&self) -> Vec<char> {
        weak_characters(&self.accuracy)
    }

    /// Fraction of the last `n` drills answered correctly; `None` until
    /// there are `n` drills
    pub fn recent_accuracy(&self, n: usize) -> Option<f64> {
        if n == 0 || self.history.len() < n {
            return None;
        }
        let correct = self.history.iter().take(n).filter(|r| r.correct).count();
        Some(correct as f64 / n as f64)
    }

    /// Load stats from the store; a missing or unreadable document yields empty stats
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let contents = match store.get(STATS_KEY) {
            Ok(Some(c)) => c,
            Ok(None) => return Self::default(),
            Err(e) => {
                warn!(target: "storage", "Failed to read stats: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Stats>(&contents) {
            Ok(mut stats) => {
                stats.repair();
                debug!(target: "storage", "Loaded {} history entries", stats.history.len());
                stats
            }
            Err(e) => {
                warn!(target: "storage", "Failed to parse stats: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        let json = serde_json::to_string(self).map_err(|e| StorageError::Serialize(e.to_string()))?;
        store.set(STATS_KEY, &json)
    }

    /// Restore invariants on data read from storage
    fn repair(&mut self) {
        self.history.truncate(HISTORY_CAP);
        for entry in self.accuracy.values_mut() {
            entry.correct = entry.correct.min(entry.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_record_counts_positions() {
        let mut stats = Stats::default();
        assert!(!stats.record("KMR", "kmx", 1));
        assert_eq!(stats.accuracy[&'K'], CharAccuracy { correct: 1, total: 1 });
        assert_eq!(stats.accuracy[&'R'], CharAccuracy { correct: 0, total: 1 });
        assert!(!stats.accuracy.contains_key(&'X'));
    }

    #[test]
    fn test_short_and_long_answers() {
        let mut stats = Stats::default();
        stats.record("KM", "", 1);
        stats.record("K", "KMMMM", 2);
        assert_eq!(stats.accuracy[&'K'], CharAccuracy { correct: 1, total: 2 });
        assert_eq!(stats.accuracy[&'M'], CharAccuracy { correct: 0, total: 1 });
    }

    #[test]
    fn test_correct_is_case_and_trim_insensitive() {
        let mut stats = Stats::default();
        assert!(stats.record("KM RS", "  km rs ", 1));
        assert!(!stats.record("KM RS", "KMRS", 2));
        assert!(!stats.record("KM RS", "KM  RS", 3));
        assert!(!stats.accuracy.contains_key(&' '));
    }

    #[test]
    fn test_history_most_recent_first_and_capped() {
        let mut stats = Stats::default();
        for i in 0..(HISTORY_CAP as u64 + 25) {
            stats.record("K", "K", i);
        }
        assert_eq!(stats.history.len(), HISTORY_CAP);
        assert_eq!(stats.history[0].timestamp_ms, HISTORY_CAP as u64 + 24);
    }

    #[test]
    fn test_correct_never_exceeds_total() {
        let mut stats = Stats::default();
        let pairs = [("KMR", "KMR"), ("SUA", "sux"), ("", "KM"), ("PTL O", "PT")];
        for (e, a) in pairs {
            stats.record(e, a, 0);
        }
        assert!(stats.accuracy.values().all(|a| a.correct <= a.total));
    }

    #[test]
    fn test_overall_accuracy_rounds() {
        let mut stats = Stats::default();
        assert_eq!(stats.overall_accuracy(), 0);
        stats.record("KMR", "KMX", 0);
        assert_eq!(stats.overall_accuracy(), 67);
    }

    #[test]
    fn test_weak_characters() {
        let mut stats = Stats::default();
        stats.accuracy.insert('M', CharAccuracy { correct: 3, total: 10 });
        stats.accuracy.insert('R', CharAccuracy { correct: 2, total: 10 });
        stats.accuracy.insert('K', CharAccuracy { correct: 9, total: 10 });
        // Not enough attempts to judge
        stats.accuracy.insert('S', CharAccuracy { correct: 0, total: 3 });
        assert_eq!(stats.weak_characters(), vec!['M', 'R']);
    }

    #[test]
    fn test_recent_accuracy() {
        let mut stats = Stats::default();
        stats.record("K", "K", 0);
        stats.record("K", "M", 1);
        assert_eq!(stats.recent_accuracy(3), None);
        assert_eq!(stats.recent_accuracy(2), Some(0.5));
        assert_eq!(stats.recent_accuracy(1), Some(0.0));
    }

    #[test]
    fn test_persist_and_reload() {
        let mut store = MemoryStore::new();
        let mut stats = Stats::default();
        stats.record("KM", "KM", 10);
        stats.record("RS", "RX", 20);
        stats.save(&mut store).unwrap();
        assert_eq!(Stats::load(&store), stats);
    }

    #[test]
    fn test_load_repairs_invariants() {
        let mut store = MemoryStore::new();
        let history: Vec<_> = (0..HISTORY_CAP + 5)
            .map(|i| serde_json::json!({"challenge": "K", "response": "K", "correct": true, "timestampMs": i}))
            .collect();
        let doc = serde_json::json!({
            "history": history,
            "accuracy": {"K": {"correct": 9, "total": 4}},
            "extra": 1
        });
        store.set(STATS_KEY, &doc.to_string()).unwrap();

        let stats = Stats::load(&store);
        assert_eq!(stats.history.len(), HISTORY_CAP);
        assert_eq!(stats.accuracy[&'K'], CharAccuracy { correct: 4, total: 4 });
    }
}
