use crossbeam_channel::Receiver;
use serde::Serialize;

use crate::audio::PlaybackId;
use crate::content::RemoteError;

/// Where the current drill stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum DrillPhase {
    #[default]
    Idle,
    Playing,
    AwaitingInput,
    Scoring,
    /// Answered correctly; the next drill is on a timer
    Advancing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillState {
    pub current_challenge: Option<String>,
    /// Set once the first tone of the current challenge has sounded
    pub has_played_current: bool,
    /// True until the current challenge is answered correctly
    pub awaiting_score: bool,
    pub last_correct: Option<bool>,
}

impl DrillState {
    pub fn fresh(challenge: String) -> Self {
        Self {
            current_challenge: Some(challenge),
            has_played_current: false,
            awaiting_score: true,
            last_correct: None,
        }
    }
}

/// Deadline for the next drill after a correct answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAdvance {
    pub due_ms: u64,
}

/// Remote challenge request still in flight. Dropping it discards the reply.
#[derive(Debug)]
pub struct PendingRemote {
    pub reply: Receiver<Result<String, RemoteError>>,
    /// Past this the drill is generated offline instead
    pub due_ms: u64,
    pub bias_weak_chars: bool,
    pub autoplay: bool,
}

/// Playback started for the current challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePlayback {
    pub id: PlaybackId,
}
