//! Adaptive Morse code trainer.
//!
//! Keys timed Morse challenges, scores typed transcriptions, tracks
//! per-character accuracy and moves the learner through the Koch
//! curriculum. `trainer::Trainer` ties the pieces together; a host drives
//! it with view actions and regular `tick()` calls.

pub mod audio;
pub mod clock;
pub mod config;
pub mod content;
pub mod cw;
pub mod input;
pub mod stats;
pub mod storage;
pub mod trainer;
