//! Main unit stall control
//!
//! On the speech models the Z80's data lines run straight into the speech
//! chip, so a write to it freezes the Z80 (WAIT held by the busy line) until
//! the word has been spoken. The coprocessor keeps running the whole time,
//! which is why the keypad and display stay alive during speech.
//!
//! ```text
//!             playback write
//!   RUNNING ------------------> STALLED
//!      ^                           |
//!      +------- playback done -----+
//! ```
//!
//! A playback write while stalled cannot happen on the real board (the Z80
//! is frozen), so one arriving here is dropped. Every accepted playback
//! opens a new stall generation and a completion only releases the stall of
//! its own generation; a completion while running, or one left over from an
//! earlier stall, is spurious and dropped.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    #[default]
    Running,
    Stalled,
}

/// Subsystem holding the stall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallSource {
    Speech,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncController {
    state: UnitState,
    owner: Option<StallSource>,
    /// Cycles the gated unit has been allowed to run
    gated_cycles: u64,
    /// Completed stalls since power-on
    stalls: u64,
    /// Number of the current (or last) stall
    generation: u64,
}

impl SyncController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn is_stalled(&self) -> bool {
        self.state == UnitState::Stalled
    }

    pub fn owner(&self) -> Option<StallSource> {
        self.owner
    }

    /// Generation a completion must carry to release the current stall
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A playback-class write; returns false if it was dropped
    pub fn begin_playback(&mut self, source: StallSource) -> bool {
        match self.state {
            UnitState::Running => {
                log(LogCategory::Sync, LogLevel::Debug, || {
                    format!("Sync: main unit stalled by {:?}", source)
                });
                self.state = UnitState::Stalled;
                self.owner = Some(source);
                self.generation += 1;
                true
            }
            UnitState::Stalled => {
                log(LogCategory::Sync, LogLevel::Warn, || {
                    format!(
                        "Sync: playback from {:?} ignored, already stalled by {:?}",
                        source, self.owner
                    )
                });
                false
            }
        }
    }

    /// Completion of stall `generation`; returns false if spurious
    pub fn complete(&mut self, generation: u64) -> bool {
        match self.state {
            UnitState::Stalled if generation == self.generation => {
                log(LogCategory::Sync, LogLevel::Debug, || {
                    format!("Sync: {:?} done, main unit resumes", self.owner)
                });
                self.state = UnitState::Running;
                self.owner = None;
                self.stalls += 1;
                true
            }
            _ => {
                log(LogCategory::Sync, LogLevel::Debug, || {
                    format!(
                        "Sync: spurious completion for stall {} ignored (current {}, {:?})",
                        generation, self.generation, self.state
                    )
                });
                false
            }
        }
    }

    /// Account cycles for the gated unit; a no-op while stalled
    pub fn advance(&mut self, cycles: u32) -> bool {
        if self.is_stalled() {
            return false;
        }
        self.gated_cycles += u64::from(cycles);
        true
    }

    pub fn gated_cycles(&self) -> u64 {
        self.gated_cycles
    }

    pub fn completed_stalls(&self) -> u64 {
        self.stalls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_running() {
        let sync = SyncController::new();
        assert_eq!(sync.state(), UnitState::Running);
        assert_eq!(sync.owner(), None);
    }

    #[test]
    fn test_advance_is_noop_while_stalled() {
        let mut sync = SyncController::new();
        assert!(sync.advance(10));
        assert!(sync.begin_playback(StallSource::Speech));

        for _ in 0..5 {
            assert!(!sync.advance(100));
        }
        assert_eq!(sync.gated_cycles(), 10);

        assert!(sync.complete(sync.generation()));
        assert!(sync.advance(4));
        assert_eq!(sync.gated_cycles(), 14);
    }

    #[test]
    fn test_single_completion_resumes() {
        let mut sync = SyncController::new();
        sync.begin_playback(StallSource::Speech);
        assert_eq!(sync.owner(), Some(StallSource::Speech));

        assert!(sync.complete(sync.generation()));
        assert_eq!(sync.state(), UnitState::Running);

        // Second completion is spurious
        assert!(!sync.complete(sync.generation()));
        assert_eq!(sync.state(), UnitState::Running);
        assert_eq!(sync.completed_stalls(), 1);
    }

    #[test]
    fn test_playback_while_stalled_is_ignored() {
        let mut sync = SyncController::new();
        assert!(sync.begin_playback(StallSource::Speech));
        assert!(!sync.begin_playback(StallSource::Speech));

        // One completion is enough; the dropped request left nothing behind
        assert!(sync.complete(sync.generation()));
        assert!(!sync.is_stalled());
        assert!(!sync.complete(sync.generation()));
    }

    #[test]
    fn test_stale_completion_does_not_release_next_stall() {
        let mut sync = SyncController::new();
        sync.begin_playback(StallSource::Speech);
        let first = sync.generation();
        assert!(sync.complete(first));

        sync.begin_playback(StallSource::Speech);
        let second = sync.generation();
        assert_ne!(first, second);

        // Late completion of the first word
        assert!(!sync.complete(first));
        assert!(sync.is_stalled());

        assert!(sync.complete(second));
        assert!(!sync.is_stalled());
        assert_eq!(sync.completed_stalls(), 2);
    }
}
