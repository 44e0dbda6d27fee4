// src/episode.rs
//
// Episode lifecycle state machine.
//
// Phases: AwaitingConnection -> Ready -> Stepping -> (Ready | Terminal)
// -> Resetting -> Ready -> ...
//
// Invariants enforced here rather than scattered through the facade:
// - no step is issued before a reset acknowledgment completes,
// - no two resets overlap,
// - step outside Ready is a protocol violation (no auto-recovery; a
//   failed exchange leaves the phase where it was, so state that cannot
//   be trusted stays unusable).

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult, ExchangePhase};

/// Lifecycle phase of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// Listening, no controller connected yet.
    AwaitingConnection,
    /// Connected; a step or reset may be issued.
    Ready,
    /// A step exchange is in flight.
    Stepping,
    /// Episode ended; only reset (or close) is valid.
    Terminal,
    /// A reset handshake is in flight.
    Resetting,
}

impl EpisodePhase {
    /// Stable lowercase label for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodePhase::AwaitingConnection => "awaiting_connection",
            EpisodePhase::Ready => "ready",
            EpisodePhase::Stepping => "stepping",
            EpisodePhase::Terminal => "terminal",
            EpisodePhase::Resetting => "resetting",
        }
    }
}

/// Tracks the current phase and episode counter, validating transitions.
#[derive(Debug, Clone)]
pub struct EpisodeLifecycle {
    phase: EpisodePhase,
    episode_id: u64,
}

impl EpisodeLifecycle {
    pub fn new() -> Self {
        Self {
            phase: EpisodePhase::AwaitingConnection,
            episode_id: 0,
        }
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    /// Episodes completed so far; increments on each completed reset.
    pub fn episode_id(&self) -> u64 {
        self.episode_id
    }

    /// AwaitingConnection -> Ready, on accepting the one controller link.
    pub fn on_connected(&mut self) -> BridgeResult<()> {
        match self.phase {
            EpisodePhase::AwaitingConnection => {
                self.phase = EpisodePhase::Ready;
                Ok(())
            }
            other => Err(BridgeError::protocol(
                ExchangePhase::Connect,
                format!("controller already connected (phase {})", other.as_str()),
            )),
        }
    }

    /// Ready -> Stepping. Any other phase rejects the step.
    pub fn begin_step(&mut self) -> BridgeResult<()> {
        match self.phase {
            EpisodePhase::Ready => {
                self.phase = EpisodePhase::Stepping;
                Ok(())
            }
            other => Err(BridgeError::protocol(
                ExchangePhase::StepExchange,
                format!(
                    "step() called while {}; a step is only valid from ready",
                    other.as_str()
                ),
            )),
        }
    }

    /// Stepping -> Ready (episode continues) or Terminal (done).
    pub fn complete_step(&mut self, done: bool) {
        debug_assert_eq!(self.phase, EpisodePhase::Stepping);
        self.phase = if done {
            EpisodePhase::Terminal
        } else {
            EpisodePhase::Ready
        };
    }

    /// Ready | Terminal -> Resetting. A reset is valid before the first
    /// step of a connection and after a terminal step; overlapping resets
    /// and resets before the controller link are rejected.
    pub fn begin_reset(&mut self) -> BridgeResult<()> {
        match self.phase {
            EpisodePhase::Ready | EpisodePhase::Terminal => {
                self.phase = EpisodePhase::Resetting;
                Ok(())
            }
            other => Err(BridgeError::protocol(
                ExchangePhase::ResetHandshake,
                format!(
                    "reset() called while {}; a reset is only valid from ready or terminal",
                    other.as_str()
                ),
            )),
        }
    }

    /// Resetting -> Ready, after the acknowledgment was received.
    pub fn complete_reset(&mut self) {
        debug_assert_eq!(self.phase, EpisodePhase::Resetting);
        self.phase = EpisodePhase::Ready;
        self.episode_id += 1;
    }
}

impl Default for EpisodeLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_lifecycle() {
        let mut lc = EpisodeLifecycle::new();
        assert_eq!(lc.phase(), EpisodePhase::AwaitingConnection);

        lc.on_connected().unwrap();
        assert_eq!(lc.phase(), EpisodePhase::Ready);

        lc.begin_reset().unwrap();
        assert_eq!(lc.phase(), EpisodePhase::Resetting);
        lc.complete_reset();
        assert_eq!(lc.phase(), EpisodePhase::Ready);
        assert_eq!(lc.episode_id(), 1);

        lc.begin_step().unwrap();
        lc.complete_step(false);
        assert_eq!(lc.phase(), EpisodePhase::Ready);

        lc.begin_step().unwrap();
        lc.complete_step(true);
        assert_eq!(lc.phase(), EpisodePhase::Terminal);

        lc.begin_reset().unwrap();
        lc.complete_reset();
        assert_eq!(lc.phase(), EpisodePhase::Ready);
        assert_eq!(lc.episode_id(), 2);
    }

    #[test]
    fn test_step_rejected_outside_ready() {
        let mut lc = EpisodeLifecycle::new();
        assert!(lc.begin_step().is_err(), "step before connection");

        lc.on_connected().unwrap();
        lc.begin_step().unwrap();
        lc.complete_step(true);
        let err = lc.begin_step().unwrap_err();
        assert!(err.to_string().contains("terminal"), "got: {err}");

        lc.begin_reset().unwrap();
        let err = lc.begin_step().unwrap_err();
        assert!(err.to_string().contains("resetting"), "got: {err}");
    }

    #[test]
    fn test_no_overlapping_resets() {
        let mut lc = EpisodeLifecycle::new();
        lc.on_connected().unwrap();
        lc.begin_reset().unwrap();
        assert!(lc.begin_reset().is_err());
    }

    #[test]
    fn test_reset_rejected_before_connection() {
        let mut lc = EpisodeLifecycle::new();
        assert!(lc.begin_reset().is_err());
    }

    #[test]
    fn test_single_connection_only() {
        let mut lc = EpisodeLifecycle::new();
        lc.on_connected().unwrap();
        assert!(lc.on_connected().is_err());
    }
}
