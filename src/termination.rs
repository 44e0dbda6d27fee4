// src/termination.rs
//
// Episode termination policy.
//
// done = (total_steps >= max_steps)
//     OR (stable_counter >= stability_threshold AND !is_tilted)
//
// Evaluated once per step, after reward computation, on the updated
// scoring state: the step that brings total_steps to max_steps is the
// terminal one.

use serde::{Deserialize, Serialize};

use crate::config::EpisodeConfig;
use crate::reward::ScoringState;

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Step budget exhausted.
    MaxSteps,
    /// Held the stability condition long enough, untilted.
    Stabilized,
}

impl TerminationReason {
    /// Stable lowercase label for logs and step info.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::MaxSteps => "max_steps",
            TerminationReason::Stabilized => "stabilized",
        }
    }
}

/// Evaluate the termination policy. Returns None while the episode
/// continues.
pub fn check_done(cfg: &EpisodeConfig, scoring: &ScoringState) -> Option<TerminationReason> {
    if scoring.total_steps >= cfg.max_steps {
        return Some(TerminationReason::MaxSteps);
    }
    if scoring.stable_counter >= cfg.stability_threshold && !scoring.is_tilted {
        return Some(TerminationReason::Stabilized);
    }
    None
}
