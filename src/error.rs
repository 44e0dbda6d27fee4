// src/error.rs
//
// Error taxonomy for the simulation-training bridge.
//
// Four failure classes, surfaced to the caller of `reset`/`step` and never
// retried internally:
// - PortInUse: fatal at startup, the learner endpoint refuses to bind.
// - Transport: connection dropped or payload undecodable mid-episode.
// - Protocol: a message arrived out of the expected sequence or with the
//   wrong shape; episode state cannot be trusted afterwards.
// - ScoringPrecondition: a reward policy was invoked without the state it
//   requires (e.g. climb with no prior observation).
//
// Every transport/protocol error carries the exchange phase so a diagnostic
// identifies whether the reset handshake or the step exchange failed.

use crate::config::Task;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Phase of the wire protocol an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Listener bind / controller accept.
    Connect,
    /// Line-delimited reset request/ack exchange.
    ResetHandshake,
    /// Single-document action/observation exchange.
    StepExchange,
}

impl ExchangePhase {
    /// Stable lowercase label for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangePhase::Connect => "connection setup",
            ExchangePhase::ResetHandshake => "reset handshake",
            ExchangePhase::StepExchange => "step exchange",
        }
    }
}

/// Errors surfaced by the bridge core.
#[derive(Debug, Clone)]
pub enum BridgeError {
    /// The configured listening port is already occupied.
    PortInUse { port: u16 },
    /// Connection dropped or payload undecodable.
    Transport {
        phase: ExchangePhase,
        message: String,
    },
    /// Message out of sequence or with an unexpected shape.
    Protocol {
        phase: ExchangePhase,
        message: String,
    },
    /// A reward policy was invoked without its required prior state.
    ScoringPrecondition { task: Task, message: String },
}

impl BridgeError {
    pub fn transport(phase: ExchangePhase, message: impl Into<String>) -> Self {
        BridgeError::Transport {
            phase,
            message: message.into(),
        }
    }

    pub fn protocol(phase: ExchangePhase, message: impl Into<String>) -> Self {
        BridgeError::Protocol {
            phase,
            message: message.into(),
        }
    }

    pub fn scoring_precondition(task: Task, message: impl Into<String>) -> Self {
        BridgeError::ScoringPrecondition {
            task,
            message: message.into(),
        }
    }

    /// True for errors that abort the current training run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::PortInUse { .. }
                | BridgeError::Transport { .. }
                | BridgeError::Protocol { .. }
        )
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::PortInUse { port } => {
                write!(
                    f,
                    "port {} is already in use; close the existing process before starting the learner endpoint",
                    port
                )
            }
            BridgeError::Transport { phase, message } => {
                write!(f, "transport failure during {}: {}", phase.as_str(), message)
            }
            BridgeError::Protocol { phase, message } => {
                write!(f, "protocol violation during {}: {}", phase.as_str(), message)
            }
            BridgeError::ScoringPrecondition { task, message } => {
                write!(
                    f,
                    "scoring precondition for task '{}': {}",
                    task.as_str(),
                    message
                )
            }
        }
    }
}

impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_identifies_phase() {
        let err = BridgeError::transport(ExchangePhase::ResetHandshake, "connection closed");
        let text = err.to_string();
        assert!(text.contains("reset handshake"), "got: {text}");

        let err = BridgeError::protocol(ExchangePhase::StepExchange, "unexpected shape");
        let text = err.to_string();
        assert!(text.contains("step exchange"), "got: {text}");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(BridgeError::PortInUse { port: 5000 }.is_fatal());
        assert!(BridgeError::transport(ExchangePhase::Connect, "x").is_fatal());
        assert!(!BridgeError::scoring_precondition(Task::Climb, "no prior observation").is_fatal());
    }
}
