// src/env.rs
//
// Environment facade: the learner-facing reset/step/close contract.
//
// Composes the transport channel, the episode state machine, the reward
// engine, and the termination policy into the conventional synchronous
// interface:
//
//   bind -> wait_for_controller -> (reset -> step* -> done)* -> close
//
// One request in flight at a time; a transport or protocol failure is
// surfaced to the caller and the episode phase is left where the failure
// occurred, so the poisoned state cannot silently keep scoring.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::episode::{EpisodeLifecycle, EpisodePhase};
use crate::error::{BridgeError, BridgeResult, ExchangePhase};
use crate::observation::Observation;
use crate::reward::{score_step, ScoringState};
use crate::termination::{check_done, TerminationReason};
use crate::transport::{Channel, EnvListener};
use crate::types::{ActionVector, ControlMessage, RESET_COMPLETE_STATUS};

/// Result of one accepted step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Flattened observation of the declared shape.
    pub observation: Vec<f64>,
    /// Scalar reward from the task policy.
    pub reward: f64,
    /// Whether the episode ended this step.
    pub done: bool,
    /// Carried for interface compatibility; always false (the
    /// termination reason in `info` distinguishes the time-limit case).
    pub truncated: bool,
    /// Additional information about the step.
    pub info: StepInfo,
}

/// Result of a reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResult {
    /// Zero-filled observation of the declared shape; the true
    /// post-reset sensor state is not retrieved (known limitation).
    pub observation: Vec<f64>,
    pub info: StepInfo,
}

/// Step/reset metadata for logging and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    /// Episodes completed so far (increments on each reset).
    pub episode_id: u64,
    /// Accepted steps this episode.
    pub total_steps: u64,
    /// Consecutive in-band steps.
    pub stable_counter: u64,
    /// Last tilt assessment.
    pub is_tilted: bool,
    /// Why the episode ended, if it did.
    pub termination_reason: Option<TerminationReason>,
}

/// Learner endpoint for one controller connection.
#[derive(Debug)]
pub struct HexapodEnv {
    cfg: Config,
    listener: Option<EnvListener>,
    channel: Option<Channel>,
    lifecycle: EpisodeLifecycle,
    scoring: ScoringState,
}

impl HexapodEnv {
    /// Pre-flight the port and bind the listening socket. The controller
    /// is not accepted yet; call `wait_for_controller` next.
    pub fn bind(cfg: Config) -> BridgeResult<Self> {
        let listener = EnvListener::bind(&cfg.transport)?;
        Ok(Self {
            cfg,
            listener: Some(listener),
            channel: None,
            lifecycle: EpisodeLifecycle::new(),
            scoring: ScoringState::initial(),
        })
    }

    /// Actual bound port (differs from the configured one only for
    /// ephemeral-port configs).
    pub fn local_port(&self) -> Option<u16> {
        self.listener.as_ref().map(|l| l.local_addr().port())
    }

    pub fn phase(&self) -> EpisodePhase {
        self.lifecycle.phase()
    }

    pub fn task(&self) -> crate::config::Task {
        self.cfg.task
    }

    /// Block until the one controller connection arrives.
    pub fn wait_for_controller(&mut self) -> BridgeResult<()> {
        let listener = self.listener.take().ok_or_else(|| {
            BridgeError::protocol(
                ExchangePhase::Connect,
                "listener already consumed; only one controller connection is supported",
            )
        })?;
        let channel = listener.accept_controller()?;
        self.channel = Some(channel);
        self.lifecycle.on_connected()
    }

    /// Run the reset handshake and reinitialize the scoring state.
    ///
    /// Sends `{"command":"reset"}` on the line-delimited stream and scans
    /// replies for the completion ack, ignoring documents of any other
    /// shape. Returns a zero-filled observation.
    pub fn reset(&mut self) -> BridgeResult<ResetResult> {
        self.lifecycle.begin_reset()?;

        let channel = self.channel.as_mut().ok_or_else(|| {
            BridgeError::transport(ExchangePhase::ResetHandshake, "channel is closed")
        })?;

        channel.send_line(
            &ControlMessage::ResetRequest.to_value(),
            ExchangePhase::ResetHandshake,
        )?;

        loop {
            let line = channel.recv_line(ExchangePhase::ResetHandshake)?;
            let value: Value = serde_json::from_str(&line).map_err(|e| {
                BridgeError::transport(
                    ExchangePhase::ResetHandshake,
                    format!("undecodable line {line:?}: {e}"),
                )
            })?;
            if is_reset_complete(&value) {
                break;
            }
            // Anything else on the line stream is discarded, not an error.
        }

        self.scoring = ScoringState::initial();
        self.lifecycle.complete_reset();

        Ok(ResetResult {
            observation: Observation::zeroed().flatten(),
            info: self.build_info(None),
        })
    }

    /// Exchange one action for one observation and score it.
    pub fn step(&mut self, action: &ActionVector) -> BridgeResult<StepResult> {
        self.lifecycle.begin_step()?;

        let channel = self.channel.as_mut().ok_or_else(|| {
            BridgeError::transport(ExchangePhase::StepExchange, "channel is closed")
        })?;

        channel.send_document(action, ExchangePhase::StepExchange)?;

        let obs: Observation = channel.recv_document(ExchangePhase::StepExchange)?;
        obs.validate(ExchangePhase::StepExchange)?;

        // A scoring failure still terminates the episode cleanly: the wire
        // exchange completed, so a reset remains possible. Transport and
        // protocol failures above leave the phase in place instead, since
        // the connection state cannot be trusted after a partial exchange.
        let (reward, next) = match score_step(self.cfg.task, &self.cfg.reward, &obs, &self.scoring)
        {
            Ok(scored) => scored,
            Err(e) => {
                self.lifecycle.complete_step(true);
                return Err(e);
            }
        };
        self.scoring = next;

        let reason = check_done(&self.cfg.episode, &self.scoring);
        self.lifecycle.complete_step(reason.is_some());

        Ok(StepResult {
            observation: obs.flatten(),
            reward,
            done: reason.is_some(),
            truncated: false,
            info: self.build_info(reason),
        })
    }

    /// Release transport resources. Idempotent, and safe partway through
    /// initialization (before the connection was established).
    pub fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.listener = None;
    }

    fn build_info(&self, termination_reason: Option<TerminationReason>) -> StepInfo {
        StepInfo {
            episode_id: self.lifecycle.episode_id(),
            total_steps: self.scoring.total_steps,
            stable_counter: self.scoring.stable_counter,
            is_tilted: self.scoring.is_tilted,
            termination_reason,
        }
    }
}

impl Drop for HexapodEnv {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shape check for the reset completion ack.
fn is_reset_complete(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get("status"))
        .and_then(Value::as_str)
        .map(|status| status == RESET_COMPLETE_STATUS)
        .unwrap_or(false)
}
