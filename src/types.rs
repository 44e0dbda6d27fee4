// src/types.rs
//
// Common shared types for the mantis-rl bridge: shape constants, the
// bounded action vector, and the closed set of wire messages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{BridgeError, BridgeResult, ExchangePhase};
use crate::observation::Observation;

/// Number of actuators (and joint position sensors). Order is fixed and
/// shared between controller and learner: six hips, six femurs, six tibias.
pub const ACTUATOR_COUNT: usize = 18;

/// Number of foot contact sensors.
pub const FOOT_COUNT: usize = 6;

/// IMU channels in the learner-facing observation (roll, pitch, yaw).
pub const IMU_DIMS: usize = 3;

/// Centre-of-mass components (x, y, z).
pub const COM_DIMS: usize = 3;

/// Declared learner-facing flattened observation size:
/// joints + imu + foot contacts + com. Lidar is reward-side only.
pub const OBS_SIZE: usize = ACTUATOR_COUNT + IMU_DIMS + FOOT_COUNT + COM_DIMS;

/// Status string the controller must echo to complete a reset.
pub const RESET_COMPLETE_STATUS: &str = "reset_complete";

/// Bounded per-actuator command vector.
///
/// Always exactly [`ACTUATOR_COUNT`] values; construction clamps each value
/// into [-1, 1] (the policy's control surface is bounded by contract) and
/// rejects wrong lengths and non-finite values outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionVector(Vec<f64>);

impl ActionVector {
    pub fn new(values: Vec<f64>) -> BridgeResult<Self> {
        if values.len() != ACTUATOR_COUNT {
            return Err(BridgeError::protocol(
                ExchangePhase::StepExchange,
                format!(
                    "action vector has {} values, expected {}",
                    values.len(),
                    ACTUATOR_COUNT
                ),
            ));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(BridgeError::protocol(
                ExchangePhase::StepExchange,
                format!("action vector contains non-finite value {v}"),
            ));
        }
        Ok(Self(
            values.into_iter().map(|v| v.clamp(-1.0, 1.0)).collect(),
        ))
    }

    /// All-zero action (neutral pose command).
    pub fn zeros() -> Self {
        Self(vec![0.0; ACTUATOR_COUNT])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// The closed set of messages on the wire. Exactly one message flows per
/// direction per logical step; anything else is a protocol violation.
///
/// Framing differs per variant: `Action` and `ObservationReply` travel as
/// length-implicit single documents, `ResetRequest` and `ResetAck` as
/// newline-delimited documents.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Learner -> controller: one command per actuator.
    Action(ActionVector),
    /// Learner -> controller: re-home the robot.
    ResetRequest,
    /// Controller -> learner: reset finished.
    ResetAck { status: String },
    /// Controller -> learner: sensor snapshot after applying an action.
    ObservationReply(Observation),
}

impl ControlMessage {
    /// Encode to the wire JSON document for this message.
    pub fn to_value(&self) -> Value {
        match self {
            ControlMessage::Action(action) => json!(action.as_slice()),
            ControlMessage::ResetRequest => json!({ "command": "reset" }),
            ControlMessage::ResetAck { status } => json!({ "status": status }),
            ControlMessage::ObservationReply(obs) => {
                serde_json::to_value(obs).expect("observation serializes to JSON")
            }
        }
    }

    /// Classify one decoded JSON document into a message.
    ///
    /// Matching is exhaustive over the wire shapes; anything unrecognized
    /// is rejected as a protocol error rather than guessed at.
    pub fn from_value(value: Value, phase: ExchangePhase) -> BridgeResult<ControlMessage> {
        match value {
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in &items {
                    match item.as_f64() {
                        Some(v) => values.push(v),
                        None => {
                            return Err(BridgeError::protocol(
                                phase,
                                format!("action array contains non-numeric element {item}"),
                            ));
                        }
                    }
                }
                Ok(ControlMessage::Action(ActionVector::new(values)?))
            }
            Value::Object(map) => {
                if let Some(command) = map.get("command") {
                    return match command.as_str() {
                        Some("reset") => Ok(ControlMessage::ResetRequest),
                        _ => Err(BridgeError::protocol(
                            phase,
                            format!("unrecognized command {command}"),
                        )),
                    };
                }
                if let Some(status) = map.get("status") {
                    return match status.as_str() {
                        Some(s) => Ok(ControlMessage::ResetAck {
                            status: s.to_string(),
                        }),
                        None => Err(BridgeError::protocol(
                            phase,
                            format!("non-string reset status {status}"),
                        )),
                    };
                }
                if map.contains_key("joint_sensors") {
                    let obs: Observation =
                        serde_json::from_value(Value::Object(map)).map_err(|e| {
                            BridgeError::protocol(
                                phase,
                                format!("malformed observation reply: {e}"),
                            )
                        })?;
                    return Ok(ControlMessage::ObservationReply(obs));
                }
                Err(BridgeError::protocol(
                    phase,
                    "unrecognized message object shape",
                ))
            }
            other => Err(BridgeError::protocol(
                phase,
                format!("unrecognized message payload {other}"),
            )),
        }
    }

    /// True for a reset ack carrying the completion status.
    pub fn is_reset_complete(&self) -> bool {
        matches!(
            self,
            ControlMessage::ResetAck { status } if status == RESET_COMPLETE_STATUS
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_vector_clamps_and_validates() {
        let action = ActionVector::new(vec![2.0; ACTUATOR_COUNT]).unwrap();
        assert!(action.as_slice().iter().all(|&v| v == 1.0));

        assert!(ActionVector::new(vec![0.0; 17]).is_err());
        assert!(ActionVector::new(vec![f64::NAN; ACTUATOR_COUNT]).is_err());
    }

    #[test]
    fn test_obs_size_is_declared_shape() {
        assert_eq!(OBS_SIZE, 30);
    }

    #[test]
    fn test_classify_action_array() {
        let value = json!(vec![0.5; ACTUATOR_COUNT]);
        let msg = ControlMessage::from_value(value, ExchangePhase::StepExchange).unwrap();
        match msg {
            ControlMessage::Action(action) => {
                assert_eq!(action.as_slice().len(), ACTUATOR_COUNT);
            }
            other => panic!("expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_reset_request_and_ack() {
        let msg = ControlMessage::from_value(json!({"command": "reset"}), ExchangePhase::ResetHandshake)
            .unwrap();
        assert_eq!(msg, ControlMessage::ResetRequest);

        let msg = ControlMessage::from_value(
            json!({"status": "reset_complete"}),
            ExchangePhase::ResetHandshake,
        )
        .unwrap();
        assert!(msg.is_reset_complete());

        let msg = ControlMessage::from_value(
            json!({"status": "warming_up"}),
            ExchangePhase::ResetHandshake,
        )
        .unwrap();
        assert!(!msg.is_reset_complete());
    }

    #[test]
    fn test_unrecognized_shapes_rejected() {
        for value in [
            json!("hello"),
            json!(42),
            json!({"ping": 1}),
            json!({"command": "dance"}),
        ] {
            assert!(
                ControlMessage::from_value(value.clone(), ExchangePhase::StepExchange).is_err(),
                "expected rejection of {value}"
            );
        }
    }

    #[test]
    fn test_action_roundtrip_through_wire_value() {
        let action = ActionVector::new(vec![0.25; ACTUATOR_COUNT]).unwrap();
        let value = ControlMessage::Action(action.clone()).to_value();
        let decoded = ControlMessage::from_value(value, ExchangePhase::StepExchange).unwrap();
        assert_eq!(decoded, ControlMessage::Action(action));
    }
}
