// src/observation.rs
//
// Fixed-shape sensor observation and its wire codec.
//
// Design requirements:
// - Serializable (serde) for the wire and for logging
// - Deterministic ordering (Vec fields, fixed concatenation order)
// - Declared flattened shape checked at the protocol boundary; a
//   mismatch is a protocol error, never silently padded or truncated
// - Lidar may carry non-finite readings (robot inverted); they arrive
//   as JSON null and are sanitized to a bounded sentinel only at
//   scoring time

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BridgeError, BridgeResult, ExchangePhase};
use crate::types::{ACTUATOR_COUNT, COM_DIMS, FOOT_COUNT, IMU_DIMS, OBS_SIZE};

/// Sentinel substituted for non-finite lidar readings before scoring.
pub const LIDAR_SENTINEL: f64 = 999.0;

/// One sensor snapshot from the controller.
///
/// The learner-facing flattened vector is `joint_sensors ++ imu ++
/// foot_contacts ++ com` (length [`OBS_SIZE`]). `lidar` is variable-length
/// and consumed only by the reward engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Joint position sensor readings, actuator order (rad).
    pub joint_sensors: Vec<f64>,
    /// Roll, pitch, yaw (rad). Depending on controller version the third
    /// channel may carry an acceleration-derived norm instead of yaw.
    pub imu: Vec<f64>,
    /// Foot contact readings, nominally 0/1 but may carry sensor noise.
    pub foot_contacts: Vec<f64>,
    /// Centre of mass (x, y, z). All zeros when the simulator cannot
    /// provide it (no supervisor capability).
    pub com: Vec<f64>,
    /// Range readings; may contain non-finite values.
    #[serde(default, deserialize_with = "lidar_from_wire")]
    pub lidar: Vec<f64>,
}

/// Non-finite floats cannot travel in JSON; the encoder emits them as
/// null, so nulls decode back to NaN here and get sanitized at scoring.
fn lidar_from_wire<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

impl Observation {
    /// Zero-filled observation of the declared shape (returned by reset;
    /// the true post-reset sensor state is not retrieved).
    pub fn zeroed() -> Self {
        Self {
            joint_sensors: vec![0.0; ACTUATOR_COUNT],
            imu: vec![0.0; IMU_DIMS],
            foot_contacts: vec![0.0; FOOT_COUNT],
            com: vec![0.0; COM_DIMS],
            lidar: Vec::new(),
        }
    }

    /// Check every fixed-shape field against its declared length.
    pub fn validate(&self, phase: ExchangePhase) -> BridgeResult<()> {
        let checks: [(&str, usize, usize); 4] = [
            ("joint_sensors", self.joint_sensors.len(), ACTUATOR_COUNT),
            ("imu", self.imu.len(), IMU_DIMS),
            ("foot_contacts", self.foot_contacts.len(), FOOT_COUNT),
            ("com", self.com.len(), COM_DIMS),
        ];
        for (field, got, want) in checks {
            if got != want {
                return Err(BridgeError::protocol(
                    phase,
                    format!("observation field '{field}' has {got} values, expected {want}"),
                ));
            }
        }
        Ok(())
    }

    /// Flatten into the declared learner-facing vector.
    ///
    /// Callers must `validate` first; the concatenation order is part of
    /// the wire contract.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(OBS_SIZE);
        out.extend_from_slice(&self.joint_sensors);
        out.extend_from_slice(&self.imu);
        out.extend_from_slice(&self.foot_contacts);
        out.extend_from_slice(&self.com);
        out
    }

    /// Lidar with non-finite readings replaced by [`LIDAR_SENTINEL`].
    pub fn sanitized_lidar(&self) -> Vec<f64> {
        self.lidar
            .iter()
            .map(|&v| if v.is_finite() { v } else { LIDAR_SENTINEL })
            .collect()
    }

    /// Roll component of the IMU reading.
    pub fn roll(&self) -> f64 {
        self.imu.first().copied().unwrap_or(0.0)
    }

    /// Pitch component of the IMU reading.
    pub fn pitch(&self) -> f64 {
        self.imu.get(1).copied().unwrap_or(0.0)
    }

    /// Centre-of-mass height (z).
    pub fn com_height(&self) -> f64 {
        self.com.get(2).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_observation() -> Observation {
        Observation {
            joint_sensors: vec![0.1; ACTUATOR_COUNT],
            imu: vec![0.01, -0.02, 0.5],
            foot_contacts: vec![1.0; FOOT_COUNT],
            com: vec![0.0, 0.1, 1.2],
            lidar: vec![2.9, 3.0, 2.8, 3.1],
        }
    }

    #[test]
    fn test_flatten_has_declared_shape() {
        let obs = make_observation();
        obs.validate(ExchangePhase::StepExchange).unwrap();
        let flat = obs.flatten();
        assert_eq!(flat.len(), OBS_SIZE);
        // Concatenation order: joints, imu, feet, com.
        assert_eq!(flat[0], 0.1);
        assert_eq!(flat[ACTUATOR_COUNT], 0.01);
        assert_eq!(flat[ACTUATOR_COUNT + IMU_DIMS], 1.0);
        assert_eq!(flat[OBS_SIZE - 1], 1.2);
    }

    #[test]
    fn test_validate_rejects_wrong_field_counts() {
        let mut obs = make_observation();
        obs.joint_sensors.pop();
        let err = obs.validate(ExchangePhase::StepExchange).unwrap_err();
        assert!(err.to_string().contains("joint_sensors"), "got: {err}");

        let mut obs = make_observation();
        obs.foot_contacts.push(0.0);
        assert!(obs.validate(ExchangePhase::StepExchange).is_err());
    }

    #[test]
    fn test_zeroed_matches_declared_shape() {
        let obs = Observation::zeroed();
        obs.validate(ExchangePhase::ResetHandshake).unwrap();
        assert_eq!(obs.flatten(), vec![0.0; OBS_SIZE]);
    }

    #[test]
    fn test_lidar_sanitization() {
        let mut obs = make_observation();
        obs.lidar = vec![f64::INFINITY, 3.0, f64::NAN, f64::NEG_INFINITY];
        assert_eq!(
            obs.sanitized_lidar(),
            vec![LIDAR_SENTINEL, 3.0, LIDAR_SENTINEL, LIDAR_SENTINEL]
        );
    }

    #[test]
    fn test_wire_roundtrip_with_non_finite_lidar() {
        let mut obs = make_observation();
        obs.lidar = vec![2.5, f64::INFINITY];

        // serde_json encodes the non-finite reading as null...
        let wire = serde_json::to_string(&obs).unwrap();
        assert!(wire.contains("null"), "got: {wire}");

        // ...which decodes back as NaN and sanitizes to the sentinel.
        let parsed: Observation = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed.lidar[0], 2.5);
        assert!(parsed.lidar[1].is_nan());
        assert_eq!(parsed.sanitized_lidar()[1], LIDAR_SENTINEL);
    }

    #[test]
    fn test_missing_lidar_defaults_empty() {
        let wire = r#"{
            "joint_sensors": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0],
            "imu": [0.0, 0.0, 0.0],
            "foot_contacts": [0,0,0,0,0,0],
            "com": [0.0, 0.0, 0.0]
        }"#;
        let parsed: Observation = serde_json::from_str(wire).unwrap();
        parsed.validate(ExchangePhase::StepExchange).unwrap();
        assert!(parsed.lidar.is_empty());
    }
}
