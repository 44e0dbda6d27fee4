// src/reward.rs
//
// Task-conditioned reward engine.
//
// Pure function of (task, observation, scoring state) -> (reward, updated
// scoring state). The scoring state is passed in and returned rather than
// mutated in place, so policies are testable in isolation and reset
// semantics are a single assignment.
//
// Policies:
// - stand_up: lidar-height band with a stability streak bonus, per-joint
//   pose bands (elbow matches weighted 5x), tiered tilt shaping.
// - walk: weighted sum of normalized height/stability/contact terms,
//   always in [0,1] for finite inputs.
// - climb: binary reward on centre-of-mass ascent beyond a margin;
//   requires a prior observation and fails loudly without one.
// - idle: always 0.
//
// Every Ok path sets previous_com to the current centre of mass and
// increments total_steps exactly once.

use serde::{Deserialize, Serialize};

use crate::config::{ClimbRewardConfig, RewardConfig, StandUpRewardConfig, Task, WalkRewardConfig};
use crate::error::{BridgeError, BridgeResult};
use crate::observation::Observation;
use crate::types::ACTUATOR_COUNT;

/// Mutable per-episode scoring fields carried across reward computations.
///
/// Owned by the environment for the episode's lifetime and reset to
/// `initial()` on every reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringState {
    /// Centre of mass of the previous observation; unset at episode start.
    pub previous_com: Option<[f64; 3]>,
    /// Whether the last tilt assessment found the body tilted.
    pub is_tilted: bool,
    /// Consecutive steps inside the stand_up height band.
    pub stable_counter: u64,
    /// Accepted steps this episode.
    pub total_steps: u64,
}

impl ScoringState {
    /// Episode-start values: no prior observation, assumed tilted.
    pub fn initial() -> Self {
        Self {
            previous_com: None,
            is_tilted: true,
            stable_counter: 0,
            total_steps: 0,
        }
    }
}

impl Default for ScoringState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Score one accepted step.
///
/// Returns the reward and the updated scoring state; on error the input
/// state is untouched (no partial updates).
pub fn score_step(
    task: Task,
    cfg: &RewardConfig,
    obs: &Observation,
    state: &ScoringState,
) -> BridgeResult<(f64, ScoringState)> {
    let mut next = state.clone();

    let reward = match task {
        Task::StandUp => score_stand_up(&cfg.stand_up, obs, &mut next)?,
        Task::Walk => score_walk(&cfg.walk, obs),
        Task::Climb => score_climb(&cfg.climb, obs, state)?,
        Task::Idle => 0.0,
    };

    next.previous_com = Some(current_com(obs));
    next.total_steps += 1;

    Ok((reward, next))
}

fn current_com(obs: &Observation) -> [f64; 3] {
    [
        obs.com.first().copied().unwrap_or(0.0),
        obs.com.get(1).copied().unwrap_or(0.0),
        obs.com.get(2).copied().unwrap_or(0.0),
    ]
}

fn score_stand_up(
    cfg: &StandUpRewardConfig,
    obs: &Observation,
    next: &mut ScoringState,
) -> BridgeResult<f64> {
    let lidar = obs.sanitized_lidar();
    let height = match lidar.get(cfg.lidar_height_channel) {
        Some(&v) => v,
        None => {
            return Err(BridgeError::scoring_precondition(
                Task::StandUp,
                format!(
                    "lidar height channel {} unavailable ({} readings)",
                    cfg.lidar_height_channel,
                    lidar.len()
                ),
            ));
        }
    };

    let mut reward = 0.0;

    // Height band with stability streak. The streak bonus scales only once
    // the previous step's tilt assessment came back level.
    let diff = (height - cfg.target_height).abs();
    if diff <= cfg.inner_band {
        next.stable_counter += 1;
        reward += if next.is_tilted {
            1.0
        } else {
            1.0 + cfg.stability_bonus_rate * next.stable_counter as f64
        };
    } else if diff <= cfg.outer_band {
        reward -= cfg.near_miss_penalty;
        next.stable_counter = 0;
    } else {
        reward -= cfg.far_miss_penalty;
        next.stable_counter = 0;
    }

    // Per-joint pose bands, one per leg-segment group of six.
    for (i, &value) in obs.joint_sensors.iter().take(ACTUATOR_COUNT).enumerate() {
        let band = if i < 6 {
            &cfg.hip_band
        } else if i < 12 {
            &cfg.femur_band
        } else {
            &cfg.tibia_band
        };
        if band.contains(value) {
            reward += band.in_band_reward;
        } else {
            reward -= band.out_of_band_penalty;
        }
    }

    // Tiered tilt shaping; rolling over is highly penalized.
    let roll = obs.roll().abs();
    let pitch = obs.pitch().abs();
    if roll < cfg.tilt_strong && pitch < cfg.tilt_strong {
        next.is_tilted = false;
        reward += cfg.tilt_strong_reward;
    } else if roll < cfg.tilt_mild && pitch < cfg.tilt_mild {
        next.is_tilted = true;
        reward += cfg.tilt_mild_reward;
    } else if roll < cfg.tilt_poor && pitch < cfg.tilt_poor {
        next.is_tilted = true;
        reward -= cfg.tilt_poor_penalty;
    } else {
        next.is_tilted = true;
        reward -= cfg.tilt_flip_penalty;
    }

    Ok(reward)
}

fn score_walk(cfg: &WalkRewardConfig, obs: &Observation) -> f64 {
    let h_error = (obs.com_height() - cfg.target_height).abs();
    let reward_height = (1.0 - h_error / cfg.height_tolerance).clamp(0.0, 1.0);

    let reward_stability = (1.0 - obs.roll().abs() / cfg.tilt_tolerance).clamp(0.0, 1.0);

    let feet_on_ground = obs
        .foot_contacts
        .iter()
        .filter(|&&c| c > cfg.contact_threshold)
        .count();
    let reward_feet = feet_on_ground as f64 / obs.foot_contacts.len().max(1) as f64;

    cfg.weight_height * reward_height
        + cfg.weight_stability * reward_stability
        + cfg.weight_contact * reward_feet
}

fn score_climb(
    cfg: &ClimbRewardConfig,
    obs: &Observation,
    state: &ScoringState,
) -> BridgeResult<f64> {
    let prev = state.previous_com.ok_or_else(|| {
        BridgeError::scoring_precondition(
            Task::Climb,
            "no prior observation; climb cannot score the first step of an episode",
        )
    })?;

    if obs.com_height() > prev[2] + cfg.ascent_margin {
        Ok(1.0)
    } else {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{COM_DIMS, FOOT_COUNT, IMU_DIMS};

    fn reward_cfg() -> RewardConfig {
        RewardConfig::default()
    }

    /// Observation with every stand_up term in its best band.
    fn perfect_stand_obs() -> Observation {
        let mut joints = Vec::with_capacity(ACTUATOR_COUNT);
        joints.extend(std::iter::repeat(0.60).take(6)); // hips
        joints.extend(std::iter::repeat(0.80).take(6)); // femurs
        joints.extend(std::iter::repeat(-2.40).take(6)); // tibias
        Observation {
            joint_sensors: joints,
            imu: vec![0.0, 0.0, 0.0],
            foot_contacts: vec![1.0; FOOT_COUNT],
            com: vec![0.0, 0.0, 1.0],
            lidar: vec![2.0, 3.0, 2.0, 2.0],
        }
    }

    #[test]
    fn test_stand_up_perfect_posture_scores_positive() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();
        let obs = perfect_stand_obs();

        let (reward, next) = score_step(Task::StandUp, &cfg, &obs, &state).unwrap();

        assert!(reward > 0.0, "got reward {reward}");
        assert!(!next.is_tilted);
        assert_eq!(next.stable_counter, 1);
        assert_eq!(next.total_steps, 1);
        assert_eq!(next.previous_com, Some([0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_stand_up_streak_bonus_when_level() {
        let cfg = reward_cfg();
        let obs = perfect_stand_obs();

        // Entering already level with a running streak: bonus scales.
        let mut state = ScoringState::initial();
        state.is_tilted = false;
        state.stable_counter = 10;
        let (reward_level, _) = score_step(Task::StandUp, &cfg, &obs, &state).unwrap();

        // Same posture but previously tilted: flat height bonus.
        let mut tilted = ScoringState::initial();
        tilted.stable_counter = 10;
        let (reward_tilted, _) = score_step(Task::StandUp, &cfg, &obs, &tilted).unwrap();

        // Difference is exactly the streak scaling (0.05 * 11).
        assert!((reward_level - reward_tilted - 0.05 * 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_stand_up_near_miss_resets_counter() {
        let cfg = reward_cfg();
        let mut state = ScoringState::initial();
        state.stable_counter = 42;

        let mut obs = perfect_stand_obs();
        obs.lidar[1] = 5.0; // diff = 2.0, inside (1, 4]

        let (_, next) = score_step(Task::StandUp, &cfg, &obs, &state).unwrap();
        assert_eq!(next.stable_counter, 0);
    }

    #[test]
    fn test_stand_up_band_penalties_ordered() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();

        let mut near = perfect_stand_obs();
        near.lidar[1] = 5.0; // diff 2.0 -> near miss
        let (reward_near, _) = score_step(Task::StandUp, &cfg, &near, &state).unwrap();

        let mut far = perfect_stand_obs();
        far.lidar[1] = 9.0; // diff 6.0 -> far miss
        let (reward_far, _) = score_step(Task::StandUp, &cfg, &far, &state).unwrap();

        assert!(
            reward_far < reward_near,
            "far miss must penalize harder: near={reward_near} far={reward_far}"
        );
        assert!((reward_near - reward_far - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_stand_up_non_finite_lidar_sanitized() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();

        let mut obs = perfect_stand_obs();
        obs.joint_sensors = vec![0.0; ACTUATOR_COUNT]; // collapsed pose
        obs.imu = vec![2.8, 0.1, 0.0]; // inverted
        obs.lidar = vec![f64::INFINITY, f64::INFINITY, f64::NAN, f64::NAN];

        // Scores without error; sentinel height is a far miss.
        let (reward, next) = score_step(Task::StandUp, &cfg, &obs, &state).unwrap();
        assert!(reward < 0.0);
        assert_eq!(next.stable_counter, 0);
        assert!(next.is_tilted);
    }

    #[test]
    fn test_stand_up_missing_height_channel_fails_loudly() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();

        let mut obs = perfect_stand_obs();
        obs.lidar = vec![3.0]; // channel 1 absent

        let err = score_step(Task::StandUp, &cfg, &obs, &state).unwrap_err();
        assert!(matches!(err, BridgeError::ScoringPrecondition { .. }));
    }

    #[test]
    fn test_stand_up_out_of_band_joints_penalized() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();

        let mut obs = perfect_stand_obs();
        // One hip and one tibia out of band: lose 0.2+1.0 gained, gain
        // -1.0 each instead.
        obs.joint_sensors[0] = 1.5;
        obs.joint_sensors[12] = 0.0;

        let (reward, _) = score_step(Task::StandUp, &cfg, &obs, &state).unwrap();
        let (reward_perfect, _) =
            score_step(Task::StandUp, &cfg, &perfect_stand_obs(), &state).unwrap();
        assert!((reward_perfect - reward - (0.2 + 1.0 + 1.0 + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_walk_reward_bounded() {
        let cfg = reward_cfg();

        let cases = [
            (1.0, 0.0, vec![1.0; FOOT_COUNT]), // perfect
            (0.0, 0.0, vec![0.0; FOOT_COUNT]), // fallen but level
            (5.0, 3.0, vec![0.0; FOOT_COUNT]), // far off everything
            (1.1, 0.2, vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.3]),
        ];

        for (height, roll, feet) in cases {
            let obs = Observation {
                joint_sensors: vec![0.0; ACTUATOR_COUNT],
                imu: vec![roll, 0.0, 0.0],
                foot_contacts: feet,
                com: vec![0.0, 0.0, height],
                lidar: vec![0.0, height],
            };
            let state = ScoringState::initial();
            let (reward, _) = score_step(Task::Walk, &cfg, &obs, &state).unwrap();
            assert!(
                (0.0..=1.0).contains(&reward),
                "walk reward out of bounds: {reward} for height={height} roll={roll}"
            );
        }
    }

    #[test]
    fn test_walk_perfect_is_one() {
        let cfg = reward_cfg();
        let obs = Observation {
            joint_sensors: vec![0.0; ACTUATOR_COUNT],
            imu: vec![0.0; IMU_DIMS],
            foot_contacts: vec![1.0; FOOT_COUNT],
            com: vec![0.0, 0.0, 1.0],
            lidar: Vec::new(),
        };
        let state = ScoringState::initial();
        let (reward, _) = score_step(Task::Walk, &cfg, &obs, &state).unwrap();
        assert!((reward - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_climb_without_prior_observation_fails() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();
        let obs = perfect_stand_obs();

        let err = score_step(Task::Climb, &cfg, &obs, &state).unwrap_err();
        match err {
            BridgeError::ScoringPrecondition { task, .. } => assert_eq!(task, Task::Climb),
            other => panic!("expected scoring precondition, got {other:?}"),
        }
    }

    #[test]
    fn test_climb_binary_on_ascent_margin() {
        let cfg = reward_cfg();
        let mut state = ScoringState::initial();
        state.previous_com = Some([0.0, 0.0, 1.0]);

        let mut obs = perfect_stand_obs();

        obs.com = vec![0.0, 0.0, 1.06]; // above margin
        let (reward, next) = score_step(Task::Climb, &cfg, &obs, &state).unwrap();
        assert_eq!(reward, 1.0);
        assert_eq!(next.previous_com, Some([0.0, 0.0, 1.06]));

        obs.com = vec![0.0, 0.0, 1.05]; // exactly at margin: no reward
        let (reward, _) = score_step(Task::Climb, &cfg, &obs, &state).unwrap();
        assert_eq!(reward, 0.0);

        obs.com = vec![0.0, 0.0, 0.9]; // descending
        let (reward, _) = score_step(Task::Climb, &cfg, &obs, &state).unwrap();
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn test_idle_scores_zero_but_still_updates_state() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();
        let obs = perfect_stand_obs();

        let (reward, next) = score_step(Task::Idle, &cfg, &obs, &state).unwrap();
        assert_eq!(reward, 0.0);
        assert_eq!(next.total_steps, 1);
        assert_eq!(next.previous_com, Some([0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_stable_counter_never_exceeds_step_count() {
        let cfg = reward_cfg();
        let obs = perfect_stand_obs();
        let mut state = ScoringState::initial();

        for _ in 0..50 {
            let (_, next) = score_step(Task::StandUp, &cfg, &obs, &state).unwrap();
            state = next;
            assert!(state.stable_counter <= state.total_steps);
        }
        assert_eq!(state.total_steps, 50);
        assert_eq!(state.stable_counter, 50);
    }

    #[test]
    fn test_error_leaves_state_untouched() {
        let cfg = reward_cfg();
        let state = ScoringState::initial();
        let obs = perfect_stand_obs();

        let _ = score_step(Task::Climb, &cfg, &obs, &state).unwrap_err();
        assert_eq!(state, ScoringState::initial());
    }

    #[test]
    fn test_com_dims_assumption() {
        // The wire contract fixes com at three components.
        assert_eq!(COM_DIMS, 3);
    }
}
