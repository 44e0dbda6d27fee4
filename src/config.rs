// src/config.rs
//
// Central configuration for the mantis-rl bridge.
// This is the single source of truth for the transport endpoint, the
// episode limits, and the per-task reward shaping parameters. The
// numeric defaults mirror the tuned values of the original training
// setup (base height 3.0 at lidar channel 1, joint bands per leg
// segment, tilt tiers, walk weights 0.5/0.3/0.2, climb margin 0.05).

use serde::{Deserialize, Serialize};

/// Task variant selecting the reward policy.
///
/// Fixed for the lifetime of an environment instance. `Idle` applies no
/// task-specific shaping and always scores 0; it exists so the "no task
/// selected" branch is an explicit variant rather than a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    StandUp,
    Walk,
    Climb,
    Idle,
}

impl Task {
    /// Stable lowercase name (used in logs and CLI parsing).
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::StandUp => "stand_up",
            Task::Walk => "walk",
            Task::Climb => "climb",
            Task::Idle => "idle",
        }
    }

    /// Parse a task name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<Task> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stand_up" | "standup" | "stand" => Some(Task::StandUp),
            "walk" => Some(Task::Walk),
            "climb" => Some(Task::Climb),
            "idle" => Some(Task::Idle),
            _ => None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Human-readable config / release version.
    pub version: &'static str,
    /// Task selecting the reward policy.
    pub task: Task,
    /// TCP endpoint the learner listens on.
    pub transport: TransportConfig,
    /// Episode length and early-termination limits.
    pub episode: EpisodeConfig,
    /// Reward shaping parameters per task.
    pub reward: RewardConfig,
    /// Controller-side stepping parameters.
    pub control: ControlConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "mantis-rl-0.1",
            task: Task::StandUp,
            transport: TransportConfig::default(),
            episode: EpisodeConfig::default(),
            reward: RewardConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

impl Config {
    /// Build a config from defaults plus `MANTIS_*` environment overrides.
    ///
    /// Unparseable values warn to stderr and keep the default, they never
    /// abort startup. CLI flags are applied on top by the binary (CLI >
    /// env > default).
    pub fn from_env_or_default() -> Self {
        use std::env;

        let mut cfg = Config::default();

        if let Ok(raw) = env::var("MANTIS_TASK") {
            match Task::parse(&raw) {
                Some(task) => {
                    cfg.task = task;
                    eprintln!("[config] MANTIS_TASK = {} (overrode default)", task.as_str());
                }
                None => {
                    eprintln!(
                        "[config] WARN: unrecognized MANTIS_TASK = {:?}; using default {}",
                        raw,
                        cfg.task.as_str()
                    );
                }
            }
        }

        if let Ok(raw) = env::var("MANTIS_PORT") {
            match raw.parse::<u16>() {
                Ok(v) => {
                    cfg.transport.port = v;
                    eprintln!("[config] MANTIS_PORT = {v} (overrode default)");
                }
                Err(_) => {
                    eprintln!(
                        "[config] WARN: could not parse MANTIS_PORT = {:?} as u16; using default {}",
                        raw, cfg.transport.port
                    );
                }
            }
        }

        if let Ok(raw) = env::var("MANTIS_MAX_STEPS") {
            match raw.parse::<u64>() {
                Ok(v) => {
                    cfg.episode.max_steps = v;
                    eprintln!("[config] MANTIS_MAX_STEPS = {v} (overrode default)");
                }
                Err(_) => {
                    eprintln!(
                        "[config] WARN: could not parse MANTIS_MAX_STEPS = {:?} as u64; using default {}",
                        raw, cfg.episode.max_steps
                    );
                }
            }
        }

        if let Ok(raw) = env::var("MANTIS_STABILITY_THRESHOLD") {
            match raw.parse::<u64>() {
                Ok(v) => {
                    cfg.episode.stability_threshold = v;
                    eprintln!("[config] MANTIS_STABILITY_THRESHOLD = {v} (overrode default)");
                }
                Err(_) => {
                    eprintln!(
                        "[config] WARN: could not parse MANTIS_STABILITY_THRESHOLD = {:?} as u64; using default {}",
                        raw, cfg.episode.stability_threshold
                    );
                }
            }
        }

        cfg
    }
}

/// TCP endpoint configuration.
///
/// The learner is the listening server; the controller connects as a
/// client. One connection for the process lifetime, no reconnects.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Loopback address to bind/listen on.
    pub host: String,
    /// Listening port. Port 0 requests an ephemeral port (tests).
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Episode limits for the termination policy.
#[derive(Debug, Clone)]
pub struct EpisodeConfig {
    /// Hard cap on accepted steps per episode.
    pub max_steps: u64,
    /// Consecutive in-band steps required for early stabilized exit.
    pub stability_threshold: u64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            max_steps: 800,
            stability_threshold: 80,
        }
    }
}

/// Controller-side stepping parameters (demo harness + sim robot).
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Simulated time advanced per accepted action, seconds.
    pub dt_seconds: f64,
    /// Tripod gait base frequency for the scripted policy, Hz.
    pub gait_freq_hz: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dt_seconds: 0.032,
            gait_freq_hz: 0.5,
        }
    }
}

/// Reward shaping parameters, grouped per task.
#[derive(Debug, Clone)]
pub struct RewardConfig {
    pub stand_up: StandUpRewardConfig,
    pub walk: WalkRewardConfig,
    pub climb: ClimbRewardConfig,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            stand_up: StandUpRewardConfig::default(),
            walk: WalkRewardConfig::default(),
            climb: ClimbRewardConfig::default(),
        }
    }
}

/// Acceptable interval for one joint group, centred on the neutral pose.
#[derive(Debug, Clone, Copy)]
pub struct JointBand {
    /// Band centre (rad).
    pub center: f64,
    /// Half-width of the acceptable interval (rad).
    pub amplitude: f64,
    /// Reward for a joint inside the band.
    pub in_band_reward: f64,
    /// Penalty for a joint outside the band.
    pub out_of_band_penalty: f64,
}

impl JointBand {
    pub fn min(&self) -> f64 {
        self.center - self.amplitude
    }

    pub fn max(&self) -> f64 {
        self.center + self.amplitude
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min() && value <= self.max()
    }
}

/// Parameters for the stand_up policy.
///
/// Height is read from a designated lidar channel against `target_height`
/// with two tolerance bands; the per-joint term uses one band per joint
/// group of six (hip, femur/shoulder, tibia/elbow), elbow matches weighted
/// 5x; tilt is tiered on |roll| and |pitch|.
#[derive(Debug, Clone)]
pub struct StandUpRewardConfig {
    /// Target standing height, in lidar units.
    pub target_height: f64,
    /// Index of the lidar channel used as the height proxy.
    pub lidar_height_channel: usize,
    /// |height - target| <= inner_band counts as stable.
    pub inner_band: f64,
    /// inner_band < |diff| <= outer_band draws the near-miss penalty.
    pub outer_band: f64,
    /// Penalty inside (inner_band, outer_band].
    pub near_miss_penalty: f64,
    /// Penalty beyond outer_band.
    pub far_miss_penalty: f64,
    /// Per-step multiplier on the accumulated stable counter.
    pub stability_bonus_rate: f64,
    /// Bands for the hip, femur, tibia groups (joints 0..6, 6..12, 12..18).
    pub hip_band: JointBand,
    pub femur_band: JointBand,
    pub tibia_band: JointBand,
    /// Tilt tier thresholds (rad) on both |roll| and |pitch|.
    pub tilt_strong: f64,
    pub tilt_mild: f64,
    pub tilt_poor: f64,
    /// Rewards per tilt tier, outermost last.
    pub tilt_strong_reward: f64,
    pub tilt_mild_reward: f64,
    pub tilt_poor_penalty: f64,
    pub tilt_flip_penalty: f64,
}

impl Default for StandUpRewardConfig {
    fn default() -> Self {
        Self {
            target_height: 3.0,
            lidar_height_channel: 1,
            inner_band: 1.0,
            outer_band: 4.0,
            near_miss_penalty: 0.5,
            far_miss_penalty: 4.0,
            stability_bonus_rate: 0.05,
            hip_band: JointBand {
                center: 0.60,
                amplitude: 0.25,
                in_band_reward: 0.2,
                out_of_band_penalty: 1.0,
            },
            femur_band: JointBand {
                center: 0.80,
                amplitude: 0.20,
                in_band_reward: 0.2,
                out_of_band_penalty: 1.0,
            },
            // Elbow bend is the task-defining joint; matches weigh 5x.
            tibia_band: JointBand {
                center: -2.40,
                amplitude: 0.05,
                in_band_reward: 1.0,
                out_of_band_penalty: 1.0,
            },
            tilt_strong: 0.1,
            tilt_mild: 0.3,
            tilt_poor: 0.6,
            tilt_strong_reward: 2.0,
            tilt_mild_reward: 1.0,
            tilt_poor_penalty: 1.0,
            tilt_flip_penalty: 3.0,
        }
    }
}

/// Parameters for the walk policy.
///
/// Weighted sum of three sub-rewards each clamped to [0,1]; the weights
/// sum to 1 so the total stays in [0,1] for finite inputs.
#[derive(Debug, Clone)]
pub struct WalkRewardConfig {
    /// Expected standing height of the centre of mass.
    pub target_height: f64,
    /// Height error that zeroes the height sub-reward.
    pub height_tolerance: f64,
    /// Tilt (rad) that zeroes the stability sub-reward.
    pub tilt_tolerance: f64,
    /// Contact reading above this counts as a foot on the ground.
    pub contact_threshold: f64,
    pub weight_height: f64,
    pub weight_stability: f64,
    pub weight_contact: f64,
}

impl Default for WalkRewardConfig {
    fn default() -> Self {
        Self {
            target_height: 1.0,
            height_tolerance: 0.2,
            tilt_tolerance: 0.5,
            contact_threshold: 0.5,
            weight_height: 0.5,
            weight_stability: 0.3,
            weight_contact: 0.2,
        }
    }
}

/// Parameters for the climb policy.
#[derive(Debug, Clone)]
pub struct ClimbRewardConfig {
    /// Minimum centre-of-mass rise per step that earns the binary reward.
    pub ascent_margin: f64,
}

impl Default for ClimbRewardConfig {
    fn default() -> Self {
        Self { ascent_margin: 0.05 }
    }
}
