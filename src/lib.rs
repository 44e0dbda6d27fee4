//! mantis-rl core library.
//!
//! Bridges a physically simulated hexapod robot with a reinforcement-
//! learning training loop over a single synchronous TCP connection. The
//! binary (`src/main.rs`) is just a thin demo / research harness around
//! these components.
//!
//! # Architecture
//!
//! Two processes share one loopback connection; the learner listens, the
//! controller connects:
//!
//! - **Transport** (`transport`): one channel, two framings: single
//!   JSON documents for the action/observation exchange, newline-
//!   delimited documents for the reset handshake.
//! - **Episode State Machine** (`episode`): awaiting-connection → ready
//!   → stepping → terminal → resetting → ready; no step before a reset
//!   ack, no overlapping resets.
//! - **Reward Engine** (`reward`): pure function of (task, observation,
//!   scoring state), one policy per task variant.
//! - **Termination Policy** (`termination`): step budget or sustained
//!   stability.
//! - **Environment Facade** (`env`): the conventional reset/step/close
//!   contract consumed by a training loop.
//!
//! The controller side (`controller`, `robot`, `gait`, `recorder`)
//! drives the device layer: it applies bounded actions as joint
//! set-points, samples sensors, answers resets, and can log expert-data
//! trajectories to CSV.

pub mod config;
pub mod controller;
pub mod env;
pub mod episode;
pub mod error;
pub mod gait;
pub mod observation;
pub mod recorder;
pub mod reward;
pub mod robot;
pub mod termination;
pub mod transport;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{Config, EpisodeConfig, RewardConfig, Task, TransportConfig};

pub use controller::{sample_observation, ActuatorCalibration, ControllerBridge};

pub use env::{HexapodEnv, ResetResult, StepInfo, StepResult};

pub use episode::{EpisodeLifecycle, EpisodePhase};

pub use error::{BridgeError, BridgeResult, ExchangePhase};

pub use gait::GaitGenerator;

pub use observation::{Observation, LIDAR_SENTINEL};

pub use recorder::{CsvSink, NoopSink, TrajectoryRow, TrajectorySink};

pub use reward::{score_step, ScoringState};

pub use robot::{RobotInterface, SimRobot};

pub use termination::{check_done, TerminationReason};

pub use transport::{Channel, EnvListener};

pub use types::{ActionVector, ControlMessage, ACTUATOR_COUNT, FOOT_COUNT, OBS_SIZE};
