// src/robot.rs
//
// Device-layer interface to the physics simulator, plus a deterministic
// simulated robot for tests and the demo harness.
//
// The real device layer (motor actuation, encoder/IMU/foot reads, lidar,
// centre-of-mass query) lives in the external simulator process; this
// trait is its contract. Centre of mass is only available when the
// controller runs with supervisor capability, hence the Option.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::gait;
use crate::types::{ACTUATOR_COUNT, FOOT_COUNT};

/// Contract between the controller bridge and the simulated hardware.
pub trait RobotInterface {
    /// Command one set-point per actuator (rad).
    fn apply_targets(&mut self, targets: &[f64; ACTUATOR_COUNT]);

    /// Advance simulated time by `dt` seconds.
    fn advance(&mut self, dt: f64);

    /// Joint position sensor readings, actuator order (rad).
    fn joint_sensors(&self) -> [f64; ACTUATOR_COUNT];

    /// Roll, pitch, yaw (rad).
    fn imu(&self) -> [f64; 3];

    /// Norm of the accelerometer reading (m/s^2).
    fn acceleration_norm(&self) -> f64;

    /// Foot contact readings, nominally 0/1 with sensor noise.
    fn foot_contacts(&self) -> [f64; FOOT_COUNT];

    /// Range readings; channel 1 doubles as the height proxy. May contain
    /// non-finite values when the body is inverted.
    fn lidar(&self) -> Vec<f64>;

    /// Centre of mass (x, y, z); None without supervisor capability.
    fn center_of_mass(&self) -> Option<[f64; 3]>;

    /// Return to the neutral stance (reset).
    fn rehome(&mut self);
}

/// First-order kinematic stand-in for the physics simulator.
///
/// Joints chase their commanded set-points with a fixed rate; body height
/// and tilt are derived from the pose. Deterministic given the seed, so
/// two runs with the same action sequence produce identical trajectories.
pub struct SimRobot {
    joints: [f64; ACTUATOR_COUNT],
    targets: [f64; ACTUATOR_COUNT],
    roll: f64,
    pitch: f64,
    yaw: f64,
    x_drift: f64,
    rng: ChaCha8Rng,
    noise_scale: f64,
    has_com: bool,
    seed: u64,
}

/// Joint tracking rate (fraction of remaining error closed per second).
const TRACK_RATE: f64 = 8.0;

/// Tilt beyond which the lidar loses the ground return.
const LIDAR_SATURATION_TILT: f64 = 1.5;

impl SimRobot {
    pub fn new(seed: u64) -> Self {
        let mut robot = Self {
            joints: [0.0; ACTUATOR_COUNT],
            targets: [0.0; ACTUATOR_COUNT],
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            x_drift: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            noise_scale: 0.0,
            has_com: true,
            seed,
        };
        robot.rehome();
        robot
    }

    /// Add bounded uniform sensor noise (0 disables it).
    pub fn with_noise(mut self, scale: f64) -> Self {
        self.noise_scale = scale.max(0.0);
        self
    }

    /// Drop the centre-of-mass capability (non-supervisor controller).
    pub fn without_center_of_mass(mut self) -> Self {
        self.has_com = false;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn noise(&mut self) -> f64 {
        if self.noise_scale > 0.0 {
            self.rng.gen_range(-self.noise_scale..self.noise_scale)
        } else {
            0.0
        }
    }

    /// Body height derived from how far the tibias deviate from the
    /// standing bend, on the lidar height scale (3.0 when standing).
    fn body_height(&self) -> f64 {
        let tibia_dev: f64 = self.joints[12..18]
            .iter()
            .map(|&j| (j - gait::OFFSETS[12]).abs())
            .sum::<f64>()
            / 6.0;
        let tilt_drop = 2.0 * (self.roll.abs() + self.pitch.abs());
        (3.0 - 2.5 * tibia_dev - tilt_drop).max(0.0)
    }
}

impl RobotInterface for SimRobot {
    fn apply_targets(&mut self, targets: &[f64; ACTUATOR_COUNT]) {
        self.targets = *targets;
    }

    fn advance(&mut self, dt: f64) {
        let alpha = (TRACK_RATE * dt).min(1.0);
        for i in 0..ACTUATOR_COUNT {
            let jitter = self.noise();
            self.joints[i] += (self.targets[i] - self.joints[i]) * alpha + jitter;
        }

        // Uneven tripod loading nudges the body; tracking error decays it.
        let asymmetry: f64 = (0..6)
            .map(|leg| self.joints[leg] - gait::OFFSETS[leg])
            .sum::<f64>()
            / 6.0;
        self.roll = 0.9 * self.roll + 0.05 * asymmetry;
        self.pitch *= 0.9;
        self.x_drift += 0.01 * asymmetry.abs();
    }

    fn joint_sensors(&self) -> [f64; ACTUATOR_COUNT] {
        self.joints
    }

    fn imu(&self) -> [f64; 3] {
        [self.roll, self.pitch, self.yaw]
    }

    fn acceleration_norm(&self) -> f64 {
        9.81
    }

    fn foot_contacts(&self) -> [f64; FOOT_COUNT] {
        let grounded = self.roll.abs() < 0.6 && self.pitch.abs() < 0.6;
        let mut out = [0.0; FOOT_COUNT];
        for v in out.iter_mut() {
            *v = if grounded { 1.0 } else { 0.0 };
        }
        out
    }

    fn lidar(&self) -> Vec<f64> {
        let inverted =
            self.roll.abs() > LIDAR_SATURATION_TILT || self.pitch.abs() > LIDAR_SATURATION_TILT;
        let h = if inverted {
            f64::INFINITY
        } else {
            self.body_height()
        };
        // Channels: front range, downward height proxy, left, right.
        vec![h + 0.5, h, h + 0.3, h + 0.3]
    }

    fn center_of_mass(&self) -> Option<[f64; 3]> {
        if !self.has_com {
            return None;
        }
        Some([self.x_drift, 0.0, self.body_height() / 3.0])
    }

    fn rehome(&mut self) {
        self.joints = gait::OFFSETS;
        self.targets = gait::OFFSETS;
        self.roll = 0.0;
        self.pitch = 0.0;
        self.yaw = 0.0;
        self.x_drift = 0.0;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}
