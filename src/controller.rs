// src/controller.rs
//
// Controller-side loop of the wire protocol.
//
// Connects to the learner's listening port, then serves synchronous
// exchanges until the learner hangs up:
// - Action document  -> apply to the robot, advance, reply one
//                       ObservationReply document;
// - ResetRequest     -> re-home the robot, reply one newline-terminated
//                       ResetAck.
//
// Inbound messages are classified through the closed ControlMessage set;
// a learner-side message that is neither of the two inbound shapes is a
// protocol violation.

use serde_json::Value;

use crate::error::{BridgeError, BridgeResult, ExchangePhase};
use crate::gait;
use crate::observation::Observation;
use crate::recorder::{NoopSink, TrajectoryRow, TrajectorySink};
use crate::robot::RobotInterface;
use crate::transport::Channel;
use crate::types::{ActionVector, ControlMessage, ACTUATOR_COUNT, RESET_COMPLETE_STATUS};

/// Maps bounded actions onto joint set-points: the action modulates the
/// neutral pose within the per-joint safe amplitude.
#[derive(Debug, Clone)]
pub struct ActuatorCalibration {
    /// Neutral set-point per actuator (rad).
    pub centers: [f64; ACTUATOR_COUNT],
    /// Signed modulation range per actuator (rad per unit action).
    pub ranges: [f64; ACTUATOR_COUNT],
}

impl Default for ActuatorCalibration {
    fn default() -> Self {
        Self {
            centers: gait::OFFSETS,
            ranges: gait::AMPLITUDES,
        }
    }
}

impl ActuatorCalibration {
    pub fn targets_for(&self, action: &ActionVector) -> [f64; ACTUATOR_COUNT] {
        let mut out = [0.0; ACTUATOR_COUNT];
        for (i, &a) in action.as_slice().iter().enumerate().take(ACTUATOR_COUNT) {
            out[i] = self.centers[i] + self.ranges[i] * a;
        }
        out
    }
}

/// Client side of the bridge, driving one robot.
pub struct ControllerBridge<R: RobotInterface, S: TrajectorySink = NoopSink> {
    channel: Channel,
    robot: R,
    sink: S,
    calibration: ActuatorCalibration,
    dt: f64,
    time: f64,
}

impl<R: RobotInterface> ControllerBridge<R, NoopSink> {
    /// Connect to the learner endpoint, retrying briefly while its
    /// listener comes up.
    pub fn connect(host: &str, port: u16, robot: R, dt: f64) -> BridgeResult<Self> {
        let channel = Channel::connect((host, port), 40)?;
        Ok(Self {
            channel,
            robot,
            sink: NoopSink,
            calibration: ActuatorCalibration::default(),
            dt,
            time: 0.0,
        })
    }
}

impl<R: RobotInterface, S: TrajectorySink> ControllerBridge<R, S> {
    /// Swap in a trajectory sink (CSV expert-data collection).
    pub fn with_sink<S2: TrajectorySink>(self, sink: S2) -> ControllerBridge<R, S2> {
        ControllerBridge {
            channel: self.channel,
            robot: self.robot,
            sink,
            calibration: self.calibration,
            dt: self.dt,
            time: self.time,
        }
    }

    pub fn with_calibration(mut self, calibration: ActuatorCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Serve exchanges until the learner closes the connection.
    pub fn run(&mut self) -> BridgeResult<()> {
        loop {
            let value = match self
                .channel
                .recv_document_opt::<Value>(ExchangePhase::StepExchange)?
            {
                Some(value) => value,
                // Clean hang-up between exchanges: the run is over.
                None => return Ok(()),
            };

            match ControlMessage::from_value(value, ExchangePhase::StepExchange)? {
                ControlMessage::Action(action) => self.handle_action(&action)?,
                ControlMessage::ResetRequest => self.handle_reset()?,
                other => {
                    return Err(BridgeError::protocol(
                        ExchangePhase::StepExchange,
                        format!("unexpected message from learner: {other:?}"),
                    ));
                }
            }
        }
    }

    fn handle_action(&mut self, action: &ActionVector) -> BridgeResult<()> {
        let targets = self.calibration.targets_for(action);
        self.robot.apply_targets(&targets);
        self.robot.advance(self.dt);
        self.time += self.dt;

        let obs = sample_observation(&self.robot);
        self.sink.record(&TrajectoryRow::from_step(
            self.time,
            &targets,
            self.robot.acceleration_norm(),
            &obs,
        ));

        self.channel
            .send_document(&obs, ExchangePhase::StepExchange)
    }

    fn handle_reset(&mut self) -> BridgeResult<()> {
        self.robot.rehome();
        self.time = 0.0;

        let ack = ControlMessage::ResetAck {
            status: RESET_COMPLETE_STATUS.to_string(),
        };
        self.channel
            .send_line(&ack.to_value(), ExchangePhase::ResetHandshake)
    }
}

/// Sensor snapshot in wire shape. Centre of mass falls back to zeros when
/// the simulator runs without supervisor capability.
pub fn sample_observation<R: RobotInterface>(robot: &R) -> Observation {
    Observation {
        joint_sensors: robot.joint_sensors().to_vec(),
        imu: robot.imu().to_vec(),
        foot_contacts: robot.foot_contacts().to_vec(),
        com: robot
            .center_of_mass()
            .map(|c| c.to_vec())
            .unwrap_or_else(|| vec![0.0; 3]),
        lidar: robot.lidar(),
    }
}
