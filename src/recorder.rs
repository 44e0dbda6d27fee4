// src/recorder.rs
//
// Trajectory sinks for the controller side.
// - TrajectorySink: trait used by the controller bridge
// - NoopSink:       discards all rows
// - CsvSink:        writes one fixed-column row per accepted step for
//                   expert-data collection / behaviour cloning
//
// The core never reads this file back; it is an external artifact.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::observation::Observation;
use crate::types::{ACTUATOR_COUNT, COM_DIMS, FOOT_COUNT};

/// Motor device names, learner order (hips, femurs, tibias; legs RP, RM,
/// RA, LP, LM, LA within each group).
pub const MOTOR_NAMES: [&str; ACTUATOR_COUNT] = [
    "RPC", "RMC", "RAC", "LPC", "LMC", "LAC", // hips
    "RPF", "RMF", "RAF", "LPF", "LMF", "LAF", // femurs
    "RPT", "RMT", "RAT", "LPT", "LMT", "LAT", // tibias
];

/// Foot touch sensor device names.
pub const FOOT_NAMES: [&str; FOOT_COUNT] = ["LAS", "LMS", "LPS", "RAS", "RMS", "RPS"];

/// Columns: time + commands + 2 IMU features + encoders + feet + com.
pub const COLUMN_COUNT: usize = 1 + ACTUATOR_COUNT + 2 + ACTUATOR_COUNT + FOOT_COUNT + COM_DIMS;

/// One row of the expert-data table.
#[derive(Debug, Clone)]
pub struct TrajectoryRow {
    /// Simulated time, seconds.
    pub time_s: f64,
    /// Commanded joint set-points.
    pub commanded: [f64; ACTUATOR_COUNT],
    /// IMU features logged: roll and accelerometer norm.
    pub imu_roll: f64,
    pub imu_acc_norm: f64,
    /// Encoder readings after the step.
    pub encoders: [f64; ACTUATOR_COUNT],
    /// Foot contact readings.
    pub feet: [f64; FOOT_COUNT],
    /// Centre of mass (zeros when unavailable).
    pub com: [f64; COM_DIMS],
}

impl TrajectoryRow {
    /// Build a row from the commanded targets and the sampled observation.
    pub fn from_step(
        time_s: f64,
        commanded: &[f64; ACTUATOR_COUNT],
        acc_norm: f64,
        obs: &Observation,
    ) -> Self {
        let mut encoders = [0.0; ACTUATOR_COUNT];
        for (dst, src) in encoders.iter_mut().zip(obs.joint_sensors.iter()) {
            *dst = *src;
        }
        let mut feet = [0.0; FOOT_COUNT];
        for (dst, src) in feet.iter_mut().zip(obs.foot_contacts.iter()) {
            *dst = *src;
        }
        let mut com = [0.0; COM_DIMS];
        for (dst, src) in com.iter_mut().zip(obs.com.iter()) {
            *dst = *src;
        }
        Self {
            time_s,
            commanded: *commanded,
            imu_roll: obs.roll(),
            imu_acc_norm: acc_norm,
            encoders,
            feet,
            com,
        }
    }
}

/// Abstract per-step trajectory sink.
pub trait TrajectorySink {
    fn record(&mut self, row: &TrajectoryRow);
}

/// Sink that discards all rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TrajectorySink for NoopSink {
    fn record(&mut self, _row: &TrajectoryRow) {
        // intentionally no-op
    }
}

/// CSV file sink with the fixed expert-data column layout.
pub struct CsvSink {
    writer: BufWriter<File>,
}

impl CsvSink {
    /// Create the file and write the header row.
    pub fn create(path: &str) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut header: Vec<String> = Vec::with_capacity(COLUMN_COUNT);
        header.push("time".to_string());
        header.extend(MOTOR_NAMES.iter().map(|n| n.to_string()));
        header.push("imu_roll".to_string());
        header.push("imu_acc_norm".to_string());
        header.extend(MOTOR_NAMES.iter().map(|n| format!("enc_{n}")));
        header.extend(FOOT_NAMES.iter().map(|n| n.to_string()));
        header.push("com_x".to_string());
        header.push("com_y".to_string());
        header.push("com_z".to_string());
        debug_assert_eq!(header.len(), COLUMN_COUNT);

        writeln!(writer, "{}", header.join(","))?;
        Ok(Self { writer })
    }

    /// Flush buffered rows to disk.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl TrajectorySink for CsvSink {
    fn record(&mut self, row: &TrajectoryRow) {
        let mut fields: Vec<String> = Vec::with_capacity(COLUMN_COUNT);
        fields.push(format!("{}", row.time_s));
        fields.extend(row.commanded.iter().map(|v| format!("{v}")));
        fields.push(format!("{}", row.imu_roll));
        fields.push(format!("{}", row.imu_acc_norm));
        fields.extend(row.encoders.iter().map(|v| format!("{v}")));
        fields.extend(row.feet.iter().map(|v| format!("{v}")));
        fields.extend(row.com.iter().map(|v| format!("{v}")));

        // A failed write is reported once the sink is flushed/dropped;
        // recording must not abort the control loop.
        let _ = writeln!(self.writer, "{}", fields.join(","));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_observation() -> Observation {
        Observation {
            joint_sensors: vec![0.5; ACTUATOR_COUNT],
            imu: vec![0.02, -0.01, 0.0],
            foot_contacts: vec![1.0; FOOT_COUNT],
            com: vec![0.1, 0.2, 1.0],
            lidar: vec![3.0; 4],
        }
    }

    #[test]
    fn test_column_count() {
        assert_eq!(COLUMN_COUNT, 48);
    }

    #[test]
    fn test_row_from_step_copies_fields() {
        let obs = make_observation();
        let commanded = [0.25; ACTUATOR_COUNT];
        let row = TrajectoryRow::from_step(1.5, &commanded, 9.81, &obs);

        assert_eq!(row.time_s, 1.5);
        assert_eq!(row.imu_roll, 0.02);
        assert_eq!(row.encoders, [0.5; ACTUATOR_COUNT]);
        assert_eq!(row.com, [0.1, 0.2, 1.0]);
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expert_data.csv");
        let path_str = path.to_str().unwrap();

        let mut sink = CsvSink::create(path_str).unwrap();
        let obs = make_observation();
        let commanded = [0.25; ACTUATOR_COUNT];
        for step in 0..3 {
            let row = TrajectoryRow::from_step(step as f64 * 0.032, &commanded, 9.81, &obs);
            sink.record(&row);
        }
        sink.flush().unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(path_str).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4, "header plus three rows");

        let header: Vec<&str> = lines[0].split(',').collect();
        assert_eq!(header.len(), COLUMN_COUNT);
        assert_eq!(header[0], "time");
        assert_eq!(header[1], "RPC");
        assert_eq!(header[19], "imu_roll");
        assert_eq!(header[20], "imu_acc_norm");
        assert_eq!(header[21], "enc_RPC");
        assert_eq!(header[COLUMN_COUNT - 1], "com_z");

        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), COLUMN_COUNT);
        }
    }
}
