use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use csv::Writer;
use log::{info, warn};
use serde::Serialize;

use air_brakes_flight_core::{FlightLogger, FlightPhase, FlightRecord, LogError};

/// One row of the flight data log.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct LogRow {
    timestamp_s: f64,
    phase: FlightPhase,
    extension: f32,
    accel_x: f32,
    accel_y: f32,
    accel_z: f32,
    gyro_x: f32,
    gyro_y: f32,
    gyro_z: f32,
    quat_w: f32,
    quat_x: f32,
    quat_y: f32,
    quat_z: f32,
    vertical_velocity: f32,
    vertical_displacement: f32,
    vertical_acceleration: f32,
    predicted_apogee: f32,
    angular_speed: f32,
}

impl From<&FlightRecord> for LogRow {
    fn from(record: &FlightRecord) -> Self {
        let raw = &record.raw;
        let q = raw.orientation.quaternion();
        Self {
            timestamp_s: record.timestamp_us as f64 / 1_000_000.0,
            phase: record.phase,
            extension: record.extension.value(),
            accel_x: raw.acceleration.x,
            accel_y: raw.acceleration.y,
            accel_z: raw.acceleration.z,
            gyro_x: raw.angular_velocity.x,
            gyro_y: raw.angular_velocity.y,
            gyro_z: raw.angular_velocity.z,
            quat_w: q.w,
            quat_x: q.i,
            quat_y: q.j,
            quat_z: q.k,
            vertical_velocity: record.processed.vertical_velocity,
            vertical_displacement: record.processed.vertical_displacement,
            vertical_acceleration: record.processed.vertical_acceleration,
            predicted_apogee: record.processed.predicted_apogee,
            angular_speed: record.processed.angular_speed,
        }
    }
}

enum LogMessage {
    Record(Box<LogRow>),
    Stop,
}

/// Writes flight records to `log_<n>.csv` on a background thread so the
/// control loop never waits on the disk.
pub struct CsvFlightLogger {
    path: PathBuf,
    sender: Option<SyncSender<LogMessage>>,
    writer: Option<JoinHandle<()>>,
}

impl CsvFlightLogger {
    /// Creates the next unused `log_<n>.csv` in `dir`.
    pub fn create(dir: &Path, queue_capacity: usize) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let path = next_log_path(dir);
        let file = File::create_new(&path)
            .with_context(|| format!("failed to create flight log {}", path.display()))?;

        let (sender, receiver) = sync_channel(queue_capacity.max(1));
        let writer = thread::Builder::new()
            .name("flight-log".into())
            .spawn(move || write_rows(Writer::from_writer(file), receiver))
            .context("failed to start flight log writer")?;

        info!("logging flight data to {}", path.display());
        Ok(Self {
            path,
            sender: Some(sender),
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn next_log_path(dir: &Path) -> PathBuf {
    let mut n = 0u32;
    loop {
        let path = dir.join(format!("log_{n}.csv"));
        if !path.exists() {
            return path;
        }
        n += 1;
    }
}

fn write_rows(mut writer: Writer<File>, receiver: Receiver<LogMessage>) {
    while let Ok(message) = receiver.recv() {
        match message {
            LogMessage::Record(row) => {
                if let Err(e) = writer.serialize(row.as_ref()) {
                    warn!("flight log write failed, writer stopping: {}", e);
                    return;
                }
            }
            LogMessage::Stop => break,
        }
    }

    if let Err(e) = writer.flush() {
        warn!("flight log flush failed: {}", e);
    }
}

impl FlightLogger for CsvFlightLogger {
    fn log(&mut self, record: &FlightRecord) -> Result<(), LogError> {
        let Some(sender) = &self.sender else {
            return Err(LogError::WriterStopped);
        };

        match sender.try_send(LogMessage::Record(Box::new(record.into()))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LogError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(LogError::WriterStopped),
        }
    }

    /// Drains the queue and stops the writer. Later records are refused.
    fn flush(&mut self) -> Result<(), LogError> {
        let Some(sender) = self.sender.take() else {
            return Ok(());
        };
        // a stopped writer has already flushed what it could
        let _ = sender.send(LogMessage::Stop);
        drop(sender);

        match self.writer.take().map(JoinHandle::join) {
            Some(Err(_)) => Err(LogError::WriterStopped),
            _ => Ok(()),
        }
    }
}

impl Drop for CsvFlightLogger {
    fn drop(&mut self) {
        if self.flush().is_err() {
            warn!("flight log writer panicked, {} may be truncated", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use air_brakes_flight_core::{ExtensionCommand, ProcessedState, RawSample};
    use nalgebra::{UnitQuaternion, Vector3};

    use super::*;

    fn record(timestamp_us: u64, phase: FlightPhase, extension: f32) -> FlightRecord {
        FlightRecord {
            timestamp_us,
            raw: RawSample::new(
                timestamp_us,
                Vector3::new(0.0, 0.0, 9.81),
                Vector3::zeros(),
                UnitQuaternion::identity(),
            ),
            processed: ProcessedState::at_rest(timestamp_us),
            phase,
            extension: ExtensionCommand::new(extension),
        }
    }

    #[test]
    fn writes_every_record_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = CsvFlightLogger::create(dir.path(), 16).unwrap();
        assert_eq!(logger.path(), dir.path().join("log_0.csv"));

        logger.log(&record(0, FlightPhase::StandBy, 0.0)).unwrap();
        logger.log(&record(10_000, FlightPhase::MotorBurn, 0.0)).unwrap();
        logger.log(&record(20_000, FlightPhase::Coast, 0.4)).unwrap();
        logger.flush().unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join("log_0.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "timestamp_s");
        assert_eq!(&headers[1], "phase");
        assert_eq!(&headers[2], "extension");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][1], "MotorBurn");
        assert_eq!(&rows[2][0], "0.02");
        assert_eq!(&rows[2][2], "0.4");
    }

    #[test]
    fn picks_the_next_free_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("log_0.csv"), "").unwrap();
        fs::write(dir.path().join("log_1.csv"), "").unwrap();

        let logger = CsvFlightLogger::create(dir.path(), 4).unwrap();
        assert_eq!(logger.path(), dir.path().join("log_2.csv"));
    }

    #[test]
    fn refuses_records_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = CsvFlightLogger::create(dir.path(), 4).unwrap();
        logger.flush().unwrap();
        assert_eq!(
            logger.log(&record(0, FlightPhase::Landed, 0.0)),
            Err(LogError::WriterStopped)
        );
        // second flush is a no-op
        assert_eq!(logger.flush(), Ok(()));
    }
}
