use std::{
    io::{self, BufRead, BufReader, Read},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{info, warn};
use serialport::SerialPort;

use air_brakes_flight_core::{RawSample, SensorError, SensorSource, SensorTimeoutError};

use crate::sample_record::SampleRecord;

/// Live IMU bridge streaming one CSV row per sample, same columns as a
/// recorded flight table.
pub struct SerialImuSource<R: Read> {
    reader: BufReader<R>,
    line: String,
    timeout_ms: u32,
}

impl SerialImuSource<Box<dyn SerialPort>> {
    pub fn open(port_name: &str, baud_rate: u32, timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .with_context(|| format!("failed to open imu port {port_name}"))?;
        info!("reading imu from {} at {} baud", port_name, baud_rate);
        Ok(Self::from_reader(port, timeout_ms))
    }
}

impl<R: Read> SerialImuSource<R> {
    /// `reader` must fail with `TimedOut` when nothing arrives within `timeout_ms`.
    pub fn from_reader(reader: R, timeout_ms: u64) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
            timeout_ms: timeout_ms.min(u32::MAX as u64) as u32,
        }
    }

    fn parse(line: &str) -> Result<SampleRecord, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes());
        match reader.deserialize().next() {
            Some(record) => record,
            None => Err(csv::Error::from(io::Error::from(io::ErrorKind::UnexpectedEof))),
        }
    }
}

impl<R: Read> SensorSource for SerialImuSource<R> {
    fn next(&mut self) -> Result<Option<RawSample>, SensorError> {
        loop {
            // a partial line survives a timeout and is completed by the next read
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    warn!("imu port closed");
                    return Err(SensorError::Disconnected);
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    return Err(SensorTimeoutError {
                        waited_ms: self.timeout_ms,
                    }
                    .into());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("imu read failed: {}", e);
                    return Err(SensorError::Disconnected);
                }
            }

            let line = self.line.trim();
            if line.is_empty() || line.starts_with("timestamp") {
                self.line.clear();
                continue;
            }

            let parsed = Self::parse(line);
            self.line.clear();
            return match parsed {
                Ok(record) => match record.to_raw_sample() {
                    Some(sample) => Ok(Some(sample)),
                    None => {
                        warn!("imu row with bad timestamp {}", record.timestamp_s);
                        Err(SensorError::Malformed)
                    }
                },
                Err(e) => {
                    warn!("unreadable imu row: {}", e);
                    Err(SensorError::Malformed)
                }
            };
        }
    }
}
