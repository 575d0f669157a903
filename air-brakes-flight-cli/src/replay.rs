use std::{
    fs::File,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use csv::{DeserializeRecordsIntoIter, Reader};
use log::{debug, warn};

use air_brakes_flight_core::{RawSample, SensorError, SensorSource};

use crate::sample_record::SampleRecord;

/// Slowest paced replay, a thousandth of real time.
const MIN_SPEED: f32 = 1e-3;

/// Plays a recorded flight table back as a sensor, keeping the original
/// spacing between samples.
pub struct ReplaySource {
    path: PathBuf,
    records: DeserializeRecordsIntoIter<File, SampleRecord>,
    /// 1.0 is real time, 0.0 replays as fast as possible
    speed: f32,
    /// wall clock and sample time of the first replayed sample
    start: Option<(Instant, u64)>,
    row: usize,
}

impl ReplaySource {
    pub fn open(path: &Path, speed: f32) -> Result<Self> {
        let speed = if speed.is_finite() && speed > 0.0 {
            if speed < MIN_SPEED {
                warn!("replay speed {} too slow, using {}", speed, MIN_SPEED);
            }
            speed.max(MIN_SPEED)
        } else {
            0.0
        };
        Ok(Self {
            path: path.to_path_buf(),
            records: Self::read(path)?,
            speed,
            start: None,
            row: 0,
        })
    }

    fn read(path: &Path) -> Result<DeserializeRecordsIntoIter<File, SampleRecord>> {
        let file = File::open(path)
            .with_context(|| format!("failed to open flight recording {}", path.display()))?;
        Ok(Reader::from_reader(file).into_deserialize())
    }

    /// Rewinds to the first sample.
    #[cfg(test)]
    pub fn restart(&mut self) -> Result<()> {
        self.records = Self::read(&self.path)?;
        self.start = None;
        self.row = 0;
        Ok(())
    }

    fn pace(&mut self, timestamp_us: u64) {
        if self.speed <= 0.0 {
            return;
        }

        let (started_at, first_us) = *self.start.get_or_insert((Instant::now(), timestamp_us));
        let recorded = Duration::from_micros(timestamp_us.saturating_sub(first_us));
        let due = recorded.div_f32(self.speed);
        let elapsed = started_at.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}

impl SensorSource for ReplaySource {
    fn next(&mut self) -> Result<Option<RawSample>, SensorError> {
        let Some(record) = self.records.next() else {
            debug!("end of recording after {} rows", self.row);
            return Ok(None);
        };
        self.row += 1;

        let record = record.map_err(|e| {
            warn!("row {} of {}: {}", self.row, self.path.display(), e);
            SensorError::Malformed
        })?;
        let Some(sample) = record.to_raw_sample() else {
            warn!(
                "row {} of {}: bad timestamp {}",
                self.row,
                self.path.display(),
                record.timestamp_s
            );
            return Err(SensorError::Malformed);
        };
        self.pace(sample.timestamp_us);
        Ok(Some(sample))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const TABLE: &str = "\
timestamp_s,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z,quat_w,quat_x,quat_y,quat_z
0.00,0.0,0.0,9.81,0.0,0.0,0.0,1.0,0.0,0.0,0.0
0.01,0.0,0.0,9.80,0.0,0.0,0.0,1.0,0.0,0.0,0.0
0.02,0.0,0.0,9.82,0.0,0.0,0.0,1.0,0.0,0.0,0.0
";

    fn write_table(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_until_end_of_stream() {
        let file = write_table(TABLE);
        let mut source = ReplaySource::open(file.path(), 0.0).unwrap();

        let timestamps: Vec<u64> = std::iter::from_fn(|| source.next().unwrap())
            .map(|s| s.timestamp_us)
            .collect();
        assert_eq!(timestamps, vec![0, 10_000, 20_000]);
        assert_eq!(source.next(), Ok(None));

        source.restart().unwrap();
        assert_eq!(source.next().unwrap().unwrap().timestamp_us, 0);
    }

    #[test]
    fn paces_to_recording_time() {
        let file = write_table(TABLE);
        let mut source = ReplaySource::open(file.path(), 1.0).unwrap();

        let start = Instant::now();
        while source.next().unwrap().is_some() {}
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn malformed_row_is_reported() {
        let file = write_table(&format!("{TABLE}0.03,0.0,oops,9.81,0.0,0.0,0.0,1.0,0.0,0.0,0.0\n"));
        let mut source = ReplaySource::open(file.path(), 0.0).unwrap();
        for _ in 0..3 {
            assert!(source.next().unwrap().is_some());
        }
        assert_eq!(source.next(), Err(SensorError::Malformed));
    }

    #[test]
    fn non_finite_timestamp_is_malformed() {
        let file = write_table(&format!(
            "{TABLE}NaN,0.0,0.0,9.81,0.0,0.0,0.0,1.0,0.0,0.0,0.0\n\
             0.04,0.0,0.0,9.81,0.0,0.0,0.0,1.0,0.0,0.0,0.0\n"
        ));
        let mut source = ReplaySource::open(file.path(), 0.0).unwrap();
        for _ in 0..3 {
            assert!(source.next().unwrap().is_some());
        }
        assert_eq!(source.next(), Err(SensorError::Malformed));
        // the rows after it still replay
        assert_eq!(source.next().unwrap().unwrap().timestamp_us, 40_000);
    }

    #[test]
    fn tiny_speed_is_clamped() {
        let file = write_table(TABLE);
        let source = ReplaySource::open(file.path(), 1e-40).unwrap();
        assert_eq!(source.speed, MIN_SPEED);

        // the longest recording u64 microseconds can hold still paces
        let due = Duration::from_micros(u64::MAX).div_f32(source.speed);
        assert!(due > Duration::from_micros(u64::MAX));

        for speed in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            assert_eq!(ReplaySource::open(file.path(), speed).unwrap().speed, 0.0);
        }
        assert_eq!(ReplaySource::open(file.path(), 4.0).unwrap().speed, 4.0);
    }

    #[test]
    fn missing_recording_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplaySource::open(&dir.path().join("flight.csv"), 1.0).is_err());
    }
}
