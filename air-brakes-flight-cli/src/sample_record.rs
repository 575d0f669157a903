use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use air_brakes_flight_core::RawSample;

/// One row of a recorded flight table, also the line format of the IMU bridge.
/// Acceleration in m/s^2 (specific force), angular rate in rad/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp_s: f64,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub quat_w: f32,
    pub quat_x: f32,
    pub quat_y: f32,
    pub quat_z: f32,
}

impl SampleRecord {
    /// `None` when the timestamp is negative or not a number.
    pub fn to_raw_sample(&self) -> Option<RawSample> {
        if !self.timestamp_s.is_finite() || self.timestamp_s < 0.0 {
            return None;
        }
        Some(RawSample::new(
            (self.timestamp_s * 1_000_000.0).round() as u64,
            Vector3::new(self.accel_x, self.accel_y, self.accel_z),
            Vector3::new(self.gyro_x, self.gyro_y, self.gyro_z),
            UnitQuaternion::from_quaternion(Quaternion::new(
                self.quat_w,
                self.quat_x,
                self.quat_y,
                self.quat_z,
            )),
        ))
    }
}

impl From<&RawSample> for SampleRecord {
    fn from(sample: &RawSample) -> Self {
        let q = sample.orientation.quaternion();
        Self {
            timestamp_s: sample.timestamp_us as f64 / 1_000_000.0,
            accel_x: sample.acceleration.x,
            accel_y: sample.acceleration.y,
            accel_z: sample.acceleration.z,
            gyro_x: sample.angular_velocity.x,
            gyro_y: sample.angular_velocity.y,
            gyro_z: sample.angular_velocity.z,
            quat_w: q.w,
            quat_x: q.i,
            quat_y: q.j,
            quat_z: q.k,
        }
    }
}
