use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// One reading from the IMU, exactly as the sensor source delivered it.
///
/// Frames: `acceleration` and `angular_velocity` are in the body frame.
/// `acceleration` is specific force, so a vehicle at rest reads about +1 g
/// along the world up axis. `orientation` is the attitude of the body in the
/// world frame (z up): `orientation * v_body` expresses `v_body` in world axes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub timestamp_us: u64,
    /// m/s^2
    pub acceleration: Vector3<f32>,
    /// rad/s
    pub angular_velocity: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl RawSample {
    pub fn new(
        timestamp_us: u64,
        acceleration: Vector3<f32>,
        angular_velocity: Vector3<f32>,
        orientation: UnitQuaternion<f32>,
    ) -> Self {
        Self {
            timestamp_us,
            acceleration,
            angular_velocity,
            orientation,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.acceleration.iter().all(|v| v.is_finite())
            && self.angular_velocity.iter().all(|v| v.is_finite())
            && self.orientation.coords.iter().all(|v| v.is_finite())
    }
}

/// World-frame kinematic estimate produced once per cycle by the data processor.
/// Velocities and displacements are relative to the launch pad, up positive.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessedState {
    pub timestamp_us: u64,
    /// m/s
    pub vertical_velocity: f32,
    /// m above the launch pad
    pub vertical_displacement: f32,
    /// smoothed, gravity removed, m/s^2
    pub vertical_acceleration: f32,
    /// m above the launch pad
    pub predicted_apogee: f32,
    /// bias corrected, rad/s
    pub angular_speed: f32,
}

impl ProcessedState {
    pub const fn at_rest(timestamp_us: u64) -> Self {
        Self {
            timestamp_us,
            vertical_velocity: 0.0,
            vertical_displacement: 0.0,
            vertical_acceleration: 0.0,
            predicted_apogee: 0.0,
            angular_speed: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.vertical_velocity.is_finite()
            && self.vertical_displacement.is_finite()
            && self.vertical_acceleration.is_finite()
            && self.predicted_apogee.is_finite()
    }
}

/// Phases are ordered: a flight only ever moves towards `Landed`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlightPhase {
    StandBy,
    MotorBurn,
    Coast,
    FreeFall,
    Landed,
}

impl FlightPhase {
    pub const ALL: [FlightPhase; 5] = [
        FlightPhase::StandBy,
        FlightPhase::MotorBurn,
        FlightPhase::Coast,
        FlightPhase::FreeFall,
        FlightPhase::Landed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FlightPhase::StandBy => "StandBy",
            FlightPhase::MotorBurn => "MotorBurn",
            FlightPhase::Coast => "Coast",
            FlightPhase::FreeFall => "FreeFall",
            FlightPhase::Landed => "Landed",
        }
    }

    /// The only phase this one may transition to.
    pub fn next(self) -> Option<FlightPhase> {
        match self {
            FlightPhase::StandBy => Some(FlightPhase::MotorBurn),
            FlightPhase::MotorBurn => Some(FlightPhase::Coast),
            FlightPhase::Coast => Some(FlightPhase::FreeFall),
            FlightPhase::FreeFall => Some(FlightPhase::Landed),
            FlightPhase::Landed => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Commanded air brakes deployment, always within 0.0 (retracted) - 1.0 (fully extended).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct ExtensionCommand(f32);

impl ExtensionCommand {
    pub const RETRACTED: Self = Self(0.0);

    /// NaN maps to retracted.
    pub fn new(extension: f32) -> Self {
        if extension.is_nan() {
            Self::RETRACTED
        } else {
            Self(extension.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

/// Everything the logging collaborator receives for one cycle.
#[derive(Debug, Clone)]
pub struct FlightRecord {
    pub timestamp_us: u64,
    pub raw: RawSample,
    pub processed: ProcessedState,
    pub phase: FlightPhase,
    pub extension: ExtensionCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered_along_the_flight() {
        let mut phase = FlightPhase::StandBy;
        let mut visited = 1;
        while let Some(next) = phase.next() {
            assert!(next > phase);
            phase = next;
            visited += 1;
        }
        assert_eq!(phase, FlightPhase::Landed);
        assert_eq!(visited, FlightPhase::ALL.len());
    }

    #[test]
    fn extension_command_is_clamped() {
        assert_eq!(ExtensionCommand::new(1.4).value(), 1.0);
        assert_eq!(ExtensionCommand::new(-0.2).value(), 0.0);
        assert_eq!(ExtensionCommand::new(f32::NAN), ExtensionCommand::RETRACTED);
        assert_eq!(ExtensionCommand::new(0.25).value(), 0.25);
    }
}
