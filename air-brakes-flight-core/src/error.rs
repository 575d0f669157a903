use core::fmt;

/// A sample the data processor refused to consume. The sample is dropped and
/// the previous processed state stays current.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOrderingError {
    NonMonotonicTimestamp { previous_us: u64, current_us: u64 },
    NonFinite { timestamp_us: u64 },
}

impl fmt::Display for SampleOrderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonMonotonicTimestamp {
                previous_us,
                current_us,
            } => write!(
                f,
                "sample timestamp {current_us}us is not after the previous sample at {previous_us}us"
            ),
            Self::NonFinite { timestamp_us } => {
                write!(f, "sample at {timestamp_us}us contains non-finite values")
            }
        }
    }
}

impl core::error::Error for SampleOrderingError {}

/// Flight motion began before the requested number of at-rest samples was
/// collected; the partial average is used as the bias estimate.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationIncompleteWarning {
    pub collected: u32,
    pub required: u32,
}

impl fmt::Display for CalibrationIncompleteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "calibration incomplete: {} of {} at-rest samples",
            self.collected, self.required
        )
    }
}

impl core::error::Error for CalibrationIncompleteWarning {}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorTimeoutError {
    pub waited_ms: u32,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    Timeout(SensorTimeoutError),
    Disconnected,
    Malformed,
}

impl From<SensorTimeoutError> for SensorError {
    fn from(value: SensorTimeoutError) -> Self {
        Self::Timeout(value)
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(SensorTimeoutError { waited_ms }) => {
                write!(f, "no sample from the sensor within {waited_ms}ms")
            }
            Self::Disconnected => write!(f, "sensor disconnected"),
            Self::Malformed => write!(f, "sensor delivered an unreadable sample"),
        }
    }
}

impl core::error::Error for SensorError {}

/// The actuator rejected a command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorFaultError {
    pub commanded: f32,
}

impl fmt::Display for ActuatorFaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actuator rejected extension command {}", self.commanded)
    }
}

impl core::error::Error for ActuatorFaultError {}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    MissingTargetApogee,
    /// `name` is the offending configuration key
    InvalidValue { name: &'static str },
    SmoothingWindowTooLarge { requested: usize, capacity: usize },
    DragTableNotIncreasing,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTargetApogee => write!(f, "target apogee is not configured"),
            Self::InvalidValue { name } => write!(f, "invalid value for `{name}`"),
            Self::SmoothingWindowTooLarge {
                requested,
                capacity,
            } => write!(
                f,
                "smoothing window of {requested} samples exceeds the buffer capacity of {capacity}"
            ),
            Self::DragTableNotIncreasing => {
                write!(f, "drag coefficient table must be strictly increasing")
            }
        }
    }
}

impl core::error::Error for ConfigurationError {}

/// Failure of the logging collaborator. Never fatal to the control loop.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    QueueFull,
    WriterStopped,
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "log queue full, record dropped"),
            Self::WriterStopped => write!(f, "log writer is not running"),
        }
    }
}

impl core::error::Error for LogError {}

/// Faults that stop the flight loop. The actuator has already been retracted
/// by the time one of these is returned.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum FlightError {
    Configuration(ConfigurationError),
    Sensor(SensorError),
}

impl From<ConfigurationError> for FlightError {
    fn from(value: ConfigurationError) -> Self {
        Self::Configuration(value)
    }
}

impl From<SensorError> for FlightError {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

impl fmt::Display for FlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::Sensor(e) => write!(f, "sensor fault: {e}"),
        }
    }
}

impl core::error::Error for FlightError {}
