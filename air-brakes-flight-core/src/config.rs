use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Capacity of the smoothing buffer, the configured window must fit in it.
pub const MAX_SMOOTHING_WINDOW: usize = 64;
/// Number of recent accelerations kept for re-integration after launch detection.
pub const ACCELERATION_HISTORY_LEN: usize = 128;

/// Static per-flight tuning. Nothing in here is mutated once the flight loop starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// m above the launch pad
    pub target_apogee_m: Option<f32>,
    /// cycles between command retries while the actuator is unresponsive
    pub actuator_retry_interval: u32,
    pub processor: ProcessorConfig,
    pub apogee_model: ApogeeModelConfig,
    pub transitions: TransitionConfig,
    pub controller: ControllerConfig,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            target_apogee_m: None,
            actuator_retry_interval: 10,
            processor: ProcessorConfig::default(),
            apogee_model: ApogeeModelConfig::default(),
            transitions: TransitionConfig::default(),
            controller: ControllerConfig::default(),
        }
    }
}

impl FlightConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.target_apogee_m {
            None => return Err(ConfigurationError::MissingTargetApogee),
            Some(target) => ensure(target.is_finite() && target > 0.0, "target_apogee_m")?,
        }
        ensure(self.actuator_retry_interval > 0, "actuator_retry_interval")?;

        self.processor.validate()?;
        self.apogee_model.validate()?;
        self.transitions.validate()?;
        self.controller.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// number of at-rest samples averaged into the bias estimate
    pub calibration_samples: u32,
    /// a pad sample only counts as at rest if |acc| is this close to 1 g, m/s^2
    pub calibration_rest_tolerance: f32,
    /// moving average length for the reported vertical acceleration
    pub smoothing_window: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 200,
            calibration_rest_tolerance: 1.0,
            smoothing_window: 5,
        }
    }
}

impl ProcessorConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        ensure(self.calibration_samples > 0, "processor.calibration_samples")?;
        ensure_positive(
            self.calibration_rest_tolerance,
            "processor.calibration_rest_tolerance",
        )?;
        ensure(self.smoothing_window > 0, "processor.smoothing_window")?;
        if self.smoothing_window > MAX_SMOOTHING_WINDOW {
            return Err(ConfigurationError::SmoothingWindowTooLarge {
                requested: self.smoothing_window,
                capacity: MAX_SMOOTHING_WINDOW,
            });
        }
        Ok(())
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApogeeModelKind {
    Ballistic,
    Rk2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApogeeModelConfig {
    pub kind: ApogeeModelKind,
    /// kg
    pub burnout_mass: f32,
    /// cd is a look up table from extension percentage to cd
    /// e.g. cd[2] is cd at 50% extension percentage
    pub drag_coefficients: [f32; 5],
    /// m^2
    pub reference_area: f32,
    /// m, used for the air density estimate
    pub launch_site_altitude_asl: f32,
    /// s, integration step of the rk2 estimator
    pub rk2_time_step: f32,
}

impl Default for ApogeeModelConfig {
    fn default() -> Self {
        Self {
            kind: ApogeeModelKind::Ballistic,
            burnout_mass: 17.607,
            drag_coefficients: [0.47044, 0.5082, 0.57784, 0.665, 0.74313],
            reference_area: 0.008982476,
            launch_site_altitude_asl: 296.0,
            rk2_time_step: 0.1,
        }
    }
}

impl ApogeeModelConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        ensure_positive(self.burnout_mass, "apogee_model.burnout_mass")?;
        ensure_positive(self.reference_area, "apogee_model.reference_area")?;
        ensure_positive(self.rk2_time_step, "apogee_model.rk2_time_step")?;
        ensure(
            self.launch_site_altitude_asl.is_finite(),
            "apogee_model.launch_site_altitude_asl",
        )?;
        ensure(
            self.drag_coefficients.iter().all(|cd| cd.is_finite() && *cd > 0.0),
            "apogee_model.drag_coefficients",
        )?;
        if self.drag_coefficients.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigurationError::DragTableNotIncreasing);
        }
        Ok(())
    }
}

/// Thresholds act on the smoothed, gravity removed vertical acceleration.
/// Debounce counts are consecutive cycles the predicate must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// m/s^2
    pub launch_acceleration: f32,
    /// m/s^2, coast is declared once acceleration drops below this
    pub burnout_acceleration: f32,
    /// m/s^2
    pub landed_acceleration_tolerance: f32,
    /// m/s
    pub landed_velocity_tolerance: f32,
    pub launch_debounce: u16,
    pub burnout_debounce: u16,
    pub apogee_debounce: u16,
    pub landing_debounce: u16,
    /// declare landed after this long in free fall even if the estimate never settles
    pub free_fall_timeout_s: Option<f32>,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            launch_acceleration: 20.0,
            burnout_acceleration: 0.0,
            landed_acceleration_tolerance: 1.0,
            landed_velocity_tolerance: 3.0,
            launch_debounce: 3,
            burnout_debounce: 5,
            apogee_debounce: 3,
            landing_debounce: 50,
            free_fall_timeout_s: Some(600.0),
        }
    }
}

impl TransitionConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        ensure_positive(self.launch_acceleration, "transitions.launch_acceleration")?;
        ensure(
            self.burnout_acceleration.is_finite()
                && self.burnout_acceleration < self.launch_acceleration,
            "transitions.burnout_acceleration",
        )?;
        ensure_positive(
            self.landed_acceleration_tolerance,
            "transitions.landed_acceleration_tolerance",
        )?;
        ensure_positive(
            self.landed_velocity_tolerance,
            "transitions.landed_velocity_tolerance",
        )?;
        ensure(self.launch_debounce > 0, "transitions.launch_debounce")?;
        ensure(self.burnout_debounce > 0, "transitions.burnout_debounce")?;
        ensure(self.apogee_debounce > 0, "transitions.apogee_debounce")?;
        ensure(self.landing_debounce > 0, "transitions.landing_debounce")?;
        if let Some(timeout) = self.free_fall_timeout_s {
            ensure_positive(timeout, "transitions.free_fall_timeout_s")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// extension change per metre of apogee error
    pub gain: f32,
    /// m, no correction while the prediction is this close to the target
    pub tolerance_m: f32,
    /// largest extension change between two consecutive commands
    pub max_rate_per_cycle: f32,
    pub max_extension: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            gain: 0.002,
            tolerance_m: 5.0,
            max_rate_per_cycle: 0.02,
            max_extension: 1.0,
        }
    }
}

impl ControllerConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        ensure_positive(self.gain, "controller.gain")?;
        ensure_positive(self.tolerance_m, "controller.tolerance_m")?;
        ensure_positive(self.max_rate_per_cycle, "controller.max_rate_per_cycle")?;
        ensure(
            self.max_extension > 0.0 && self.max_extension <= 1.0,
            "controller.max_extension",
        )
    }
}

fn ensure(condition: bool, name: &'static str) -> Result<(), ConfigurationError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidValue { name })
    }
}

fn ensure_positive(value: f32, name: &'static str) -> Result<(), ConfigurationError> {
    ensure(value.is_finite() && value > 0.0, name)
}
