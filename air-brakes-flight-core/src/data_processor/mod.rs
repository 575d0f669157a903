use heapless::Deque;
use nalgebra::Vector3;

use crate::{
    config::{ACCELERATION_HISTORY_LEN, FlightConfig, MAX_SMOOTHING_WINDOW},
    error::{CalibrationIncompleteWarning, SampleOrderingError},
    types::{ExtensionCommand, ProcessedState, RawSample},
};

mod apogee;
mod calibration;
pub mod frame;

pub use apogee::{ApogeeEstimator, ApogeePredictor, BallisticPredictor, DragModel, Rk2Predictor};
pub use calibration::{Calibration, Welford};

/// One trapezoid of the vertical integration, kept so the start of the burn
/// can be integrated again once launch is confirmed.
#[derive(Debug, Clone, Copy)]
struct IntegrationStep {
    /// vertical specific force at the start and end of the step, m/s^2
    from: f32,
    to: f32,
    /// s
    dt: f32,
}

impl IntegrationStep {
    /// Trapezoidal update of velocity and displacement.
    fn integrate(&self, velocity: &mut f32, displacement: &mut f32, offset: f32) {
        let acceleration = 0.5 * ((self.from - offset) + (self.to - offset));
        let next_velocity = *velocity + acceleration * self.dt;
        *displacement += 0.5 * (*velocity + next_velocity) * self.dt;
        *velocity = next_velocity;
    }
}

#[derive(Debug, Clone, Copy)]
struct PreviousSample {
    timestamp_us: u64,
    vertical_specific_force: f32,
}

/// Turns raw body-frame IMU samples into vertical kinematics and an apogee prediction.
///
/// On the pad every at-rest sample feeds the calibration. Integration runs
/// from the first sample, but `begin_flight` discards everything accumulated
/// on the ground and re-integrates only the samples that belong to the burn.
pub struct DataProcessor<P: ApogeePredictor = ApogeeEstimator> {
    predictor: P,
    calibration: Calibration,

    smoothing_window: usize,
    smoothing: Deque<f32, MAX_SMOOTHING_WINDOW>,
    history: Deque<IntegrationStep, ACCELERATION_HISTORY_LEN>,

    previous: Option<PreviousSample>,
    vertical_velocity: f32,
    vertical_displacement: f32,
    max_vertical_velocity: f32,
    max_displacement: f32,

    in_flight: bool,
    last_extension: ExtensionCommand,
    last_state: Option<ProcessedState>,
}

impl DataProcessor<ApogeeEstimator> {
    pub fn new(config: &FlightConfig) -> Self {
        Self::with_predictor(config, ApogeeEstimator::from_config(&config.apogee_model))
    }
}

impl<P: ApogeePredictor> DataProcessor<P> {
    pub fn with_predictor(config: &FlightConfig, predictor: P) -> Self {
        Self {
            predictor,
            calibration: Calibration::new(
                config.processor.calibration_samples,
                config.processor.calibration_rest_tolerance,
            ),
            smoothing_window: config.processor.smoothing_window.clamp(1, MAX_SMOOTHING_WINDOW),
            smoothing: Deque::new(),
            history: Deque::new(),
            previous: None,
            vertical_velocity: 0.0,
            vertical_displacement: 0.0,
            max_vertical_velocity: 0.0,
            max_displacement: 0.0,
            in_flight: false,
            last_extension: ExtensionCommand::RETRACTED,
            last_state: None,
        }
    }

    /// Consumes one sample. `extension` is the command currently held by the
    /// actuator, used for the apogee prediction.
    ///
    /// A rejected sample leaves every accumulator untouched.
    pub fn process(
        &mut self,
        raw: &RawSample,
        extension: ExtensionCommand,
    ) -> Result<ProcessedState, SampleOrderingError> {
        if !raw.is_finite() {
            return Err(SampleOrderingError::NonFinite {
                timestamp_us: raw.timestamp_us,
            });
        }
        if let Some(previous) = &self.previous {
            if raw.timestamp_us <= previous.timestamp_us {
                return Err(SampleOrderingError::NonMonotonicTimestamp {
                    previous_us: previous.timestamp_us,
                    current_us: raw.timestamp_us,
                });
            }
        }

        let vertical_specific_force = frame::vertical_component(&raw.orientation, &raw.acceleration);
        if !self.in_flight {
            self.calibration.observe(
                vertical_specific_force,
                raw.acceleration.norm(),
                &raw.angular_velocity,
            );
        }
        let offset = self.calibration.vertical_offset();

        if let Some(previous) = self.previous {
            let step = IntegrationStep {
                from: previous.vertical_specific_force,
                to: vertical_specific_force,
                dt: (raw.timestamp_us - previous.timestamp_us) as f32 / 1_000_000.0,
            };
            step.integrate(
                &mut self.vertical_velocity,
                &mut self.vertical_displacement,
                offset,
            );
            self.update_maxima();
            if self.history.is_full() {
                self.history.pop_front();
            }
            let _ = self.history.push_back(step);
        }
        self.previous = Some(PreviousSample {
            timestamp_us: raw.timestamp_us,
            vertical_specific_force,
        });

        let corrected = vertical_specific_force - offset;
        while self.smoothing.len() >= self.smoothing_window {
            self.smoothing.pop_front();
        }
        let _ = self.smoothing.push_back(corrected);
        let vertical_acceleration =
            self.smoothing.iter().sum::<f32>() / self.smoothing.len() as f32;

        let angular_speed = (raw.angular_velocity - self.calibration.gyro_bias()).norm();

        self.last_extension = extension;
        let state = ProcessedState {
            timestamp_us: raw.timestamp_us,
            vertical_velocity: self.vertical_velocity,
            vertical_displacement: self.vertical_displacement,
            vertical_acceleration,
            predicted_apogee: self.predict(),
            angular_speed,
        };
        self.last_state = Some(state);
        Ok(state)
    }

    /// Launch confirmed: freeze the calibration, drop the ground drift and
    /// re-integrate the last `lookback` steps, which cover the part of the
    /// burn that elapsed while launch was being debounced.
    ///
    /// Calling it again once in flight does nothing.
    pub fn begin_flight(&mut self, lookback: usize) -> Option<CalibrationIncompleteWarning> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;

        let warning = self.calibration.freeze();
        if let Some(warning) = &warning {
            log_warn!(
                "calibration incomplete at launch: {} of {} samples, using partial average",
                warning.collected,
                warning.required
            );
        }

        log_info!(
            "integration reset, discarding {} m/s and {} m of ground drift",
            self.vertical_velocity,
            self.vertical_displacement
        );

        let offset = self.calibration.vertical_offset();
        let lookback = lookback.min(self.history.len());
        let skip = self.history.len() - lookback;
        let (mut velocity, mut displacement) = (0.0, 0.0);
        for step in self.history.iter().skip(skip) {
            step.integrate(&mut velocity, &mut displacement, offset);
        }
        self.vertical_velocity = velocity;
        self.vertical_displacement = displacement;
        self.update_maxima();

        if let Some(mut state) = self.last_state {
            state.vertical_velocity = self.vertical_velocity;
            state.vertical_displacement = self.vertical_displacement;
            state.predicted_apogee = self.predict();
            self.last_state = Some(state);
        }

        warning
    }

    fn update_maxima(&mut self) {
        if self.in_flight {
            self.max_vertical_velocity = self.max_vertical_velocity.max(self.vertical_velocity);
            self.max_displacement = self.max_displacement.max(self.vertical_displacement);
        }
    }

    fn predict(&self) -> f32 {
        self.predictor.predict(
            self.vertical_velocity,
            self.vertical_displacement,
            self.last_extension,
        )
    }

    pub fn last_state(&self) -> Option<&ProcessedState> {
        self.last_state.as_ref()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn gyro_bias(&self) -> Vector3<f32> {
        self.calibration.gyro_bias()
    }

    pub fn max_vertical_velocity(&self) -> f32 {
        self.max_vertical_velocity
    }

    pub fn max_displacement(&self) -> f32 {
        self.max_displacement
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}
