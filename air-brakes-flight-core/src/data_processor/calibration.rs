use micromath::F32Ext;
use nalgebra::{SVector, Vector1, Vector3};

use crate::{error::CalibrationIncompleteWarning, utils::STANDARD_GRAVITY};

/// Online estimator for mean and variance of N-component f32 samples.
#[derive(Debug, Clone)]
pub struct Welford<const N: usize> {
    count: u32,
    mean: SVector<f32, N>,
    m2: SVector<f32, N>,
}

impl<const N: usize> Welford<N> {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: SVector::zeros(),
            m2: SVector::zeros(),
        }
    }

    pub fn update(&mut self, x: &SVector<f32, N>) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f32;
        self.m2 += delta.component_mul(&(x - self.mean));
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> Option<SVector<f32, N>> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn variance(&self) -> Option<SVector<f32, N>> {
        (self.count > 0).then(|| self.m2 / self.count as f32)
    }
}

impl<const N: usize> Default for Welford<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// At-rest bias estimate collected on the pad.
///
/// The vertical offset absorbs gravity together with the accelerometer bias,
/// so subtracting it leaves the net vertical acceleration of the vehicle.
#[derive(Debug, Clone)]
pub struct Calibration {
    required: u32,
    rest_tolerance: f32,
    vertical: Welford<1>,
    gyro: Welford<3>,
    frozen: bool,
}

impl Calibration {
    pub fn new(required: u32, rest_tolerance: f32) -> Self {
        Self {
            required: required.max(1),
            rest_tolerance,
            vertical: Welford::new(),
            gyro: Welford::new(),
            frozen: false,
        }
    }

    /// Feeds one pad sample. Returns whether it was accepted into the average.
    /// Samples whose accelerometer magnitude is not close to 1 g are ignored.
    pub fn observe(
        &mut self,
        vertical_specific_force: f32,
        acceleration_magnitude: f32,
        angular_velocity: &Vector3<f32>,
    ) -> bool {
        if self.frozen || self.is_complete() {
            return false;
        }
        if (acceleration_magnitude - STANDARD_GRAVITY).abs() > self.rest_tolerance {
            log_trace!(
                "calibration sample rejected, |acc| = {}",
                acceleration_magnitude
            );
            return false;
        }

        self.vertical.update(&Vector1::new(vertical_specific_force));
        self.gyro.update(angular_velocity);

        if self.is_complete() {
            log_info!(
                "calibration complete: vertical offset {} m/s^2, noise std {} m/s^2",
                self.vertical_offset(),
                self.vertical_noise_std().unwrap_or(0.0)
            );
        }
        true
    }

    /// Stops collecting. Reports a warning when fewer samples than required were seen.
    pub fn freeze(&mut self) -> Option<CalibrationIncompleteWarning> {
        self.frozen = true;
        if self.is_complete() {
            None
        } else {
            Some(CalibrationIncompleteWarning {
                collected: self.collected(),
                required: self.required,
            })
        }
    }

    pub fn is_complete(&self) -> bool {
        self.vertical.count() >= self.required
    }

    pub fn collected(&self) -> u32 {
        self.vertical.count()
    }

    /// Mean at-rest vertical specific force. Falls back to standard gravity
    /// when no at-rest sample was ever seen.
    pub fn vertical_offset(&self) -> f32 {
        self.vertical
            .mean()
            .map(|mean| mean[0])
            .unwrap_or(STANDARD_GRAVITY)
    }

    pub fn gyro_bias(&self) -> Vector3<f32> {
        self.gyro.mean().unwrap_or_else(Vector3::zeros)
    }

    pub fn vertical_noise_std(&self) -> Option<f32> {
        self.vertical.variance().map(|v| libm::sqrtf(v[0]))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;

    #[test]
    fn welford_mean_and_variance() {
        let mut welford = Welford::<3>::new();
        assert_eq!(welford.mean(), None);
        assert_eq!(welford.variance(), None);

        welford.update(&Vector3::new(1.0, 2.0, 3.0));
        welford.update(&Vector3::new(3.0, 4.0, 5.0));
        welford.update(&Vector3::new(5.0, 6.0, 7.0));
        welford.update(&Vector3::new(-2.0, -4.0, -6.0));

        // (1+3+5-2)/4, (2+4+6-4)/4, (3+5+7-6)/4
        assert_relative_eq!(
            welford.mean().unwrap(),
            Vector3::new(1.75, 2.0, 2.25),
            epsilon = 1e-6
        );
        // population variance of [1, 3, 5, -2]
        assert_relative_eq!(welford.variance().unwrap()[0], 6.6875, epsilon = 1e-5);
        assert_eq!(welford.count(), 4);
    }

    #[test]
    fn averages_at_rest_samples_until_complete() {
        let mut calibration = Calibration::new(3, 0.5);
        let gyro = Vector3::new(0.01, -0.02, 0.0);

        assert!(calibration.observe(9.9, 9.9, &gyro));
        assert!(calibration.observe(9.7, 9.7, &gyro));
        assert!(!calibration.is_complete());
        assert!(calibration.observe(9.8, 9.8, &gyro));
        assert!(calibration.is_complete());

        // further samples do not move the estimate
        assert!(!calibration.observe(12.0, 9.8, &gyro));
        assert_relative_eq!(calibration.vertical_offset(), 9.8, epsilon = 1e-5);
        assert_relative_eq!(calibration.gyro_bias(), gyro, epsilon = 1e-6);
        assert_eq!(calibration.freeze(), None);
    }

    #[test]
    fn rejects_samples_in_motion() {
        let mut calibration = Calibration::new(10, 0.5);
        assert!(!calibration.observe(30.0, 30.0, &Vector3::zeros()));
        assert_eq!(calibration.collected(), 0);
        assert_relative_eq!(calibration.vertical_offset(), STANDARD_GRAVITY);
    }

    #[test]
    fn freezing_early_keeps_partial_average() {
        let mut calibration = Calibration::new(100, 0.5);
        calibration.observe(9.6, 9.6, &Vector3::zeros());
        calibration.observe(9.8, 9.8, &Vector3::zeros());

        let warning = calibration.freeze();
        assert_eq!(
            warning,
            Some(CalibrationIncompleteWarning {
                collected: 2,
                required: 100
            })
        );
        assert_relative_eq!(calibration.vertical_offset(), 9.7, epsilon = 1e-5);
        assert!(!calibration.observe(9.7, 9.7, &Vector3::zeros()));
    }
}
