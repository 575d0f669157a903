use micromath::F32Ext;

use crate::{
    config::{ApogeeModelConfig, ApogeeModelKind},
    types::ExtensionCommand,
    utils::{STANDARD_GRAVITY, approximate_air_density, lerp},
};

/// Predicts the peak displacement above the pad reached from the current
/// vertical state if the given extension is held until apogee.
pub trait ApogeePredictor {
    fn predict(
        &self,
        vertical_velocity: f32,
        vertical_displacement: f32,
        extension: ExtensionCommand,
    ) -> f32;
}

#[derive(Debug, Clone)]
pub struct DragModel {
    burnout_mass: f32,
    drag_coefficients: [f32; 5],
    reference_area: f32,
    launch_site_altitude_asl: f32,
}

impl DragModel {
    pub fn from_config(config: &ApogeeModelConfig) -> Self {
        Self {
            burnout_mass: config.burnout_mass,
            drag_coefficients: config.drag_coefficients,
            reference_area: config.reference_area,
            launch_site_altitude_asl: config.launch_site_altitude_asl,
        }
    }

    pub fn drag_coefficient(&self, extension: ExtensionCommand) -> f32 {
        lerp(extension.value(), &self.drag_coefficients)
    }

    /// k in a_drag = -k * v^2, 1/m
    pub fn drag_factor(&self, extension: ExtensionCommand, vertical_displacement: f32) -> f32 {
        let air_density =
            approximate_air_density(self.launch_site_altitude_asl + vertical_displacement);
        0.5 * air_density * self.drag_coefficient(extension) * self.reference_area
            / self.burnout_mass
    }
}

/// Closed form apogee of a vertical ballistic coast with quadratic drag,
/// evaluated with the air density at the current altitude.
#[derive(Debug, Clone)]
pub struct BallisticPredictor {
    model: DragModel,
}

impl BallisticPredictor {
    pub fn new(model: DragModel) -> Self {
        Self { model }
    }
}

impl ApogeePredictor for BallisticPredictor {
    fn predict(
        &self,
        vertical_velocity: f32,
        vertical_displacement: f32,
        extension: ExtensionCommand,
    ) -> f32 {
        if !vertical_velocity.is_finite() || vertical_velocity <= 0.0 {
            return vertical_displacement;
        }

        let k = self.model.drag_factor(extension, vertical_displacement);
        let v_squared = vertical_velocity * vertical_velocity;
        if k <= f32::EPSILON {
            return vertical_displacement + v_squared / (2.0 * STANDARD_GRAVITY);
        }

        vertical_displacement + libm::log1pf(k * v_squared / STANDARD_GRAVITY) / (2.0 * k)
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    displacement: f32,
    velocity: f32,
}

struct Derivative<T>(T);

/// Upper bound on integration steps, a coast from any realistic speed ends well before this.
const MAX_STEPS: usize = 20_000;

/// Numerically integrates the coast with midpoint rk2, tracking the change
/// of air density with altitude.
#[derive(Debug, Clone)]
pub struct Rk2Predictor {
    model: DragModel,
    dt: f32,
}

impl Rk2Predictor {
    pub fn new(model: DragModel, dt: f32) -> Self {
        Self { model, dt }
    }

    fn derivatives(&self, extension: ExtensionCommand, state: &State) -> Derivative<State> {
        let k = self.model.drag_factor(extension, state.displacement);
        let drag = k * state.velocity * state.velocity.abs();

        Derivative(State {
            displacement: state.velocity,
            velocity: -STANDARD_GRAVITY - drag,
        })
    }
}

impl ApogeePredictor for Rk2Predictor {
    fn predict(
        &self,
        vertical_velocity: f32,
        vertical_displacement: f32,
        extension: ExtensionCommand,
    ) -> f32 {
        if !vertical_velocity.is_finite() || vertical_velocity <= 0.0 {
            return vertical_displacement;
        }

        let dt = self.dt;
        let mut state = State {
            displacement: vertical_displacement,
            velocity: vertical_velocity,
        };

        for _ in 0..MAX_STEPS {
            let Derivative(k1) = self.derivatives(extension, &state);
            let mid_state = State {
                displacement: state.displacement + k1.displacement * (0.5 * dt),
                velocity: state.velocity + k1.velocity * (0.5 * dt),
            };
            let Derivative(k2) = self.derivatives(extension, &mid_state);
            let next_state = State {
                displacement: state.displacement + k2.displacement * dt,
                velocity: state.velocity + k2.velocity * dt,
            };

            let v0 = state.velocity;
            let v1 = next_state.velocity;
            if v1 <= 0.0 {
                // velocity is taken as linear over the step to place the zero crossing
                let denom = v1 - v0;
                if denom.abs() < f32::EPSILON {
                    return next_state.displacement.max(state.displacement);
                }
                let t_zero = dt * (-v0) / denom;
                return state.displacement + v0 * t_zero + 0.5 * (denom / dt) * t_zero * t_zero;
            }

            state = next_state;
        }

        log_warn!("apogee integration did not converge, v = {}", vertical_velocity);
        state.displacement
    }
}

/// The predictor selected by configuration.
#[derive(Debug, Clone)]
pub enum ApogeeEstimator {
    Ballistic(BallisticPredictor),
    Rk2(Rk2Predictor),
}

impl ApogeeEstimator {
    pub fn from_config(config: &ApogeeModelConfig) -> Self {
        let model = DragModel::from_config(config);
        match config.kind {
            ApogeeModelKind::Ballistic => Self::Ballistic(BallisticPredictor::new(model)),
            ApogeeModelKind::Rk2 => Self::Rk2(Rk2Predictor::new(model, config.rk2_time_step)),
        }
    }
}

impl ApogeePredictor for ApogeeEstimator {
    fn predict(
        &self,
        vertical_velocity: f32,
        vertical_displacement: f32,
        extension: ExtensionCommand,
    ) -> f32 {
        match self {
            Self::Ballistic(p) => p.predict(vertical_velocity, vertical_displacement, extension),
            Self::Rk2(p) => p.predict(vertical_velocity, vertical_displacement, extension),
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use crate::tests::init_logger;

    use super::*;

    fn model() -> DragModel {
        DragModel::from_config(&ApogeeModelConfig::default())
    }

    #[test]
    fn drag_coefficient_follows_table() {
        let model = model();
        assert_relative_eq!(model.drag_coefficient(ExtensionCommand::RETRACTED), 0.47044);
        assert_relative_eq!(
            model.drag_coefficient(ExtensionCommand::new(0.5)),
            0.57784,
            epsilon = 1e-5
        );
        assert_relative_eq!(model.drag_coefficient(ExtensionCommand::new(1.0)), 0.74313);
    }

    #[test]
    fn no_climb_means_apogee_is_current_displacement() {
        let ballistic = BallisticPredictor::new(model());
        let rk2 = Rk2Predictor::new(model(), 0.1);
        for predictor in [&ballistic as &dyn ApogeePredictor, &rk2] {
            assert_eq!(predictor.predict(0.0, 812.0, ExtensionCommand::RETRACTED), 812.0);
            assert_eq!(predictor.predict(-15.0, 812.0, ExtensionCommand::RETRACTED), 812.0);
            assert_eq!(
                predictor.predict(f32::NAN, 812.0, ExtensionCommand::RETRACTED),
                812.0
            );
        }
    }

    #[test]
    fn ballistic_matches_vacuum_limit_for_slow_climb() {
        // drag is negligible at 5 m/s, so v^2 / 2g
        let apogee = BallisticPredictor::new(model()).predict(5.0, 100.0, ExtensionCommand::RETRACTED);
        assert_relative_eq!(apogee, 100.0 + 25.0 / (2.0 * STANDARD_GRAVITY), epsilon = 0.01);
    }

    #[test]
    fn extension_lowers_predicted_apogee() {
        let estimator = ApogeeEstimator::from_config(&ApogeeModelConfig::default());
        let retracted = estimator.predict(200.0, 400.0, ExtensionCommand::RETRACTED);
        let half = estimator.predict(200.0, 400.0, ExtensionCommand::new(0.5));
        let full = estimator.predict(200.0, 400.0, ExtensionCommand::new(1.0));
        assert!(retracted > half);
        assert!(half > full);
        assert!(full > 400.0);
    }

    #[test]
    fn rk2_agrees_with_ballistic() {
        init_logger();

        let ballistic = BallisticPredictor::new(model());
        let rk2 = Rk2Predictor::new(model(), 0.1);
        for v in [40.0, 120.0, 220.0] {
            let a = ballistic.predict(v, 300.0, ExtensionCommand::new(0.3));
            let b = rk2.predict(v, 300.0, ExtensionCommand::new(0.3));
            log_info!("v = {}: ballistic {} rk2 {}", v, a, b);
            assert_relative_eq!(a, b, max_relative = 0.03);
        }
    }

    #[test]
    fn bench_rk2_predict_100x() {
        use core::hint::black_box;

        init_logger();

        let rk2 = Rk2Predictor::new(model(), 0.1);
        let start = std::time::Instant::now();
        let mut sum = 0.0f32;
        for _ in 0..100 {
            sum += rk2.predict(
                black_box(250.0),
                black_box(500.0),
                black_box(ExtensionCommand::new(0.5)),
            );
        }
        let elapsed = start.elapsed();

        log_info!(
            "bench rk2 predict: {:?} each, result: {}",
            elapsed / 100,
            sum / 100.0
        );
    }
}
