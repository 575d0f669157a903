use micromath::F32Ext;

use crate::{
    config::ControllerConfig,
    types::{ExtensionCommand, ProcessedState},
};

/// Proportional air brakes controller acting on the predicted apogee error.
///
/// Unarmed it always asks for full retraction. Arming happens on entry to
/// coast, disarming on apogee.
#[derive(Debug, Clone)]
pub struct ExtensionController {
    config: ControllerConfig,
    armed: bool,
}

impl ExtensionController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            config: config.clone(),
            armed: false,
        }
    }

    pub fn arm(&mut self) {
        if !self.armed {
            log_info!("extension controller armed");
        }
        self.armed = true;
    }

    /// Stops the controller. The returned command is to be applied as is,
    /// without rate limiting.
    pub fn disarm(&mut self) -> ExtensionCommand {
        if self.armed {
            log_info!("extension controller disarmed, retracting");
        }
        self.armed = false;
        ExtensionCommand::RETRACTED
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// returns the next extension command
    ///
    /// `current_extension` is the last command sent to the actuator. The
    /// result never differs from it by more than `max_rate_per_cycle`, except
    /// when retracting because the controller is unarmed or has no target.
    pub fn compute(
        &self,
        state: &ProcessedState,
        target_apogee: Option<f32>,
        current_extension: ExtensionCommand,
    ) -> ExtensionCommand {
        let Some(target_apogee) = target_apogee.filter(|t| t.is_finite()) else {
            return ExtensionCommand::RETRACTED;
        };
        if !self.armed {
            return ExtensionCommand::RETRACTED;
        }

        let current = current_extension.value().min(self.config.max_extension);
        if !state.predicted_apogee.is_finite() {
            log_warn!("non-finite apogee prediction, holding extension");
            return ExtensionCommand::new(current);
        }

        // positive: overshooting the target, more drag needed
        let error = state.predicted_apogee - target_apogee;
        if error.abs() <= self.config.tolerance_m {
            return ExtensionCommand::new(current);
        }

        let rate = self.config.max_rate_per_cycle;
        let delta = (self.config.gain * error).clamp(-rate, rate);
        let next = (current + delta).clamp(0.0, self.config.max_extension);
        log_trace!(
            "apogee error {} m, extension {} -> {}",
            error,
            current,
            next
        );
        ExtensionCommand::new(next)
    }
}
