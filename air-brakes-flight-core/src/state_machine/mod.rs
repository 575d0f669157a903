use micromath::F32Ext;

use crate::{
    config::TransitionConfig,
    types::{FlightPhase, ProcessedState},
};


/// Consecutive-cycle counts, one per phase that has an outgoing transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TransitionCounters([u16; 4]);

impl TransitionCounters {
    fn get(&self, from: FlightPhase) -> u16 {
        self.0.get(from.index()).copied().unwrap_or(0)
    }

    fn increment(&mut self, from: FlightPhase) -> u16 {
        match self.0.get_mut(from.index()) {
            Some(count) => {
                *count = count.saturating_add(1);
                *count
            }
            None => 0,
        }
    }

    fn reset(&mut self, from: FlightPhase) {
        if let Some(count) = self.0.get_mut(from.index()) {
            *count = 0;
        }
    }
}

/// Debounced, strictly forward flight phase classification.
///
/// Only the transition out of the current phase is ever evaluated, so at most
/// one transition can fire per cycle and a phase can never be re-entered.
#[derive(Debug, Clone)]
pub struct FlightStateMachine {
    config: TransitionConfig,
    phase: FlightPhase,
    counters: TransitionCounters,
    entered_at: [Option<u64>; FlightPhase::ALL.len()],
}

impl FlightStateMachine {
    pub fn new(config: &TransitionConfig) -> Self {
        Self {
            config: config.clone(),
            phase: FlightPhase::StandBy,
            counters: TransitionCounters::default(),
            entered_at: [None; FlightPhase::ALL.len()],
        }
    }

    pub fn advance(&mut self, state: &ProcessedState) -> FlightPhase {
        let Some(next) = self.phase.next() else {
            return self.phase;
        };
        if self.entered_at[self.phase.index()].is_none() {
            self.entered_at[self.phase.index()] = Some(state.timestamp_us);
        }

        if self.free_fall_timed_out(state.timestamp_us) {
            log_warn!(
                "no landing detected {} s after apogee, assuming landed",
                self.config.free_fall_timeout_s.unwrap_or(0.0)
            );
            self.enter(next, state.timestamp_us);
            return self.phase;
        }

        if !state.is_finite() || !self.predicate(state) {
            self.counters.reset(self.phase);
            return self.phase;
        }

        let count = self.counters.increment(self.phase);
        log_trace!("{} exit predicate held for {} cycles", self.phase.name(), count);
        if count >= self.debounce(self.phase) {
            self.enter(next, state.timestamp_us);
        }
        self.phase
    }

    fn enter(&mut self, phase: FlightPhase, timestamp_us: u64) {
        log_info!(
            "{} -> {} at t = {} us",
            self.phase.name(),
            phase.name(),
            timestamp_us
        );
        self.counters.reset(self.phase);
        self.phase = phase;
        self.entered_at[phase.index()] = Some(timestamp_us);
    }

    /// Exit condition of the current phase, evaluated on finite states only.
    fn predicate(&self, state: &ProcessedState) -> bool {
        let config = &self.config;
        match self.phase {
            FlightPhase::StandBy => state.vertical_acceleration > config.launch_acceleration,
            FlightPhase::MotorBurn => state.vertical_acceleration < config.burnout_acceleration,
            FlightPhase::Coast => state.vertical_velocity <= 0.0,
            FlightPhase::FreeFall => {
                state.vertical_acceleration.abs() <= config.landed_acceleration_tolerance
                    && state.vertical_velocity.abs() <= config.landed_velocity_tolerance
            }
            FlightPhase::Landed => false,
        }
    }

    fn debounce(&self, from: FlightPhase) -> u16 {
        match from {
            FlightPhase::StandBy => self.config.launch_debounce,
            FlightPhase::MotorBurn => self.config.burnout_debounce,
            FlightPhase::Coast => self.config.apogee_debounce,
            FlightPhase::FreeFall => self.config.landing_debounce,
            FlightPhase::Landed => u16::MAX,
        }
        .max(1)
    }

    fn free_fall_timed_out(&self, timestamp_us: u64) -> bool {
        let (Some(timeout_s), Some(entered_us)) = (
            self.config.free_fall_timeout_s,
            self.entered_at[FlightPhase::FreeFall.index()],
        ) else {
            return false;
        };
        self.phase == FlightPhase::FreeFall
            && timestamp_us.saturating_sub(entered_us) as f32 / 1_000_000.0 >= timeout_s
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// Consecutive cycles the exit predicate of `from` has held.
    pub fn counter(&self, from: FlightPhase) -> u16 {
        self.counters.get(from)
    }

    /// Timestamp of the sample on which `phase` was entered.
    pub fn entered_at(&self, phase: FlightPhase) -> Option<u64> {
        self.entered_at[phase.index()]
    }
}
