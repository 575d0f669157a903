// only use std when feature = "std" is enabled or during testing
#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod fmt;

mod config;
mod context;
mod controller;
pub mod data_processor;
mod error;
mod state_machine;
mod types;
mod utils;

pub use config::{
    ACCELERATION_HISTORY_LEN, ApogeeModelConfig, ApogeeModelKind, ControllerConfig, FlightConfig,
    MAX_SMOOTHING_WINDOW, ProcessorConfig, TransitionConfig,
};
pub use context::{
    ActuatorSink, CycleOutcome, FlightContext, FlightLogger, FlightSummary, NoopLogger,
    SensorSource, StopReason,
};
pub use controller::ExtensionController;
pub use data_processor::{ApogeeEstimator, ApogeePredictor, DataProcessor};
pub use error::{
    ActuatorFaultError, CalibrationIncompleteWarning, ConfigurationError, FlightError, LogError,
    SampleOrderingError, SensorError, SensorTimeoutError,
};
pub use state_machine::FlightStateMachine;
pub use types::{ExtensionCommand, FlightPhase, FlightRecord, ProcessedState, RawSample};
pub use utils::{STANDARD_GRAVITY, approximate_air_density, lerp};

#[cfg(test)]
mod tests;
