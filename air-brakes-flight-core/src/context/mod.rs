use crate::{
    config::FlightConfig,
    controller::ExtensionController,
    data_processor::DataProcessor,
    error::{ConfigurationError, FlightError, SampleOrderingError, SensorError},
    state_machine::FlightStateMachine,
    types::{ExtensionCommand, FlightPhase, FlightRecord, ProcessedState},
};

mod interfaces;

pub use interfaces::{ActuatorSink, FlightLogger, NoopLogger, SensorSource};

/// What a single call to [`FlightContext::update`] did.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Full cycle completed, the phase after it.
    Continue(FlightPhase),
    /// The sample was rejected; nothing else happened this cycle.
    Dropped(SampleOrderingError),
    /// The source could not decode its next sample. Counted as dropped.
    Skipped(SensorError),
    Landed,
    EndOfStream,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Landed,
    EndOfStream,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSummary {
    pub cycles: u32,
    pub dropped_samples: u32,
    pub log_failures: u32,
    pub final_phase: FlightPhase,
    /// m above the launch pad
    pub max_displacement: f32,
    /// m/s
    pub max_vertical_velocity: f32,
    pub stop_reason: StopReason,
}

/// Owns the pipeline and its collaborators and runs it one sample at a time:
/// sensor -> processor -> state machine -> controller -> actuator -> logger.
///
/// The current phase and extension command live here and nowhere else.
pub struct FlightContext<S, A, L = NoopLogger> {
    source: S,
    actuator: A,
    logger: L,

    processor: DataProcessor,
    state_machine: FlightStateMachine,
    controller: ExtensionController,

    target_apogee: Option<f32>,
    launch_lookback: usize,
    retry_interval: u32,

    phase: FlightPhase,
    extension: ExtensionCommand,
    last_processed: Option<ProcessedState>,

    actuator_responsive: bool,
    cycles_since_fault: u32,
    halted: bool,
    fault: Option<SensorError>,

    cycles: u32,
    dropped_samples: u32,
    log_failures: u32,
}

impl<S, A, L> FlightContext<S, A, L>
where
    S: SensorSource,
    A: ActuatorSink,
    L: FlightLogger,
{
    /// Refuses to build a context from a configuration that does not validate.
    pub fn new(
        config: &FlightConfig,
        source: S,
        actuator: A,
        logger: L,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        Ok(Self {
            source,
            actuator,
            logger,
            processor: DataProcessor::new(config),
            state_machine: FlightStateMachine::new(&config.transitions),
            controller: ExtensionController::new(&config.controller),
            target_apogee: config.target_apogee_m,
            launch_lookback: config.transitions.launch_debounce as usize
                + config.processor.smoothing_window,
            retry_interval: config.actuator_retry_interval,
            phase: FlightPhase::StandBy,
            extension: ExtensionCommand::RETRACTED,
            last_processed: None,
            actuator_responsive: true,
            cycles_since_fault: 0,
            halted: false,
            fault: None,
            cycles: 0,
            dropped_samples: 0,
            log_failures: 0,
        })
    }

    /// Runs one cycle on the next sample.
    ///
    /// A timeout or disconnect retracts the air brakes and halts the context;
    /// the same error is returned on every later call. A malformed sample is
    /// dropped and the previous state kept.
    pub fn update(&mut self) -> Result<CycleOutcome, SensorError> {
        if self.phase == FlightPhase::Landed {
            return Ok(CycleOutcome::Landed);
        }
        if let Some(fault) = self.fault {
            return Err(fault);
        }

        let raw = match self.source.next() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(CycleOutcome::EndOfStream),
            Err(SensorError::Malformed) => {
                self.dropped_samples = self.dropped_samples.saturating_add(1);
                log_warn!(
                    "malformed sample in {}, {} dropped so far",
                    self.phase.name(),
                    self.dropped_samples
                );
                return Ok(CycleOutcome::Skipped(SensorError::Malformed));
            }
            Err(e) => {
                log_error!("sensor fault in {}, retracting air brakes", self.phase.name());
                self.fault = Some(e);
                self.enter_safe_state();
                return Err(e);
            }
        };

        let mut processed = match self.processor.process(&raw, self.extension) {
            Ok(processed) => processed,
            Err(e) => {
                self.dropped_samples = self.dropped_samples.saturating_add(1);
                log_warn!(
                    "dropped sample at {} us, {} dropped so far",
                    raw.timestamp_us,
                    self.dropped_samples
                );
                return Ok(CycleOutcome::Dropped(e));
            }
        };
        self.cycles = self.cycles.saturating_add(1);

        let previous_phase = self.phase;
        self.phase = self.state_machine.advance(&processed);

        let command = if self.phase != previous_phase {
            self.on_phase_entry(&mut processed)
        } else if self.phase == FlightPhase::Coast {
            Some(
                self.controller
                    .compute(&processed, self.target_apogee, self.held_extension()),
            )
        } else {
            None
        };
        if let Some(command) = command {
            self.actuate(command);
        }

        let record = FlightRecord {
            timestamp_us: raw.timestamp_us,
            raw,
            processed,
            phase: self.phase,
            extension: self.extension,
        };
        if let Err(e) = self.logger.log(&record) {
            self.log_failures = self.log_failures.saturating_add(1);
            if self.log_failures == 1 || self.log_failures % 100 == 0 {
                log_warn!("flight record not logged: {}, {} lost so far", e, self.log_failures);
            }
        }
        self.last_processed = Some(processed);

        Ok(match self.phase {
            FlightPhase::Landed => CycleOutcome::Landed,
            phase => CycleOutcome::Continue(phase),
        })
    }

    /// Side effects of entering the current phase. Returns the command for this cycle.
    fn on_phase_entry(&mut self, processed: &mut ProcessedState) -> Option<ExtensionCommand> {
        match self.phase {
            FlightPhase::StandBy => None,
            FlightPhase::MotorBurn => {
                self.processor.begin_flight(self.launch_lookback);
                if let Some(state) = self.processor.last_state() {
                    *processed = *state;
                }
                Some(ExtensionCommand::RETRACTED)
            }
            FlightPhase::Coast => {
                self.controller.arm();
                Some(
                    self.controller
                        .compute(processed, self.target_apogee, self.held_extension()),
                )
            }
            FlightPhase::FreeFall => {
                let retract = self.controller.disarm();
                self.force(retract);
                None
            }
            FlightPhase::Landed => {
                log_info!(
                    "landed, max displacement {} m, max vertical velocity {} m/s",
                    self.processor.max_displacement(),
                    self.processor.max_vertical_velocity()
                );
                self.enter_safe_state();
                None
            }
        }
    }

    /// Extension the next command is rate limited against. Commands an
    /// unresponsive actuator never took do not count.
    fn held_extension(&self) -> ExtensionCommand {
        if self.actuator_responsive {
            self.extension
        } else {
            self.actuator.current()
        }
    }

    /// Sends a command through the fault policy: an unresponsive actuator is
    /// only retried every `retry_interval` cycles.
    fn actuate(&mut self, command: ExtensionCommand) {
        self.extension = command;
        if self.halted {
            return;
        }

        if !self.actuator_responsive {
            self.cycles_since_fault = self.cycles_since_fault.saturating_add(1);
            if self.cycles_since_fault < self.retry_interval {
                return;
            }
            self.cycles_since_fault = 0;
        }

        match self.actuator.command(command) {
            Ok(()) => {
                if !self.actuator_responsive {
                    log_info!("actuator responding again");
                }
                self.actuator_responsive = true;
            }
            Err(e) => {
                if self.actuator_responsive {
                    log_warn!("{}, treating actuator as unresponsive", e);
                }
                self.actuator_responsive = false;
                self.cycles_since_fault = 0;
            }
        }
    }

    /// Commands that must reach the actuator whatever its fault state.
    fn force(&mut self, command: ExtensionCommand) {
        self.extension = command;
        if self.halted {
            return;
        }
        match self.actuator.command(command) {
            Ok(()) => self.actuator_responsive = true,
            Err(e) => {
                log_error!("{} while forcing extension", e);
                self.actuator_responsive = false;
                self.cycles_since_fault = 0;
            }
        }
    }

    /// Retract and stop actuating for good.
    fn enter_safe_state(&mut self) {
        self.controller.disarm();
        self.force(ExtensionCommand::RETRACTED);
        self.halted = true;
    }

    /// Cycles until landing, the end of the recording or a sensor timeout or
    /// disconnect.
    /// Every exit path leaves the air brakes retracted and the log flushed.
    pub fn run(&mut self) -> Result<FlightSummary, FlightError> {
        let stop_reason = loop {
            match self.update() {
                Ok(CycleOutcome::Continue(_))
                | Ok(CycleOutcome::Dropped(_))
                | Ok(CycleOutcome::Skipped(_)) => {}
                Ok(CycleOutcome::Landed) => break StopReason::Landed,
                Ok(CycleOutcome::EndOfStream) => break StopReason::EndOfStream,
                Err(e) => {
                    self.shutdown();
                    return Err(e.into());
                }
            }
        };

        self.shutdown();
        log_info!(
            "flight loop stopped after {} cycles in {}",
            self.cycles,
            self.phase.name()
        );
        Ok(self.summary(stop_reason))
    }

    /// Retracts the air brakes and drains the logger.
    pub fn shutdown(&mut self) {
        self.enter_safe_state();
        if let Err(e) = self.logger.flush() {
            log_warn!("flight log flush failed: {}", e);
        }
    }

    fn summary(&self, stop_reason: StopReason) -> FlightSummary {
        FlightSummary {
            cycles: self.cycles,
            dropped_samples: self.dropped_samples,
            log_failures: self.log_failures,
            final_phase: self.phase,
            max_displacement: self.processor.max_displacement(),
            max_vertical_velocity: self.processor.max_vertical_velocity(),
            stop_reason,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn extension(&self) -> ExtensionCommand {
        self.extension
    }

    pub fn target_apogee(&self) -> Option<f32> {
        self.target_apogee
    }

    /// Last accepted processed state, unchanged by dropped samples.
    pub fn last_processed(&self) -> Option<&ProcessedState> {
        self.last_processed.as_ref()
    }

    pub fn is_actuator_responsive(&self) -> bool {
        self.actuator_responsive
    }

    pub fn processor(&self) -> &DataProcessor {
        &self.processor
    }

    pub fn state_machine(&self) -> &FlightStateMachine {
        &self.state_machine
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }
}
