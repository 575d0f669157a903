use std::{cell::Cell, collections::VecDeque, rc::Rc};

#[cfg(feature = "log")]
use log::LevelFilter;

use crate::{
    context::{ActuatorSink, FlightLogger, SensorSource},
    error::{ActuatorFaultError, LogError, SensorError},
    types::{ExtensionCommand, FlightRecord, RawSample},
};


pub fn init_logger() {
    #[cfg(feature = "log")]
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .filter(Some("air_brakes_flight_core"), LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Small deterministic generator for test noise.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// uniform in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn next_range(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }
}

/// Replays a fixed list of samples, then either ends or fails.
pub struct VecSource {
    samples: VecDeque<RawSample>,
    then: Option<SensorError>,
    garbled_read: Option<usize>,
    reads: usize,
}

impl VecSource {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            then: None,
            garbled_read: None,
            reads: 0,
        }
    }

    /// The given read (1 based) returns `Malformed` instead of a sample.
    pub fn garbled_at(mut self, read: usize) -> Self {
        self.garbled_read = Some(read);
        self
    }

    pub fn failing_with(mut self, error: SensorError) -> Self {
        self.then = Some(error);
        self
    }
}

impl SensorSource for VecSource {
    fn next(&mut self) -> Result<Option<RawSample>, SensorError> {
        self.reads += 1;
        if self.garbled_read == Some(self.reads) {
            return Err(SensorError::Malformed);
        }
        match self.samples.pop_front() {
            Some(sample) => Ok(Some(sample)),
            None => match self.then {
                Some(error) => Err(error),
                None => Ok(None),
            },
        }
    }
}

/// Accepts every command unless told to reject the next few.
#[derive(Default)]
pub struct RecordingActuator {
    /// every command that reached the actuator, accepted or not
    pub attempts: Vec<ExtensionCommand>,
    pub accepted: Vec<ExtensionCommand>,
    pub reject_next: u32,
    current: ExtensionCommand,
}

impl ActuatorSink for RecordingActuator {
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError> {
        self.attempts.push(extension);
        if self.reject_next > 0 {
            self.reject_next -= 1;
            return Err(ActuatorFaultError {
                commanded: extension.value(),
            });
        }
        self.accepted.push(extension);
        self.current = extension;
        Ok(())
    }

    fn current(&self) -> ExtensionCommand {
        self.current
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    pub records: Vec<FlightRecord>,
    pub flushes: u32,
    pub fail: bool,
}

impl FlightLogger for RecordingLogger {
    fn log(&mut self, record: &FlightRecord) -> Result<(), LogError> {
        if self.fail {
            return Err(LogError::QueueFull);
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Sensor half of the closed loop: the simulator sees the extension the
/// actuator half was last commanded to.
pub struct SimSource {
    pub sim: flight_sim::FlightSim,
    extension: Rc<Cell<f32>>,
}

impl SensorSource for SimSource {
    fn next(&mut self) -> Result<Option<RawSample>, SensorError> {
        Ok(self.sim.step(self.extension.get()))
    }
}

#[derive(Default)]
pub struct SimActuator {
    pub commands: Vec<ExtensionCommand>,
    extension: Rc<Cell<f32>>,
}

impl ActuatorSink for SimActuator {
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError> {
        self.commands.push(extension);
        self.extension.set(extension.value());
        Ok(())
    }

    fn current(&self) -> ExtensionCommand {
        ExtensionCommand::new(self.extension.get())
    }
}

pub fn closed_loop(sim: flight_sim::FlightSim) -> (SimSource, SimActuator) {
    let extension = Rc::new(Cell::new(0.0));
    (
        SimSource {
            sim,
            extension: extension.clone(),
        },
        SimActuator {
            commands: Vec::new(),
            extension,
        },
    )
}
