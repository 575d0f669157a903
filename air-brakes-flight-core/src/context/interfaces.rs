use crate::{
    error::{ActuatorFaultError, LogError, SensorError},
    types::{ExtensionCommand, FlightRecord, RawSample},
};

/// Time ordered stream of IMU samples.
pub trait SensorSource {
    /// Blocks until the next sample is available. `Ok(None)` marks the end of
    /// a finite recording.
    fn next(&mut self) -> Result<Option<RawSample>, SensorError>;
}

pub trait ActuatorSink {
    /// Drives the air brakes towards `extension`. Repeating the current
    /// command must be harmless.
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError>;

    /// Last command the actuator accepted.
    fn current(&self) -> ExtensionCommand;
}

/// Receives one record per completed cycle, in cycle order. Must not block the caller.
pub trait FlightLogger {
    fn log(&mut self, record: &FlightRecord) -> Result<(), LogError>;

    /// Writes out everything queued so far.
    fn flush(&mut self) -> Result<(), LogError>;
}

impl<T: SensorSource + ?Sized> SensorSource for &mut T {
    fn next(&mut self) -> Result<Option<RawSample>, SensorError> {
        (**self).next()
    }
}

impl<T: ActuatorSink + ?Sized> ActuatorSink for &mut T {
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError> {
        (**self).command(extension)
    }

    fn current(&self) -> ExtensionCommand {
        (**self).current()
    }
}

impl<T: FlightLogger + ?Sized> FlightLogger for &mut T {
    fn log(&mut self, record: &FlightRecord) -> Result<(), LogError> {
        (**self).log(record)
    }

    fn flush(&mut self) -> Result<(), LogError> {
        (**self).flush()
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl FlightLogger for NoopLogger {
    fn log(&mut self, _record: &FlightRecord) -> Result<(), LogError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError> {
        Ok(())
    }
}
