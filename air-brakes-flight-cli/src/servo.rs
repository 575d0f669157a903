use std::{io::Write, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use serialport::SerialPort;

use air_brakes_flight_core::{ActuatorFaultError, ActuatorSink, ExtensionCommand};

use crate::config::ServoConfig;

/// Air brakes servo driven over a serial link with one `P<position>\n` line
/// per command.
pub struct SerialServo<W: Write> {
    port: W,
    min_position: i32,
    max_position: i32,
    last_position: Option<i32>,
    current: ExtensionCommand,
}

impl SerialServo<Box<dyn SerialPort>> {
    pub fn open(port_name: &str, config: &ServoConfig) -> Result<Self> {
        let port = serialport::new(port_name, config.baud_rate)
            .timeout(Duration::from_millis(50))
            .open()
            .with_context(|| format!("failed to open servo port {port_name}"))?;
        info!("servo connected on {}", port_name);
        Ok(Self::from_writer(port, config))
    }
}

impl<W: Write> SerialServo<W> {
    pub fn from_writer(port: W, config: &ServoConfig) -> Self {
        Self {
            port,
            min_position: config.min_position,
            max_position: config.max_position,
            last_position: None,
            current: ExtensionCommand::RETRACTED,
        }
    }

    pub fn position_for(&self, extension: ExtensionCommand) -> i32 {
        let span = (self.max_position - self.min_position) as f32;
        self.min_position + (span * extension.value()).round() as i32
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.port
    }
}

impl<W: Write> ActuatorSink for SerialServo<W> {
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError> {
        let position = self.position_for(extension);
        if self.last_position == Some(position) {
            self.current = extension;
            return Ok(());
        }

        let result = writeln!(self.port, "P{position}").and_then(|_| self.port.flush());
        if let Err(e) = result {
            warn!("servo write failed: {}", e);
            // the servo may have seen part of the line, resend next time
            self.last_position = None;
            return Err(ActuatorFaultError {
                commanded: extension.value(),
            });
        }

        self.last_position = Some(position);
        self.current = extension;
        Ok(())
    }

    fn current(&self) -> ExtensionCommand {
        self.current
    }
}

/// Stand-in actuator for bench runs without a servo attached.
#[derive(Debug, Default)]
pub struct StubServo {
    commands: Vec<ExtensionCommand>,
}

impl StubServo {
    pub fn commands(&self) -> &[ExtensionCommand] {
        &self.commands
    }
}

impl ActuatorSink for StubServo {
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError> {
        self.commands.push(extension);
        Ok(())
    }

    fn current(&self) -> ExtensionCommand {
        self.commands
            .last()
            .copied()
            .unwrap_or(ExtensionCommand::RETRACTED)
    }
}
