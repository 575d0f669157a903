use anyhow::{Result, bail};
use clap::Parser;
use log::{LevelFilter, info, warn};
use serialport::SerialPort;

use air_brakes_flight_core::{
    ActuatorFaultError, ActuatorSink, ExtensionCommand, FlightContext, RawSample, SensorError,
    SensorSource, StopReason,
};

use args::{Cli, ModeSelect};
use config::CliConfig;
use flight_log::CsvFlightLogger;
use replay::ReplaySource;
use serial_imu::SerialImuSource;
use servo::{SerialServo, StubServo};

mod args;
mod config;
mod flight_log;
mod replay;
mod sample_record;
mod serial_imu;
mod servo;

enum Source {
    Replay(ReplaySource),
    Live(SerialImuSource<Box<dyn SerialPort>>),
}

impl SensorSource for Source {
    fn next(&mut self) -> Result<Option<RawSample>, SensorError> {
        match self {
            Source::Replay(source) => source.next(),
            Source::Live(source) => source.next(),
        }
    }
}

enum Servo {
    Serial(SerialServo<Box<dyn SerialPort>>),
    Stub(StubServo),
}

impl ActuatorSink for Servo {
    fn command(&mut self, extension: ExtensionCommand) -> Result<(), ActuatorFaultError> {
        match self {
            Servo::Serial(servo) => servo.command(extension),
            Servo::Stub(servo) => servo.command(extension),
        }
    }

    fn current(&self) -> ExtensionCommand {
        match self {
            Servo::Serial(servo) => servo.current(),
            Servo::Stub(servo) => servo.current(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .filter_module("air_brakes_flight_core", LevelFilter::Info)
        .filter_module("air_brakes_flight", LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Cli::parse();

    if args.dump_default_config {
        print!("{}", CliConfig::default().to_toml()?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if let Some(target) = args.target_apogee {
        config.flight.target_apogee_m = Some(target);
    }

    let source = match args.mode {
        Some(ModeSelect::Replay(replay)) => {
            Source::Replay(ReplaySource::open(&replay.csv, replay.speed)?)
        }
        Some(ModeSelect::Live(live)) => Source::Live(SerialImuSource::open(
            &live.port,
            live.baud,
            config.sensor_timeout_ms,
        )?),
        None => bail!("no mode selected, use `replay` or `live`"),
    };

    let servo = match &args.servo_port {
        Some(port) => Servo::Serial(SerialServo::open(port, &config.servo)?),
        None => {
            warn!("no servo port given, air brakes commands go to a stub");
            Servo::Stub(StubServo::default())
        }
    };

    let logger = CsvFlightLogger::create(&args.log_dir, config.log_queue_capacity)?;
    let mut context = FlightContext::new(&config.flight, source, servo, logger)?;
    let summary = context.run()?;

    match summary.stop_reason {
        StopReason::Landed => info!("flight complete"),
        StopReason::EndOfStream => info!("sensor stream ended in {}", summary.final_phase.name()),
    }
    info!(
        "{} cycles, {} dropped samples, {} unlogged records",
        summary.cycles, summary.dropped_samples, summary.log_failures
    );
    info!(
        "max displacement {:.1} m, max vertical velocity {:.1} m/s",
        summary.max_displacement, summary.max_vertical_velocity
    );
    if let Servo::Stub(stub) = context.actuator() {
        info!("stub servo received {} commands", stub.commands().len());
    }
    info!("flight data in {}", context.logger().path().display());

    Ok(())
}
