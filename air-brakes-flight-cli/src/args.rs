use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "Air Brakes Flight")]
#[command(bin_name = "air-brakes-flight")]
pub struct Cli {
    #[arg(long, help = "flight configuration toml")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "target apogee in meters above the pad, overrides the config")]
    pub target_apogee: Option<f32>,

    #[arg(long, default_value = "flight_logs")]
    pub log_dir: PathBuf,

    #[arg(long, help = "servo serial port, the servo is stubbed when omitted")]
    pub servo_port: Option<String>,

    #[arg(long, help = "print the default configuration and exit")]
    pub dump_default_config: bool,

    #[clap(subcommand)]
    pub mode: Option<ModeSelect>,
}

#[derive(Subcommand, Debug)]
pub enum ModeSelect {
    #[command(about = "replay a recorded flight table")]
    Replay(ReplayCli),

    #[command(about = "fly with the imu connected over serial")]
    Live(LiveCli),
}

#[derive(Parser, Debug)]
pub struct ReplayCli {
    pub csv: PathBuf,
    #[arg(long, default_value_t = 1.0, help = "playback speed, 0 replays unpaced")]
    pub speed: f32,
}

#[derive(Parser, Debug)]
pub struct LiveCli {
    #[arg(long)]
    pub port: String,
    #[arg(long, default_value_t = 115200)]
    pub baud: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_with_overrides() {
        let cli = Cli::try_parse_from([
            "air-brakes-flight",
            "--target-apogee",
            "1500",
            "replay",
            "flight.csv",
            "--speed",
            "0",
        ])
        .unwrap();

        assert_eq!(cli.target_apogee, Some(1500.0));
        assert_eq!(cli.log_dir, PathBuf::from("flight_logs"));
        match cli.mode {
            Some(ModeSelect::Replay(replay)) => {
                assert_eq!(replay.csv, PathBuf::from("flight.csv"));
                assert_eq!(replay.speed, 0.0);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn live_requires_a_port() {
        assert!(Cli::try_parse_from(["air-brakes-flight", "live"]).is_err());
    }
}
