use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "watchdog",
    version,
    about = "Camera watchdog - motion detection, alarm and streaming, controlled over a command queue"
)]
pub struct Args {
    /// Path to the config file
    #[arg(short = 'c', long = "config", value_name = "PATH", default_value_os = "config.ron")]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count
    )]
    pub verbosity_level: u8,

    /// Print the effective configuration and exit
    #[arg(long = "dump-config")]
    pub dump_config: bool,

    /// Frames between synthetic camera motion bursts, 0 keeps the test pattern still
    #[arg(long = "synthetic-motion-period", value_name = "FRAMES", default_value_t = 50)]
    pub synthetic_motion_period: u32,
}

impl Args {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity_level {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
