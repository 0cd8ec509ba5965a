/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use clap::{Args, Parser, Subcommand};
use radarbase::acquisition::frame::FrameLayout;
use radarbase::{AcquisitionConfig, TriggerMode};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RAW_DATA: &str = "P2G_raw-data_C/raw-data.txt";
pub const DEFAULT_PROCESSED_DIR: &str = "P2G_processed-data";

#[derive(Debug, Parser)]
#[command(version, about = "Capture raw frames from a Position2Go radar and analyse them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the first radar found, collect frames and dump the samples (default)
    Capture(CaptureArgs),
    /// List serial ports, marking known radar boards
    Ports(PortsArgs),
    /// Compute spectra and range-Doppler maps from a sample dump
    Process(ProcessArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CaptureArgs {
    #[arg(long, default_value_t = 1)]
    pub frames: usize,
    #[arg(long, default_value_t = 4096)]
    pub samples_per_frame: usize,
    #[arg(long, default_value_t = 1_000_000)]
    pub trigger_interval_us: u32,
    /// Trigger frames on request instead of periodically
    #[arg(long)]
    pub manual_trigger: bool,
    #[arg(long, default_value = DEFAULT_RAW_DATA)]
    pub output: PathBuf,
    #[arg(long, default_value_t = 2000)]
    pub frame_timeout_ms: u64,
    /// Give up if the frames are not collected in time
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Use the built-in device simulator instead of the communication library
    #[arg(long)]
    pub simulate: bool,
}

impl Default for CaptureArgs {
    fn default() -> Self {
        let config = AcquisitionConfig::default();
        CaptureArgs {
            frames: config.frames,
            samples_per_frame: config.samples_per_frame,
            trigger_interval_us: config.trigger.interval_us(),
            manual_trigger: false,
            output: PathBuf::from(DEFAULT_RAW_DATA),
            frame_timeout_ms: config.frame_timeout.as_millis() as u64,
            timeout_secs: None,
            simulate: false,
        }
    }
}

impl CaptureArgs {
    pub fn acquisition_config(&self) -> AcquisitionConfig {
        let trigger = if self.manual_trigger || self.trigger_interval_us == 0 {
            TriggerMode::Manual
        } else {
            TriggerMode::Automatic {
                interval_us: self.trigger_interval_us,
            }
        };

        AcquisitionConfig {
            frames: self.frames,
            samples_per_frame: self.samples_per_frame,
            trigger,
            frame_timeout: Duration::from_millis(self.frame_timeout_ms),
            timeout: self.timeout_secs.map(Duration::from_secs),
            ..AcquisitionConfig::default()
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct PortsArgs {
    /// Only show ports of known radar boards
    #[arg(long)]
    pub radar_only: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ProcessArgs {
    #[arg(long, default_value = DEFAULT_RAW_DATA)]
    pub input: PathBuf,
    #[arg(long, default_value = DEFAULT_PROCESSED_DIR)]
    pub output_dir: PathBuf,
    #[arg(long, default_value_t = 64)]
    pub samples_per_chirp: usize,
    #[arg(long, default_value_t = 16)]
    pub chirps: usize,
    #[arg(long, default_value_t = 2)]
    pub rx_antennas: usize,
    /// FFT size on both axes
    #[arg(long, default_value_t = 256)]
    pub bins: usize,
    /// Subtract each chirp's mean before the range-Doppler FFT
    #[arg(long)]
    pub remove_chirp_dc: bool,
}

impl ProcessArgs {
    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            samples_per_chirp: self.samples_per_chirp,
            chirps_per_frame: self.chirps,
            rx_antennas: self.rx_antennas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_means_default_capture() {
        let cli = Cli::try_parse_from(["extract-raw-data"]).unwrap();
        assert!(cli.command.is_none());

        let config = CaptureArgs::default().acquisition_config();
        assert_eq!(config.frames, 1);
        assert_eq!(config.samples_per_frame, 4096);
        assert_eq!(
            config.trigger,
            TriggerMode::Automatic {
                interval_us: 1_000_000
            }
        );
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn capture_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "extract-raw-data",
            "capture",
            "--frames",
            "4",
            "--manual-trigger",
            "--timeout-secs",
            "10",
            "--simulate",
        ])
        .unwrap();

        let Some(Command::Capture(args)) = cli.command else {
            panic!("expected capture command");
        };
        assert!(args.simulate);
        assert_eq!(args.output, PathBuf::from(DEFAULT_RAW_DATA));

        let config = args.acquisition_config();
        assert_eq!(config.frames, 4);
        assert_eq!(config.trigger, TriggerMode::Manual);
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn zero_interval_selects_manual_trigger() {
        let args = CaptureArgs {
            trigger_interval_us: 0,
            ..CaptureArgs::default()
        };
        assert_eq!(args.acquisition_config().trigger, TriggerMode::Manual);
    }

    #[test]
    fn ports_can_be_filtered_to_radar_boards() {
        let cli = Cli::try_parse_from(["extract-raw-data", "ports", "--radar-only"]).unwrap();
        let Some(Command::Ports(args)) = cli.command else {
            panic!("expected ports command");
        };
        assert!(args.radar_only);
    }

    #[test]
    fn process_defaults_describe_position2go_frames() {
        let cli = Cli::try_parse_from(["extract-raw-data", "process"]).unwrap();
        let Some(Command::Process(args)) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(args.layout(), FrameLayout::default());
        assert_eq!(args.bins, 256);
        assert!(!args.remove_chirp_dc);
        assert_eq!(args.output_dir, PathBuf::from(DEFAULT_PROCESSED_DIR));
    }
}
