/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
mod cli;
use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{CaptureArgs, Cli, Command, PortsArgs, ProcessArgs};
use env_logger::{Builder, Env};
use log::{info, warn};
use radarbase::acquisition::storage::{read_samples, write_range_doppler_csv, write_spectrum_csv};
use radarbase::connection::backend::SimulatedProtocol;
use radarbase::connection::port::RadarProtocol;
use radarbase::connection::{SerialPortType, is_radar_port, known_vendor, list_serial_ports};
use radarbase::dsp::{analyze_frame, split_frames};
use radarbase::{capture_to_file, find_radar_ports};

fn open_protocol(simulate: bool) -> Result<Box<dyn RadarProtocol>> {
    if simulate {
        info!("Using the simulated Position2Go");
        return Ok(Box::new(SimulatedProtocol::position2go()));
    }

    #[cfg(feature = "comlib")]
    {
        return Ok(Box::new(radarbase::connection::backend::ComLibProtocol::new()));
    }
    #[cfg(not(feature = "comlib"))]
    {
        bail!("built without the `comlib` feature, only --simulate is available");
    }
}

async fn capture(args: CaptureArgs) -> Result<()> {
    let config = args.acquisition_config();
    let mut protocol = open_protocol(args.simulate)?;

    let written = tokio::select! {
        result = capture_to_file(protocol.as_mut(), &config, &args.output) => {
            result.context("Acquisition failed")?
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, nothing written");
            bail!("acquisition cancelled");
        }
    };

    println!("{} samples written to {}", written, args.output.display());
    Ok(())
}

fn ports(args: PortsArgs) -> Result<()> {
    let ports = if args.radar_only {
        find_radar_ports().context("Could not list radar ports")?
    } else {
        list_serial_ports().context("Could not list serial ports")?
    };
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    for port in &ports {
        let marker = if is_radar_port(port) { "*" } else { " " };
        match &port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{} {} [{:04x}:{:04x}] {}",
                marker,
                port.port_name,
                usb.vid,
                usb.pid,
                known_vendor(usb.vid).or(usb.product.as_deref()).unwrap_or("")
            ),
            other => println!("{} {} {:?}", marker, port.port_name, other),
        }
    }
    Ok(())
}

fn process(args: ProcessArgs) -> Result<()> {
    let layout = args.layout();
    let samples = read_samples(&args.input)
        .with_context(|| format!("Could not read {}", args.input.display()))?;

    let per_frame = layout.samples_per_frame().max(1);
    let frames = samples.len() / per_frame;
    if frames == 0 {
        bail!(
            "{} holds {} samples, less than one frame of {}",
            args.input.display(),
            samples.len(),
            per_frame
        );
    }
    if samples.len() % per_frame != 0 {
        warn!("Ignoring {} trailing samples", samples.len() % per_frame);
    }

    for (index, frame) in split_frames(&samples, layout).enumerate() {
        let analysis = analyze_frame(frame, layout, args.bins, args.remove_chirp_dc)
            .with_context(|| format!("Could not analyse frame {}", index))?;

        let out = |name: &str| args.output_dir.join(format!("{}_{}.csv", name, index));
        write_spectrum_csv(&out("ft_freq"), &analysis.fast_time)?;
        write_spectrum_csv(&out("st_freq"), &analysis.slow_time)?;
        write_range_doppler_csv(&out("rdm"), &analysis.range_doppler)?;

        if let Some((range, doppler, magnitude)) = analysis.range_doppler.peak() {
            info!(
                "Frame {}: strongest cell at range {:.4}, doppler {:.4} ({:.3})",
                index,
                analysis.range_doppler.range_axis[range],
                analysis.range_doppler.doppler_axis[doppler],
                magnitude
            );
        }
    }

    println!("Processed {} frame(s) into {}", frames, args.output_dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or_else(|| Command::Capture(CaptureArgs::default())) {
        Command::Capture(args) => capture(args).await,
        Command::Ports(args) => ports(args),
        Command::Process(args) => process(args),
    }
}
