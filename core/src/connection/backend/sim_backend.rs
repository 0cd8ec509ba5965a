/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::frame::{FrameEvent, FrameInfo, FrameLayout, FrameSink, RxDataFormat};
use crate::connection::port::{RadarProtocol, RadarSession};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

// Phase difference between neighbouring receive antennas.
const ANTENNA_PHASE_STEP: f64 = PI / 4.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedPort {
    pub name: String,
    pub responsive: bool,
}

impl SimulatedPort {
    pub fn responsive(name: &str) -> Self {
        SimulatedPort {
            name: name.to_string(),
            responsive: true,
        }
    }

    pub fn unresponsive(name: &str) -> Self {
        SimulatedPort {
            name: name.to_string(),
            responsive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedEndpoint {
    RadarBase,
    Other(String),
}

/// A point target. Frequencies are normalized: cycles per sample for the beat
/// frequency, cycles per chirp for the Doppler shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedTarget {
    pub beat_frequency: f64,
    pub doppler_frequency: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub ports: Vec<SimulatedPort>,
    pub endpoints: Vec<SimulatedEndpoint>,
    pub layout: FrameLayout,
    pub targets: Vec<SimulatedTarget>,
    pub dc_offset: f32,
    /// When false the session accepts frame requests but never calls back.
    pub deliver_frames: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            ports: vec![SimulatedPort::responsive("/dev/ttyACM0")],
            endpoints: vec![
                SimulatedEndpoint::RadarBase,
                SimulatedEndpoint::Other(String::from("ADCXMC")),
                SimulatedEndpoint::Other(String::from("BGT24MTR12")),
            ],
            layout: FrameLayout::default(),
            targets: vec![SimulatedTarget {
                beat_frequency: 12.0 / 64.0,
                doppler_frequency: 2.0 / 16.0,
                amplitude: 0.25,
            }],
            dc_offset: 0.5,
            deliver_frames: true,
        }
    }
}

impl SimulatorConfig {
    /// Rejects shapes a board could not describe in its frame metadata.
    pub fn validate(&self) -> Result<()> {
        let layout = self.layout;
        if !(1..=8).contains(&layout.rx_antennas) {
            return Err(Error::Config(format!(
                "{} rx antennas do not fit an 8 bit rx mask",
                layout.rx_antennas
            )));
        }
        if u8::try_from(self.endpoints.len()).is_err() {
            return Err(Error::Config(format!(
                "{} endpoints exceed the 8 bit endpoint id",
                self.endpoints.len()
            )));
        }
        let fits_u32 = |n: usize| u32::try_from(n).is_ok();
        let frame_len = layout
            .samples_per_chirp
            .checked_mul(layout.chirps_per_frame)
            .and_then(|n| n.checked_mul(layout.rx_antennas * 2));
        if !fits_u32(layout.samples_per_chirp)
            || !fits_u32(layout.chirps_per_frame)
            || frame_len.is_none()
        {
            return Err(Error::Config(format!("frame layout {:?} is too large", layout)));
        }
        Ok(())
    }
}

/// In-process stand-in for a Position2Go board behind the communication library.
pub struct SimulatedProtocol {
    config: SimulatorConfig,
    attempts: Vec<String>,
    next_handle: i32,
    frame_requests: Arc<AtomicUsize>,
}

impl SimulatedProtocol {
    pub fn new(config: SimulatorConfig) -> Self {
        SimulatedProtocol {
            config,
            attempts: vec![],
            next_handle: 0,
            frame_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn position2go() -> Self {
        Self::new(SimulatorConfig::default())
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Ports passed to `connect`, in call order.
    pub fn connect_attempts(&self) -> &[String] {
        &self.attempts
    }

    /// Frame requests issued on every session opened by this protocol.
    pub fn frame_requests(&self) -> usize {
        self.frame_requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RadarProtocol for SimulatedProtocol {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn list_ports(&mut self) -> Result<Vec<String>> {
        self.config.validate()?;
        Ok(self.config.ports.iter().map(|p| p.name.clone()).collect())
    }

    async fn connect(&mut self, port: &str) -> Result<Box<dyn RadarSession>> {
        self.config.validate()?;
        self.attempts.push(port.to_string());

        let responsive = self
            .config
            .ports
            .iter()
            .find(|p| p.name == port)
            .is_some_and(|p| p.responsive);
        if !responsive {
            return Err(Error::Device {
                call: "protocol_connect",
                status: -1,
            });
        }

        let handle = self.next_handle;
        self.next_handle += 1;
        info!("Simulated radar answering on {} (handle {})", port, handle);

        Ok(Box::new(SimulatedSession::new(
            handle,
            port,
            self.config.clone(),
            Arc::clone(&self.frame_requests),
        )))
    }
}

pub struct SimulatedSession {
    handle: i32,
    port: String,
    config: SimulatorConfig,
    sink: Option<FrameSink>,
    trigger_interval: Option<Duration>,
    next_trigger: Option<Instant>,
    frame_number: u32,
    frame_requests: Arc<AtomicUsize>,
    connected: bool,
}

impl SimulatedSession {
    fn new(
        handle: i32,
        port: &str,
        config: SimulatorConfig,
        frame_requests: Arc<AtomicUsize>,
    ) -> Self {
        SimulatedSession {
            handle,
            port: port.to_string(),
            config,
            sink: None,
            trigger_interval: None,
            next_trigger: None,
            frame_number: 0,
            frame_requests,
            connected: true,
        }
    }

    fn check_endpoint(&self, call: &'static str, endpoint: u8) -> Result<&SimulatedEndpoint> {
        if !self.connected {
            return Err(Error::Device { call, status: -1 });
        }
        match (endpoint as usize).checked_sub(1) {
            Some(index) if index < self.config.endpoints.len() => Ok(&self.config.endpoints[index]),
            _ => Err(Error::Device { call, status: -2 }),
        }
    }

    fn check_radar_base(&self, call: &'static str, endpoint: u8) -> Result<()> {
        match self.check_endpoint(call, endpoint)? {
            SimulatedEndpoint::RadarBase => Ok(()),
            SimulatedEndpoint::Other(_) => Err(Error::Device { call, status: -3 }),
        }
    }

    pub fn synthesize_frame(&self, frame_number: u32) -> FrameInfo {
        let layout = self.config.layout;
        let mut data = vec![self.config.dc_offset; layout.samples_per_frame()];
        let first_chirp = frame_number as f64 * layout.chirps_per_frame as f64;

        for chirp in 0..layout.chirps_per_frame {
            for sample in 0..layout.samples_per_chirp {
                for antenna in 0..layout.rx_antennas {
                    let (mut re, mut im) = (0.0f64, 0.0f64);
                    for target in &self.config.targets {
                        let cycles = target.beat_frequency * sample as f64
                            + target.doppler_frequency * (first_chirp + chirp as f64);
                        let phase = 2.0 * PI * cycles.fract() + ANTENNA_PHASE_STEP * antenna as f64;
                        re += target.amplitude * phase.cos();
                        im += target.amplitude * phase.sin();
                    }
                    let index = layout.index(chirp, sample, antenna);
                    data[index] += re as f32;
                    data[index + 1] += im as f32;
                }
            }
        }

        FrameInfo {
            sample_data: data,
            frame_number,
            num_chirps: u32::try_from(layout.chirps_per_frame).unwrap_or(u32::MAX),
            num_rx_antennas: u8::try_from(layout.rx_antennas).unwrap_or(u8::MAX),
            num_samples_per_chirp: u32::try_from(layout.samples_per_chirp).unwrap_or(u32::MAX),
            rx_mask: u8::MAX >> (8 - layout.rx_antennas.clamp(1, 8)),
            adc_resolution: 12,
            interleaved_rx: 1,
            data_format: RxDataFormat::ComplexInterleaved,
        }
    }
}

#[async_trait::async_trait]
impl RadarSession for SimulatedSession {
    fn handle(&self) -> i32 {
        self.handle
    }

    fn port_name(&self) -> &str {
        &self.port
    }

    async fn num_endpoints(&mut self) -> Result<u8> {
        if !self.connected {
            return Err(Error::Device {
                call: "protocol_get_num_endpoints",
                status: -1,
            });
        }
        Ok(u8::try_from(self.config.endpoints.len()).unwrap_or(u8::MAX))
    }

    async fn is_radar_base_endpoint(&mut self, endpoint: u8) -> Result<bool> {
        let kind = self.check_endpoint("ep_radar_base_is_compatible_endpoint", endpoint)?;
        Ok(*kind == SimulatedEndpoint::RadarBase)
    }

    fn set_frame_callback(&mut self, sink: FrameSink) {
        self.sink = Some(sink);
    }

    async fn set_automatic_frame_trigger(&mut self, endpoint: u8, interval_us: u32) -> Result<()> {
        self.check_radar_base("ep_radar_base_set_automatic_frame_trigger", endpoint)?;

        if interval_us == 0 {
            self.trigger_interval = None;
            self.next_trigger = None;
        } else {
            let interval = Duration::from_micros(interval_us as u64);
            self.trigger_interval = Some(interval);
            self.next_trigger = Some(Instant::now() + interval);
        }
        debug!(
            "Simulated trigger on endpoint {}: {:?}",
            endpoint, self.trigger_interval
        );
        Ok(())
    }

    async fn get_frame_data(&mut self, endpoint: u8, wait_for_data: bool) -> Result<()> {
        self.frame_requests.fetch_add(1, Ordering::SeqCst);
        self.check_radar_base("ep_radar_base_get_frame_data", endpoint)?;

        if let (Some(interval), Some(next)) = (self.trigger_interval, self.next_trigger) {
            if Instant::now() < next {
                if !wait_for_data {
                    return Ok(());
                }
                tokio::time::sleep_until(next).await;
            }
            self.next_trigger = Some(next + interval);
        }

        if !self.config.deliver_frames {
            return Ok(());
        }

        let frame = self.synthesize_frame(self.frame_number);
        self.frame_number = self.frame_number.wrapping_add(1);

        match &self.sink {
            Some(sink) => {
                sink.deliver(FrameEvent {
                    handle: self.handle,
                    endpoint,
                    frame,
                })
                .await
            }
            None => {
                warn!("No frame callback registered, dropping frame");
                Ok(())
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.sink = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimulatorConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_antenna_counts_beyond_the_rx_mask() {
        for rx_antennas in [0, 9, 16, 64] {
            let config = SimulatorConfig {
                layout: FrameLayout {
                    rx_antennas,
                    ..FrameLayout::default()
                },
                ..SimulatorConfig::default()
            };
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{rx_antennas}");
        }
    }

    #[test]
    fn rejects_more_endpoints_than_ids() {
        let config = SimulatorConfig {
            endpoints: vec![SimulatedEndpoint::RadarBase; 256],
            ..SimulatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_overflowing_layout() {
        let config = SimulatorConfig {
            layout: FrameLayout {
                samples_per_chirp: usize::MAX / 2,
                chirps_per_frame: 4,
                rx_antennas: 1,
            },
            ..SimulatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn invalid_config_refuses_to_connect() {
        let mut protocol = SimulatedProtocol::new(SimulatorConfig {
            layout: FrameLayout {
                rx_antennas: 16,
                ..FrameLayout::default()
            },
            ..SimulatorConfig::default()
        });

        assert!(matches!(protocol.list_ports().await, Err(Error::Config(_))));
        assert!(protocol.connect("/dev/ttyACM0").await.is_err());
        assert!(protocol.connect_attempts().is_empty());
    }

    #[test]
    fn rx_mask_covers_every_antenna() {
        let session = SimulatedSession::new(
            0,
            "sim",
            SimulatorConfig {
                layout: FrameLayout {
                    samples_per_chirp: 1,
                    chirps_per_frame: 1,
                    rx_antennas: 8,
                },
                ..SimulatorConfig::default()
            },
            Arc::new(AtomicUsize::new(0)),
        );
        let frame = session.synthesize_frame(0);
        assert_eq!(frame.rx_mask, 0xff);
        assert_eq!(frame.num_rx_antennas, 8);
        assert_eq!(frame.expected_len(), frame.sample_count());
    }
}
