/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::collector::{CollectState, FrameCollector};
use crate::acquisition::frame::{FrameEvent, FrameSink};
use crate::acquisition::storage;
use crate::connection::port::RadarProtocol;
use crate::connection::{Connection, auto_connect};
use crate::error::{Error, Result};
use log::{debug, error, info, warn};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Init,
    Connected,
    EndpointResolved,
    TriggerArmed,
    Collecting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Automatic { interval_us: u32 },
    Manual,
}

impl TriggerMode {
    pub fn interval_us(&self) -> u32 {
        match self {
            TriggerMode::Automatic { interval_us } => *interval_us,
            TriggerMode::Manual => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub frames: usize,
    pub samples_per_frame: usize,
    pub trigger: TriggerMode,
    /// How long to wait for a callback after each frame request.
    pub frame_timeout: Duration,
    /// Upper bound for the whole collection loop; `None` waits forever.
    pub timeout: Option<Duration>,
    pub channel_capacity: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            frames: 1,
            samples_per_frame: 4096,
            trigger: TriggerMode::Automatic {
                interval_us: 1_000_000,
            },
            frame_timeout: Duration::from_secs(2),
            timeout: None,
            channel_capacity: 16,
        }
    }
}

pub struct RadarDevice {
    connection: Connection,
    endpoint: Option<u8>,
    frames: Option<mpsc::Receiver<FrameEvent>>,
    state: AcquisitionState,
}

impl RadarDevice {
    pub async fn connect(protocol: &mut dyn RadarProtocol) -> Result<Self> {
        let connection = auto_connect(protocol).await?;
        Ok(RadarDevice {
            connection,
            endpoint: None,
            frames: None,
            state: AcquisitionState::Connected,
        })
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn endpoint(&self) -> Option<u8> {
        self.endpoint
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn expect_state(&self, expected: AcquisitionState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        error!("Acquisition failed in state {:?}: {}", self.state, err);
        self.state = AcquisitionState::Failed;
        Err(err)
    }

    pub async fn resolve_endpoint(&mut self) -> Result<u8> {
        self.expect_state(AcquisitionState::Connected)?;

        match self.connection.find_radar_base_endpoint().await {
            Ok(Some(endpoint)) => {
                info!("Using radar base endpoint {}", endpoint);
                self.endpoint = Some(endpoint);
                self.state = AcquisitionState::EndpointResolved;
                Ok(endpoint)
            }
            Ok(None) => {
                let handle = self.connection.handle();
                self.fail(Error::NoRadarEndpoint { handle })
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn arm(&mut self, config: &AcquisitionConfig) -> Result<()> {
        self.expect_state(AcquisitionState::EndpointResolved)?;
        let Some(endpoint) = self.endpoint else {
            return self.fail(Error::InvalidState {
                expected: AcquisitionState::EndpointResolved,
                actual: self.state,
            });
        };

        let (sink, frames) = FrameSink::channel(config.channel_capacity);
        self.connection.register_frame_sink(sink);
        self.frames = Some(frames);

        match config.trigger {
            TriggerMode::Automatic { interval_us } => {
                info!("Automatic frame trigger every {} us", interval_us)
            }
            TriggerMode::Manual => info!("Manual frame trigger"),
        }
        if let Err(e) = self
            .connection
            .set_frame_trigger(endpoint, config.trigger.interval_us())
            .await
        {
            return self.fail(e);
        }

        self.state = AcquisitionState::TriggerArmed;
        Ok(())
    }

    pub async fn collect(&mut self, config: &AcquisitionConfig) -> Result<Vec<f32>> {
        self.expect_state(AcquisitionState::TriggerArmed)?;
        let mut collector = match FrameCollector::new(config.frames, config.samples_per_frame) {
            Ok(collector) => collector,
            Err(e) => return self.fail(e),
        };

        self.state = AcquisitionState::Collecting;
        let result = match config.timeout {
            Some(limit) => match timeout(limit, self.collect_loop(&mut collector, config)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(limit)),
            },
            None => self.collect_loop(&mut collector, config).await,
        };

        match result {
            Ok(()) => {
                self.state = AcquisitionState::Done;
                info!(
                    "Collected {} frame(s), {} samples",
                    collector.frame_index(),
                    collector.capacity()
                );
                Ok(collector.into_samples())
            }
            Err(e) => self.fail(e),
        }
    }

    async fn collect_loop(
        &mut self,
        collector: &mut FrameCollector,
        config: &AcquisitionConfig,
    ) -> Result<()> {
        let (Some(endpoint), Some(frames)) = (self.endpoint, self.frames.as_mut()) else {
            return Err(Error::InvalidState {
                expected: AcquisitionState::TriggerArmed,
                actual: self.state,
            });
        };
        let handle = self.connection.handle();

        while !collector.is_done() {
            if let Err(e) = self.connection.request_frame(endpoint).await {
                warn!("Frame request on endpoint {} failed: {}", endpoint, e);
            }

            let event = match timeout(config.frame_timeout, frames.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(Error::ChannelClosed),
                Err(_) => {
                    debug!("No frame within {:?}, requesting again", config.frame_timeout);
                    continue;
                }
            };

            let mut pending = Some(event);
            while let Some(event) = pending.take() {
                if event.handle != handle || event.endpoint != endpoint {
                    debug!(
                        "Ignoring frame from handle {} endpoint {}",
                        event.handle, event.endpoint
                    );
                } else if collector.on_frame(&event.frame)? == CollectState::Done {
                    break;
                }
                pending = frames.try_recv().ok();
            }
        }
        Ok(())
    }

    pub async fn disconnect(mut self) -> Result<()> {
        self.frames = None;
        self.connection.disconnect().await
    }

    async fn run(&mut self, config: &AcquisitionConfig) -> Result<Vec<f32>> {
        self.resolve_endpoint().await?;
        self.arm(config).await?;
        self.collect(config).await
    }
}

/// Connects, resolves the radar base endpoint, arms the trigger and collects
/// `config.frames` frames. The session is closed on every path.
pub async fn acquire(
    protocol: &mut dyn RadarProtocol,
    config: &AcquisitionConfig,
) -> Result<Vec<f32>> {
    let mut device = RadarDevice::connect(protocol).await?;
    let result = device.run(config).await;

    if let Err(e) = device.disconnect().await {
        warn!("Failed to close session: {}", e);
    }
    result
}

/// Runs `acquire` and dumps the samples to `path`. Returns the number of samples written.
pub async fn capture_to_file(
    protocol: &mut dyn RadarProtocol,
    config: &AcquisitionConfig,
    path: &Path,
) -> Result<usize> {
    let samples = acquire(protocol, config).await?;
    storage::write_samples(path, &samples)?;
    info!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(samples.len())
}
