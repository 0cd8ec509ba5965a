/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
pub mod backend;
pub mod port;
use crate::acquisition::frame::FrameSink;
use crate::connection::port::{RadarProtocol, RadarSession};
use crate::error::{Error, Result};
use log::{debug, error, info, warn};
pub use serialport::{SerialPortInfo, SerialPortType};

pub const KNOWN_VENDORS: &[(u16, &str)] = &[
    (0x058b, "Infineon Technologies"), // XMC based radar baseboards
];

pub struct Connection {
    session: Box<dyn RadarSession>,
}

impl Connection {
    pub fn new(session: Box<dyn RadarSession>) -> Self {
        Connection { session }
    }

    pub fn handle(&self) -> i32 {
        self.session.handle()
    }

    pub fn port_name(&self) -> &str {
        self.session.port_name()
    }

    /// Walks every endpoint of the session; when several report radar base
    /// compatibility the last one is used.
    pub async fn find_radar_base_endpoint(&mut self) -> Result<Option<u8>> {
        let count = self.session.num_endpoints().await?;
        debug!("Session {} reports {} endpoint(s)", self.handle(), count);

        let mut found = None;
        for endpoint in 1..=count {
            if self.session.is_radar_base_endpoint(endpoint).await? {
                debug!("Endpoint {} is radar base compatible", endpoint);
                found = Some(endpoint);
            }
        }
        Ok(found)
    }

    pub fn register_frame_sink(&mut self, sink: FrameSink) {
        self.session.set_frame_callback(sink);
    }

    pub async fn set_frame_trigger(&mut self, endpoint: u8, interval_us: u32) -> Result<()> {
        debug!(
            "Setting frame trigger on endpoint {} to {} us",
            endpoint, interval_us
        );
        self.session
            .set_automatic_frame_trigger(endpoint, interval_us)
            .await
    }

    pub async fn request_frame(&mut self, endpoint: u8) -> Result<()> {
        self.session.get_frame_data(endpoint, true).await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        info!("Closing session {} on {}", self.handle(), self.port_name());
        self.session.disconnect().await
    }
}

/// Tries every port the protocol reports, in order, and keeps the first session that opens.
pub async fn auto_connect(protocol: &mut dyn RadarProtocol) -> Result<Connection> {
    let ports = protocol.list_ports().await?;
    if ports.is_empty() {
        error!("{}: no communication ports found", protocol.name());
        return Err(Error::NoPorts);
    }
    debug!("Candidate ports: {:?}", ports);

    for port in &ports {
        match protocol.connect(port).await {
            Ok(session) => {
                info!(
                    "Connected to {} (handle {}) via {}",
                    port,
                    session.handle(),
                    protocol.name()
                );
                return Ok(Connection::new(session));
            }
            Err(e) => warn!("Could not connect to {}: {}", port, e),
        }
    }

    error!("Connection failed on all {} port(s)", ports.len());
    Err(Error::ConnectFailed { tried: ports.len() })
}

/// Vendor name of a known radar board vendor id.
pub fn known_vendor(vid: u16) -> Option<&'static str> {
    KNOWN_VENDORS
        .iter()
        .find(|(known, _)| *known == vid)
        .map(|(_, name)| *name)
}

pub fn is_radar_port(port: &SerialPortInfo) -> bool {
    match &port.port_type {
        SerialPortType::UsbPort(usb_info) => known_vendor(usb_info.vid).is_some(),
        _ => false,
    }
}

pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>> {
    serialport::available_ports().map_err(|e| Error::Io(e.into()))
}

/// System serial ports that belong to a known radar board.
pub fn find_radar_ports() -> Result<Vec<SerialPortInfo>> {
    let ports: Vec<SerialPortInfo> = list_serial_ports()?
        .into_iter()
        .filter(is_radar_port)
        .collect();
    debug!("Found {} radar port(s)", ports.len());
    Ok(ports)
}
