/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::frame::FrameSink;
use crate::error::Result;

/// Separator used by the communication library between port names.
pub const PORT_LIST_DELIMITER: char = ';';

/// Entry point of a radar communication library: port discovery and session setup.
#[async_trait::async_trait]
pub trait RadarProtocol: Send {
    fn name(&self) -> &str;
    async fn list_ports(&mut self) -> Result<Vec<String>>;
    async fn connect(&mut self, port: &str) -> Result<Box<dyn RadarSession>>;
}

/// An open device session. Endpoints are numbered from 1.
#[async_trait::async_trait]
pub trait RadarSession: Send {
    fn handle(&self) -> i32;
    fn port_name(&self) -> &str;

    async fn num_endpoints(&mut self) -> Result<u8>;
    async fn is_radar_base_endpoint(&mut self, endpoint: u8) -> Result<bool>;

    /// Frames acquired after this call are delivered to `sink`.
    fn set_frame_callback(&mut self, sink: FrameSink);
    /// An interval of 0 selects manual triggering.
    async fn set_automatic_frame_trigger(&mut self, endpoint: u8, interval_us: u32) -> Result<()>;
    async fn get_frame_data(&mut self, endpoint: u8, wait_for_data: bool) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;
}

pub fn parse_port_list(raw: &str) -> Vec<String> {
    raw.split(PORT_LIST_DELIMITER)
        .map(|p| p.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
