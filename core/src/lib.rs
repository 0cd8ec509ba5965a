/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
pub mod acquisition;
pub mod connection;
pub mod dsp;
pub mod error;

pub use acquisition::device::{
    AcquisitionConfig, AcquisitionState, RadarDevice, TriggerMode, acquire, capture_to_file,
};
pub use connection::{auto_connect, find_radar_ports};
pub use error::{Error, Result};
