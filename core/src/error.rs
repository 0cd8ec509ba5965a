/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::device::AcquisitionState;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),
    #[error("No communication ports available")]
    NoPorts,
    #[error("Could not connect to any of {tried} port(s)")]
    ConnectFailed { tried: usize },
    #[error("Session {handle} exposes no radar base endpoint")]
    NoRadarEndpoint { handle: i32 },
    #[error("{call} failed with status {status}")]
    Device { call: &'static str, status: i32 },
    #[error("Frame carries {got} samples, expected {expected}")]
    FrameSizeMismatch { expected: usize, got: usize },
    #[error("Frame delivery channel closed")]
    ChannelClosed,
    #[error("Acquisition timed out after {0:?}")]
    Timeout(Duration),
    #[error("Operation requires state {expected:?}, device is {actual:?}")]
    InvalidState {
        expected: AcquisitionState,
        actual: AcquisitionState,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid sample in {} at line {line}: {token:?}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        token: String,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
