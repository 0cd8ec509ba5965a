/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
pub mod blocking;
pub mod sim_backend;
pub use sim_backend::{SimulatedProtocol, SimulatedSession};
#[cfg(feature = "comlib")]
pub mod comlib_backend;
#[cfg(feature = "comlib")]
pub use comlib_backend::{ComLibProtocol, ComLibSession};
