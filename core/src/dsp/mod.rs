/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
pub mod datacube;
pub mod spectrum;
use crate::acquisition::frame::FrameLayout;
use crate::error::Result;
pub use datacube::{Datacube, split_frames};
pub use spectrum::{RangeDopplerMap, Spectrum, fftfreq, fftshift, range_doppler_map, remove_dc, spectrum};

#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub fast_time: Spectrum,
    pub slow_time: Spectrum,
    pub range_doppler: RangeDopplerMap,
}

/// Fast-time spectrum of the first chirp, slow-time spectrum of the first
/// sample and the range-Doppler map, all on the first antenna. The 1-D
/// signals always have their mean removed; the map only with `remove_chirp_dc`.
pub fn analyze_frame(
    samples: &[f32],
    layout: FrameLayout,
    bins: usize,
    remove_chirp_dc: bool,
) -> Result<FrameAnalysis> {
    let cube = Datacube::from_frame(samples, layout)?;

    let mut fast = cube.fast_time(0, 0);
    remove_dc(&mut fast);
    let mut slow = cube.slow_time(0, 0);
    remove_dc(&mut slow);

    Ok(FrameAnalysis {
        fast_time: spectrum(&fast, bins)?,
        slow_time: spectrum(&slow, bins)?,
        range_doppler: range_doppler_map(&cube, 0, bins, remove_chirp_dc)?,
    })
}
