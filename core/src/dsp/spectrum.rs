/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::dsp::datacube::Datacube;
use crate::error::{Error, Result};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

// Keeps log10 finite on empty bins.
const MAGNITUDE_FLOOR: f32 = 1e-10;

#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Normalized frequency, zero frequency centered.
    pub frequency: Vec<f32>,
    pub magnitude_db: Vec<f32>,
    pub phase: Vec<f32>,
}

impl Spectrum {
    /// Index of the strongest bin.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitude_db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone)]
pub struct RangeDopplerMap {
    /// Non-negative half of the normalized beat frequency axis.
    pub range_axis: Vec<f32>,
    pub doppler_axis: Vec<f32>,
    /// Row-major, one row per range bin.
    pub magnitude: Vec<f32>,
}

impl RangeDopplerMap {
    pub fn row(&self, range: usize) -> &[f32] {
        let width = self.doppler_axis.len();
        &self.magnitude[range * width..(range + 1) * width]
    }

    pub fn get(&self, range: usize, doppler: usize) -> f32 {
        self.magnitude[range * self.doppler_axis.len() + doppler]
    }

    /// (range bin, doppler bin, magnitude) of the strongest cell.
    pub fn peak(&self) -> Option<(usize, usize, f32)> {
        let width = self.doppler_axis.len();
        self.magnitude
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &m)| (i / width, i % width, m))
    }
}

pub fn remove_dc(signal: &mut [Complex<f32>]) {
    if signal.is_empty() {
        return;
    }
    let mean = signal.iter().sum::<Complex<f32>>() / signal.len() as f32;
    signal.iter_mut().for_each(|s| *s -= mean);
}

/// Sample frequencies of a `n` point FFT, in cycles per sample.
pub fn fftfreq(n: usize) -> Vec<f32> {
    (0..n)
        .map(|k| {
            let k = if k < n.div_ceil(2) { k as f32 } else { k as f32 - n as f32 };
            k / n as f32
        })
        .collect()
}

/// Moves the zero frequency bin to the center.
pub fn fftshift<T: Clone>(values: &[T]) -> Vec<T> {
    let mut shifted = values.to_vec();
    shifted.rotate_right(values.len() / 2);
    shifted
}

/// FFT of `signal` zero-padded (or truncated) to `bins` points, scaled by the signal length.
pub fn spectrum(signal: &[Complex<f32>], bins: usize) -> Result<Spectrum> {
    if bins == 0 || signal.is_empty() {
        return Err(Error::Config(String::from(
            "spectrum needs at least one bin and one sample",
        )));
    }

    let mut buffer = vec![Complex::new(0.0f32, 0.0); bins];
    let used = signal.len().min(bins);
    buffer[..used].copy_from_slice(&signal[..used]);

    let mut planner = FftPlanner::<f32>::new();
    planner.plan_fft_forward(bins).process(&mut buffer);

    let scale = 1.0 / signal.len() as f32;
    let scaled: Vec<Complex<f32>> = fftshift(&buffer).into_iter().map(|x| x * scale).collect();

    Ok(Spectrum {
        frequency: fftshift(&fftfreq(bins)),
        magnitude_db: scaled
            .iter()
            .map(|x| 20.0 * (x.norm() + MAGNITUDE_FLOOR).log10())
            .collect(),
        phase: scaled.iter().map(|x| x.arg()).collect(),
    })
}

/// 2-D FFT over fast and slow time for one antenna, zero-padded to `bins` x `bins`.
/// With `remove_chirp_dc` the mean of every chirp is subtracted first, which
/// clears the zero-range row; otherwise the raw cube is transformed.
pub fn range_doppler_map(
    cube: &Datacube,
    antenna: usize,
    bins: usize,
    remove_chirp_dc: bool,
) -> Result<RangeDopplerMap> {
    let layout = cube.layout();
    if antenna >= layout.rx_antennas {
        return Err(Error::Config(format!(
            "antenna {} out of range, frame has {}",
            antenna, layout.rx_antennas
        )));
    }
    if bins < layout.samples_per_chirp.max(layout.chirps_per_frame) {
        return Err(Error::Config(format!(
            "{} bins cannot hold {} samples x {} chirps",
            bins, layout.samples_per_chirp, layout.chirps_per_frame
        )));
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(bins);
    let zero = Complex::new(0.0f32, 0.0);

    // grid[range * bins + doppler]
    let mut grid = vec![zero; bins * bins];
    let mut column = vec![zero; bins];
    for chirp in 0..layout.chirps_per_frame {
        let mut chirp_samples = cube.fast_time(chirp, antenna);
        if remove_chirp_dc {
            remove_dc(&mut chirp_samples);
        }

        column.fill(zero);
        column[..chirp_samples.len()].copy_from_slice(&chirp_samples);
        fft.process(&mut column);

        for (range, value) in column.iter().enumerate() {
            grid[range * bins + chirp] = *value;
        }
    }
    for row in grid.chunks_exact_mut(bins) {
        fft.process(row);
    }

    let half = bins / 2;
    let unshift = |i: usize| (i + bins - half) % bins;
    let mut magnitude = Vec::with_capacity((bins - half) * bins);
    for range in half..bins {
        let source = unshift(range);
        for doppler in 0..bins {
            magnitude.push(grid[source * bins + unshift(doppler)].norm());
        }
    }

    let axis = fftshift(&fftfreq(bins));
    Ok(RangeDopplerMap {
        range_axis: axis[half..].to_vec(),
        doppler_axis: axis,
        magnitude,
    })
}
