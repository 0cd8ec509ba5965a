/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::frame::FrameLayout;
use crate::error::{Error, Result};
use rustfft::num_complex::Complex;

/// Complex samples of one frame, indexed by fast time, slow time and antenna.
#[derive(Debug, Clone)]
pub struct Datacube {
    layout: FrameLayout,
    data: Vec<Complex<f32>>,
}

impl Datacube {
    pub fn from_frame(samples: &[f32], layout: FrameLayout) -> Result<Self> {
        let expected = layout.samples_per_frame();
        if samples.len() != expected {
            return Err(Error::FrameSizeMismatch {
                expected,
                got: samples.len(),
            });
        }

        let mut data = Vec::with_capacity(expected / 2);
        for sample in 0..layout.samples_per_chirp {
            for chirp in 0..layout.chirps_per_frame {
                for antenna in 0..layout.rx_antennas {
                    let i = layout.index(chirp, sample, antenna);
                    data.push(Complex::new(samples[i], samples[i + 1]));
                }
            }
        }

        Ok(Datacube { layout, data })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    fn offset(&self, sample: usize, chirp: usize, antenna: usize) -> usize {
        (sample * self.layout.chirps_per_frame + chirp) * self.layout.rx_antennas + antenna
    }

    pub fn get(&self, sample: usize, chirp: usize, antenna: usize) -> Complex<f32> {
        self.data[self.offset(sample, chirp, antenna)]
    }

    /// Samples of one chirp on one antenna.
    pub fn fast_time(&self, chirp: usize, antenna: usize) -> Vec<Complex<f32>> {
        (0..self.layout.samples_per_chirp)
            .map(|sample| self.get(sample, chirp, antenna))
            .collect()
    }

    /// One sample position across the chirps of the frame.
    pub fn slow_time(&self, sample: usize, antenna: usize) -> Vec<Complex<f32>> {
        (0..self.layout.chirps_per_frame)
            .map(|chirp| self.get(sample, chirp, antenna))
            .collect()
    }
}

/// Splits a sample dump into frames; a trailing partial frame is dropped.
pub fn split_frames(samples: &[f32], layout: FrameLayout) -> impl Iterator<Item = &[f32]> {
    samples.chunks_exact(layout.samples_per_frame().max(1))
}
