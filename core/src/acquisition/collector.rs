/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::acquisition::frame::FrameInfo;
use crate::error::{Error, Result};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectState {
    Pending { collected: usize },
    Done,
}

/// Accumulates a fixed number of frames into a preallocated sample buffer.
#[derive(Debug)]
pub struct FrameCollector {
    frames: usize,
    samples_per_frame: usize,
    buffer: Vec<f32>,
    frame_index: usize,
    done: bool,
}

impl FrameCollector {
    pub fn new(frames: usize, samples_per_frame: usize) -> Result<Self> {
        if frames == 0 || samples_per_frame == 0 {
            return Err(Error::Config(format!(
                "cannot collect {} frame(s) of {} sample(s)",
                frames, samples_per_frame
            )));
        }

        let total = frames.checked_mul(samples_per_frame).ok_or_else(|| {
            Error::Config(format!(
                "{} frame(s) of {} sample(s) overflow the sample buffer",
                frames, samples_per_frame
            ))
        })?;

        Ok(FrameCollector {
            frames,
            samples_per_frame,
            buffer: vec![0.0; total],
            frame_index: 0,
            done: false,
        })
    }

    pub fn on_frame(&mut self, frame: &FrameInfo) -> Result<CollectState> {
        if self.done {
            debug!(
                "Ignoring frame {} received after collection completed",
                frame.frame_number
            );
            return Ok(CollectState::Done);
        }

        let got = frame.sample_count();
        if got != self.samples_per_frame {
            return Err(Error::FrameSizeMismatch {
                expected: self.samples_per_frame,
                got,
            });
        }

        info!("Frame: {}", self.frame_index);
        let start = self.frame_index * self.samples_per_frame;
        self.buffer[start..start + self.samples_per_frame].copy_from_slice(&frame.sample_data);
        self.frame_index += 1;

        if self.frame_index >= self.frames {
            self.done = true;
            return Ok(CollectState::Done);
        }

        Ok(CollectState::Pending {
            collected: self.frame_index,
        })
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn samples(&self) -> &[f32] {
        &self.buffer
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.buffer
    }
}
