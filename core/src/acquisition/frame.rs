/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::error::{Error, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxDataFormat {
    Real = 0,
    ComplexInterleaved = 1,
    ComplexSeparated = 2,
}

impl RxDataFormat {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(RxDataFormat::Real),
            1 => Some(RxDataFormat::ComplexInterleaved),
            2 => Some(RxDataFormat::ComplexSeparated),
            _ => None,
        }
    }

    /// Number of `f32` values carried by one sample.
    pub fn components(&self) -> usize {
        match self {
            RxDataFormat::Real => 1,
            RxDataFormat::ComplexInterleaved | RxDataFormat::ComplexSeparated => 2,
        }
    }
}

/// Shape of a Position2Go frame with complex interleaved samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub samples_per_chirp: usize,
    pub chirps_per_frame: usize,
    pub rx_antennas: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        FrameLayout {
            samples_per_chirp: 64,
            chirps_per_frame: 16,
            rx_antennas: 2,
        }
    }
}

impl FrameLayout {
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_chirp * self.chirps_per_frame * self.rx_antennas * 2
    }

    pub fn chirp_stride(&self) -> usize {
        self.samples_per_chirp * self.rx_antennas * 2
    }

    /// Offset of the real part of (chirp, sample, antenna); the imaginary part follows it.
    pub fn index(&self, chirp: usize, sample: usize, antenna: usize) -> usize {
        chirp * self.chirp_stride() + sample * self.rx_antennas * 2 + antenna * 2
    }
}

/// One acquired frame, as handed over by the radar base endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub sample_data: Vec<f32>,
    pub frame_number: u32,
    pub num_chirps: u32,
    pub num_rx_antennas: u8,
    pub num_samples_per_chirp: u32,
    pub rx_mask: u8,
    pub adc_resolution: u8,
    pub interleaved_rx: u8,
    pub data_format: RxDataFormat,
}

impl FrameInfo {
    /// Sample count implied by the frame metadata.
    pub fn expected_len(&self) -> usize {
        self.num_chirps as usize
            * self.num_rx_antennas as usize
            * self.num_samples_per_chirp as usize
            * self.data_format.components()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_data.len()
    }

    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            samples_per_chirp: self.num_samples_per_chirp as usize,
            chirps_per_frame: self.num_chirps as usize,
            rx_antennas: self.num_rx_antennas as usize,
        }
    }
}

/// Arguments of a frame callback invocation.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    pub handle: i32,
    pub endpoint: u8,
    pub frame: FrameInfo,
}

/// Context registered as the frame callback of a session.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<FrameEvent>,
}

impl FrameSink {
    pub fn channel(capacity: usize) -> (FrameSink, mpsc::Receiver<FrameEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (FrameSink { tx }, rx)
    }

    pub async fn deliver(&self, event: FrameEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::ChannelClosed)
    }

    /// For callers outside the async runtime, e.g. a vendor library thread.
    pub fn deliver_blocking(&self, event: FrameEvent) -> Result<()> {
        self.tx.blocking_send(event).map_err(|_| Error::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Holds the sink for a callback that cannot carry its own context.
///
/// The sink is cloned out under the lock, so clearing the slot never
/// invalidates a delivery already in progress.
#[derive(Debug, Default)]
pub struct SinkSlot {
    sink: Mutex<Option<FrameSink>>,
}

impl SinkSlot {
    pub const fn new() -> Self {
        SinkSlot {
            sink: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<FrameSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the sink it replaces.
    pub fn install(&self, sink: FrameSink) -> Option<FrameSink> {
        self.lock().replace(sink)
    }

    pub fn clear(&self) -> Option<FrameSink> {
        self.lock().take()
    }

    pub fn current(&self) -> Option<FrameSink> {
        self.lock().clone()
    }

    /// Frames arriving while the slot is empty are refused with `ChannelClosed`.
    pub fn forward_blocking(&self, event: FrameEvent) -> Result<()> {
        let sink = self.current().ok_or(Error::ChannelClosed)?;
        sink.deliver_blocking(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position2go_layout_fills_4096_values() {
        let layout = FrameLayout::default();
        assert_eq!(layout.samples_per_frame(), 4096);
        assert_eq!(layout.chirp_stride(), 256);
        assert_eq!(layout.index(1, 2, 1), 256 + 8 + 2);
    }

    #[test]
    fn expected_len_counts_complex_components() {
        let frame = FrameInfo {
            sample_data: vec![],
            frame_number: 0,
            num_chirps: 16,
            num_rx_antennas: 2,
            num_samples_per_chirp: 64,
            rx_mask: 0b11,
            adc_resolution: 12,
            interleaved_rx: 1,
            data_format: RxDataFormat::ComplexInterleaved,
        };
        assert_eq!(frame.expected_len(), 4096);
        assert_eq!(
            FrameInfo {
                data_format: RxDataFormat::Real,
                ..frame
            }
            .expected_len(),
            2048
        );
    }

    fn tiny_event(value: f32) -> FrameEvent {
        FrameEvent {
            handle: 3,
            endpoint: 1,
            frame: FrameInfo {
                sample_data: vec![value],
                frame_number: 0,
                num_chirps: 1,
                num_rx_antennas: 1,
                num_samples_per_chirp: 1,
                rx_mask: 1,
                adc_resolution: 12,
                interleaved_rx: 0,
                data_format: RxDataFormat::Real,
            },
        }
    }

    #[test]
    fn slot_forwards_only_while_installed() {
        let slot = SinkSlot::new();
        let (sink, mut rx) = FrameSink::channel(4);

        assert!(matches!(slot.forward_blocking(tiny_event(0.0)), Err(Error::ChannelClosed)));

        assert!(slot.install(sink).is_none());
        slot.forward_blocking(tiny_event(1.0)).unwrap();
        assert_eq!(rx.try_recv().unwrap().frame.sample_data, vec![1.0]);

        assert!(slot.clear().is_some());
        assert!(matches!(slot.forward_blocking(tiny_event(2.0)), Err(Error::ChannelClosed)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sink_taken_before_clear_stays_usable() {
        let slot = SinkSlot::new();
        let (sink, mut rx) = FrameSink::channel(4);
        slot.install(sink);

        // A callback thread that already picked the sink up races the release.
        let in_flight = slot.current().unwrap();
        slot.clear();
        std::thread::spawn(move || in_flight.deliver_blocking(tiny_event(5.0)))
            .join()
            .unwrap()
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().frame.sample_data, vec![5.0]);
    }

    #[test]
    fn installing_replaces_the_previous_sink() {
        let slot = SinkSlot::new();
        let (first, mut first_rx) = FrameSink::channel(1);
        let (second, mut second_rx) = FrameSink::channel(1);

        slot.install(first);
        assert!(slot.install(second).is_some());
        slot.forward_blocking(tiny_event(9.0)).unwrap();

        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap().frame.sample_data, vec![9.0]);
    }

    #[tokio::test]
    async fn sink_reports_closed_receiver() {
        let (sink, rx) = FrameSink::channel(1);
        drop(rx);
        assert!(sink.is_closed());
        let event = FrameEvent {
            handle: 0,
            endpoint: 1,
            frame: FrameInfo {
                sample_data: vec![1.0],
                frame_number: 0,
                num_chirps: 1,
                num_rx_antennas: 1,
                num_samples_per_chirp: 1,
                rx_mask: 1,
                adc_resolution: 12,
                interleaved_rx: 0,
                data_format: RxDataFormat::Real,
            },
        };
        assert!(matches!(sink.deliver(event).await, Err(Error::ChannelClosed)));
    }
}
