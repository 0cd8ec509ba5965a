/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use radarbase::acquisition::frame::FrameLayout;
use radarbase::acquisition::storage::{write_range_doppler_csv, write_samples, read_samples, write_spectrum_csv};
use radarbase::connection::backend::SimulatedProtocol;
use radarbase::dsp::{analyze_frame, split_frames};
use radarbase::{AcquisitionConfig, TriggerMode, acquire};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

async fn simulated_capture(frames: usize) -> Vec<f32> {
    let mut protocol = SimulatedProtocol::position2go();
    let config = AcquisitionConfig {
        frames,
        trigger: TriggerMode::Manual,
        timeout: Some(Duration::from_secs(5)),
        ..AcquisitionConfig::default()
    };
    acquire(&mut protocol, &config).await.unwrap()
}

#[tokio::test]
async fn test_simulated_target_peaks_in_range_doppler_map() {
    let samples = simulated_capture(1).await;

    let analysis = analyze_frame(&samples, FrameLayout::default(), 256, true).unwrap();
    let map = &analysis.range_doppler;

    assert_eq!(map.range_axis.len(), 128);
    assert_eq!(map.doppler_axis.len(), 256);
    assert_eq!(map.magnitude.len(), 128 * 256);

    // 12 cycles per 64-sample chirp and 2 cycles per 16 chirps.
    let (range, doppler, magnitude) = map.peak().unwrap();
    assert_eq!((range, doppler), (48, 160));
    assert!((map.range_axis[range] - 0.1875).abs() < 1e-6);
    assert!((map.doppler_axis[doppler] - 0.125).abs() < 1e-6);
    assert!((magnitude - 0.25 * 64.0 * 16.0).abs() < 1.0);
}

#[tokio::test]
async fn test_raw_map_keeps_the_dc_offset_at_zero_range() {
    let samples = simulated_capture(1).await;

    let analysis = analyze_frame(&samples, FrameLayout::default(), 256, false).unwrap();
    let map = &analysis.range_doppler;

    // 0.5 + 0.5i offset summed over 64 samples x 16 chirps.
    assert_eq!(map.peak().map(|(r, d, _)| (r, d)), Some((0, 128)));
    assert!((map.get(0, 128) - 0.5f32.hypot(0.5) * 64.0 * 16.0).abs() < 1.0);
    assert!((map.get(48, 160) - 0.25 * 64.0 * 16.0).abs() < 1.0);
}

#[tokio::test]
async fn test_one_dimensional_spectra_find_beat_and_doppler() {
    let samples = simulated_capture(1).await;

    let analysis = analyze_frame(&samples, FrameLayout::default(), 256, false).unwrap();

    assert_eq!(analysis.fast_time.peak_bin(), Some(128 + 48));
    assert_eq!(analysis.slow_time.peak_bin(), Some(128 + 32));
    // Amplitude 0.25 -> about -12 dB once scaled by the signal length.
    let peak_db = analysis.fast_time.magnitude_db[128 + 48];
    assert!((peak_db - 20.0 * 0.25f32.log10()).abs() < 0.1);
}

#[tokio::test]
async fn test_dump_reload_and_analyze_every_frame() {
    let samples = simulated_capture(2).await;
    let dir = tempdir().unwrap();
    let raw = dir.path().join("raw-data.txt");
    write_samples(&raw, &samples).unwrap();

    let reloaded = read_samples(&raw).unwrap();
    assert_eq!(reloaded.len(), 2 * 4096);

    let layout = FrameLayout::default();
    for (index, frame) in split_frames(&reloaded, layout).enumerate() {
        let analysis = analyze_frame(frame, layout, 256, false).unwrap();
        let rdm = dir.path().join(format!("rdm_{index}.csv"));
        let ft = dir.path().join(format!("ft_freq_{index}.csv"));
        write_range_doppler_csv(&rdm, &analysis.range_doppler).unwrap();
        write_spectrum_csv(&ft, &analysis.fast_time).unwrap();

        let rdm_text = fs::read_to_string(&rdm).unwrap();
        assert_eq!(rdm_text.lines().count(), 1 + 128);
        assert!(rdm_text.starts_with("range,-0.500000,"));

        let ft_text = fs::read_to_string(&ft).unwrap();
        assert_eq!(ft_text.lines().next(), Some("frequency,magnitude_db,phase"));
        assert_eq!(ft_text.lines().count(), 1 + 256);
    }
}

#[test]
fn test_too_few_bins_are_rejected() {
    let samples = vec![0.0; FrameLayout::default().samples_per_frame()];
    assert!(analyze_frame(&samples, FrameLayout::default(), 32, false).is_err());
}
