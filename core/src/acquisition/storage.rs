/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 p2g-extract contributors
*/
use crate::dsp::spectrum::{RangeDopplerMap, Spectrum};
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

fn create(path: &Path) -> Result<BufWriter<File>> {
    let output_err = |source| Error::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(output_err)?;
        }
    }
    File::create(path).map(BufWriter::new).map_err(output_err)
}

fn finish(path: &Path, written: std::io::Result<()>) -> Result<()> {
    written.map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// One sample per line, six decimals.
pub fn write_samples(path: &Path, samples: &[f32]) -> Result<()> {
    let mut out = create(path)?;
    let written = samples
        .iter()
        .try_for_each(|s| writeln!(out, "{:.6}", s))
        .and_then(|_| out.flush());
    finish(path, written)
}

/// Reads whitespace separated values back; blank lines are skipped.
pub fn read_samples(path: &Path) -> Result<Vec<f32>> {
    let text = fs::read_to_string(path)?;
    let mut samples = Vec::new();

    for (number, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value = token.parse::<f32>().map_err(|_| Error::Parse {
                path: path.to_path_buf(),
                line: number + 1,
                token: token.to_string(),
            })?;
            samples.push(value);
        }
    }
    Ok(samples)
}

pub fn write_spectrum_csv(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let mut out = create(path)?;
    let written = writeln!(out, "frequency,magnitude_db,phase")
        .and_then(|_| {
            spectrum
                .frequency
                .iter()
                .zip(&spectrum.magnitude_db)
                .zip(&spectrum.phase)
                .try_for_each(|((f, m), p)| writeln!(out, "{:.6},{:.6},{:.6}", f, m, p))
        })
        .and_then(|_| out.flush());
    finish(path, written)
}

/// Rows are range bins, columns Doppler bins; the header carries the Doppler axis.
pub fn write_range_doppler_csv(path: &Path, map: &RangeDopplerMap) -> Result<()> {
    let mut out = create(path)?;
    let header: Vec<String> = map.doppler_axis.iter().map(|d| format!("{:.6}", d)).collect();
    let written = writeln!(out, "range,{}", header.join(","))
        .and_then(|_| {
            map.range_axis.iter().enumerate().try_for_each(|(row, r)| {
                let cells: Vec<String> = map.row(row).iter().map(|v| format!("{:.6}", v)).collect();
                writeln!(out, "{:.6},{}", r, cells.join(","))
            })
        })
        .and_then(|_| out.flush());
    finish(path, written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_one_fixed_point_value_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw-data.txt");

        write_samples(&path, &[1.0, 2.0, 3.0, 4.0]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1.000000\n2.000000\n3.000000\n4.000000\n");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("P2G_raw-data_C").join("raw-data.txt");

        write_samples(&path, &[-0.25, 0.125]).unwrap();

        assert_eq!(read_samples(&path).unwrap(), vec![-0.25, 0.125]);
    }

    #[test]
    fn unwritable_target_is_an_output_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a file.
        let err = write_samples(dir.path(), &[1.0]).unwrap_err();
        assert!(matches!(err, Error::Output { .. }));
    }

    #[test]
    fn reports_line_of_malformed_sample() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "0.5\n\n1.5 2.5\nabc\n").unwrap();

        match read_samples(&path).unwrap_err() {
            Error::Parse { line, token, .. } => {
                assert_eq!(line, 4);
                assert_eq!(token, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
