//! Shared fixtures for psi-engine integration tests
//!
//! Every container is synthesized in memory so the tests need no files on
//! disk.

#![allow(dead_code)]

use psi_common::config::ModelConfig;
use psi_common::PsiConfig;
use std::f64::consts::PI;
use std::io::Cursor;

/// Default configuration with a model small enough for debug builds
pub fn test_config() -> PsiConfig {
    let mut config = PsiConfig::default();
    config.model = ModelConfig {
        synthetic_samples: 400,
        n_trees: 30,
        max_depth: 10,
        bootstrap_runs: 16,
        ..ModelConfig::default()
    };
    config
}

/// Exponentially decaying tone
pub fn decaying_tone(freq: f64, fs: f64, secs: f64, tau: f64) -> Vec<f64> {
    let n = (fs * secs) as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            (2.0 * PI * freq * t).sin() * (-t / tau).exp()
        })
        .collect()
}

/// 16-bit mono WAV
pub fn wav_bytes(samples: &[f64], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn edf_field(out: &mut Vec<u8>, text: &str, width: usize) {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(width, b' ');
    out.extend_from_slice(&bytes);
}

/// Single-signal EDF, physical range +/-3276.8 uV (0.1 uV per step)
pub fn edf_bytes(label: &str, samples_per_record: usize, records: usize, duration: f64, values_uv: &[f64]) -> Vec<u8> {
    let mut out = Vec::new();
    edf_field(&mut out, "0", 8);
    edf_field(&mut out, "X X X X", 80);
    edf_field(&mut out, "Startdate 01-JAN-2024 X X X", 80);
    edf_field(&mut out, "01.01.24", 8);
    edf_field(&mut out, "00.00.00", 8);
    edf_field(&mut out, "512", 8);
    edf_field(&mut out, "", 44);
    edf_field(&mut out, &records.to_string(), 8);
    edf_field(&mut out, &duration.to_string(), 8);
    edf_field(&mut out, "1", 4);
    edf_field(&mut out, label, 16);
    edf_field(&mut out, "AgAgCl electrode", 80);
    edf_field(&mut out, "uV", 8);
    edf_field(&mut out, "-3276.8", 8);
    edf_field(&mut out, "3276.7", 8);
    edf_field(&mut out, "-32768", 8);
    edf_field(&mut out, "32767", 8);
    edf_field(&mut out, "", 80);
    edf_field(&mut out, &samples_per_record.to_string(), 8);
    edf_field(&mut out, "", 32);
    for i in 0..records * samples_per_record {
        let v = values_uv.get(i).copied().unwrap_or(0.0);
        let digital = (v * 10.0).round().clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&digital.to_le_bytes());
    }
    out
}

fn nc_name(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    out.resize(out.len() + (4 - s.len() % 4) % 4, 0);
}

/// Classic NetCDF (CDF-1) with a `time` coordinate and one float variable
/// `lwe_thickness(time, cell)`
///
/// `values` is row-major `[time][cell]`.
pub fn grace_netcdf_bytes(times: usize, cells: usize, values: &[f32]) -> Vec<u8> {
    let vars: [(&str, Vec<u32>, Vec<f32>); 2] = [
        ("time", vec![0], (0..times).map(|t| t as f32).collect()),
        ("lwe_thickness", vec![0, 1], values.to_vec()),
    ];

    let header = |begins: &[u32]| {
        let mut out = b"CDF\x01".to_vec();
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&0x0Au32.to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes());
        nc_name(&mut out, "time");
        out.extend_from_slice(&(times as u32).to_be_bytes());
        nc_name(&mut out, "cell");
        out.extend_from_slice(&(cells as u32).to_be_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&0x0Bu32.to_be_bytes());
        out.extend_from_slice(&(vars.len() as u32).to_be_bytes());
        for ((name, dims, data), begin) in vars.iter().zip(begins) {
            nc_name(&mut out, name);
            out.extend_from_slice(&(dims.len() as u32).to_be_bytes());
            for d in dims {
                out.extend_from_slice(&d.to_be_bytes());
            }
            out.extend_from_slice(&[0u8; 8]);
            out.extend_from_slice(&5u32.to_be_bytes());
            out.extend_from_slice(&((data.len() * 4) as u32).to_be_bytes());
            out.extend_from_slice(&begin.to_be_bytes());
        }
        out
    };

    let header_len = header(&[0, 0]).len() as u32;
    let begins = [header_len, header_len + (times * 4) as u32];
    let mut out = header(&begins);
    for (_, _, data) in &vars {
        for v in data {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
    out
}
