//! HDF5-backed readers: LIGO strain files and NetCDF-4 GRACE files
//!
//! The HDF5 C library opens files by path, so the uploaded bytes are staged
//! in a temporary file that is removed when the reader returns.

use super::netcdf::mean_along_axis;
use super::{check_limit, RawSignal};
use hdf5::types::TypeDescriptor;
use hdf5::{Dataset, Group};
use psi_common::{Error, Result};
use std::io::Write;
use tracing::debug;

/// Well-known strain dataset paths (GWOSC releases)
const STRAIN_PATHS: &[&str] = &[
    "strain/Strain",
    "H1:GWOSC-4KHZ_R1/strain/Strain",
    "L1:GWOSC-4KHZ_R1/strain/Strain",
    "GWOSC-4KHZ_R1/strain/Strain",
];

/// Attributes that may hold the sample interval (seconds)
const SAMPLE_INTERVAL_ATTRS: &[&str] = &["dt", "Xspacing", "dx"];

const TIME_DIM: &str = "time";

fn h5_err(e: hdf5::Error) -> Error {
    Error::Decode(format!("HDF5 error: {}", e))
}

/// Stage `bytes` on disk and open them as an HDF5 file
fn open(bytes: &[u8]) -> Result<(hdf5::File, tempfile::NamedTempFile)> {
    let mut staged = tempfile::Builder::new().prefix("psi45_").suffix(".h5").tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    let file = hdf5::File::open(staged.path()).map_err(h5_err)?;
    Ok((file, staged))
}

/// First element of a numeric attribute (scalar or 1-element array)
fn numeric_attr(ds: &Dataset, name: &str) -> Option<f64> {
    ds.attr(name).ok()?.read_raw::<f64>().ok()?.first().copied()
}

fn is_numeric(ds: &Dataset) -> bool {
    ds.dtype()
        .and_then(|t| t.to_descriptor())
        .map(|d| {
            matches!(
                d,
                TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Float(_)
            )
        })
        .unwrap_or(false)
}

/// Probe the well-known paths, then search for any dataset whose name
/// contains "strain" (case-insensitive)
fn find_strain(file: &hdf5::File) -> Option<(String, Dataset)> {
    for path in STRAIN_PATHS {
        if let Ok(ds) = file.dataset(path) {
            return Some((path.to_string(), ds));
        }
    }
    search_strain(file, "")
}

fn search_strain(group: &Group, prefix: &str) -> Option<(String, Dataset)> {
    let names = group.member_names().ok()?;
    for name in names {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        if let Ok(ds) = group.dataset(&name) {
            if name == "Strain" || name.to_lowercase().contains("strain") {
                return Some((path, ds));
            }
            continue;
        }
        if let Ok(sub) = group.group(&name) {
            if let Some(hit) = search_strain(&sub, &path) {
                return Some(hit);
            }
        }
    }
    None
}

/// Read the strain series of a LIGO HDF5 file
///
/// The sample rate is `round(1 / dt)` from the first positive sample
/// interval attribute, else `default_fs`.
pub(crate) fn read_strain(bytes: &[u8], max_samples: usize, default_fs: f64) -> Result<RawSignal> {
    let (file, _staged) = open(bytes)?;

    let (path, ds) = find_strain(&file).ok_or_else(|| {
        Error::DataNotFound("Could not locate strain dataset in HDF5 (no 'strain/Strain')".to_string())
    })?;

    check_limit("ligo strain samples", ds.size(), max_samples)?;

    let samples = ds.read_raw::<f64>().map_err(h5_err)?;

    let sample_rate = SAMPLE_INTERVAL_ATTRS
        .iter()
        .find_map(|key| numeric_attr(&ds, key))
        .filter(|dt| *dt > 0.0 && dt.is_finite())
        .map(|dt| (1.0 / dt).round())
        .unwrap_or(default_fs);

    debug!(dataset = %path, samples = samples.len(), sample_rate, "Strain dataset decoded");

    Ok(RawSignal {
        samples,
        sample_rate,
        source: path,
        channels: 1,
    })
}

/// Extract the GRACE series from a NetCDF-4 (HDF5) file
///
/// Dimension scales (coordinate variables and bare dimensions) carry a
/// `CLASS` attribute and are skipped. When a `time` dimension scale exists,
/// the first axis of matching length is averaged over the other axes.
pub(crate) fn read_grace_series(bytes: &[u8], max_timesteps: usize) -> Result<RawSignal> {
    let (file, _staged) = open(bytes)?;

    let names = file.member_names().map_err(h5_err)?;
    let datasets: Vec<(String, Dataset)> = names
        .into_iter()
        .filter_map(|name| file.dataset(&name).ok().map(|ds| (name, ds)))
        .collect();

    let time_len = datasets
        .iter()
        .find(|(name, _)| name == TIME_DIM)
        .map(|(_, ds)| ds.size());

    let (name, ds) = datasets
        .iter()
        .find(|(_, ds)| ds.attr("CLASS").is_err() && ds.ndim() >= 1 && is_numeric(ds))
        .ok_or_else(|| Error::DataNotFound("No numeric data variables found in NetCDF file".to_string()))?;

    let shape = ds.shape();
    let time_axis = time_len.and_then(|len| shape.iter().position(|&s| s == len));
    let series_len = match time_axis {
        Some(axis) => shape[axis],
        None => shape.iter().product(),
    };
    check_limit("grace timesteps", series_len, max_timesteps)?;

    let fill = numeric_attr(ds, "_FillValue");
    let missing = numeric_attr(ds, "missing_value");
    let scale = numeric_attr(ds, "scale_factor").unwrap_or(1.0);
    let offset = numeric_attr(ds, "add_offset").unwrap_or(0.0);

    let values: Vec<f64> = ds
        .read_raw::<f64>()
        .map_err(h5_err)?
        .into_iter()
        .map(|v| {
            if Some(v) == fill || Some(v) == missing {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect();

    let samples = match time_axis {
        Some(axis) => mean_along_axis(&values, &shape, axis),
        None => values,
    };

    debug!(variable = %name, shape = ?shape, samples = samples.len(), "NetCDF-4 variable decoded");

    Ok(RawSignal {
        samples,
        sample_rate: 1.0,
        source: name.clone(),
        channels: 1,
    })
}
