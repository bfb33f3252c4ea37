//! Domain loaders
//!
//! Decode the raw bytes of one uploaded file into a mono `f64` signal and
//! its sample rate. Each domain has its own container format:
//!
//! | Domain | Container | Backend |
//! |--------|-----------|---------|
//! | audio  | WAV       | symphonia |
//! | eeg    | EDF       | native parser |
//! | ligo   | HDF5      | `hdf5` feature (default) |
//! | grace  | NetCDF    | native parser (classic), `hdf5` feature (NetCDF-4) |
//!
//! Every loader replaces non-finite samples with 0 before returning and
//! enforces the configured size caps before decoding sample data.

mod audio;
mod edf;
#[cfg(feature = "hdf5")]
mod h5;
mod netcdf;

use crate::stats;
use psi_common::{Domain, Error, PsiConfig, Result};
use serde::Serialize;
use tracing::debug;

pub use edf::EdfHeader;
pub use netcdf::NetCdfFile;

/// HDF5 file signature (also the signature of NetCDF-4 files)
pub(crate) const HDF5_MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// Descriptive metadata about a decoded recording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMetadata {
    pub domain: Domain,
    /// File name as uploaded
    pub name: String,
    /// Channel label, dataset path or variable name the samples came from
    pub source: String,
    /// Channels present in the container (before folding/selection)
    pub channels: usize,
}

/// A decoded recording
#[derive(Debug, Clone)]
pub struct LoadedSignal {
    pub samples: Vec<f64>,
    /// Sample rate in Hz
    pub sample_rate: f64,
    pub metadata: SignalMetadata,
}

/// Output of a container-specific reader
#[derive(Debug)]
pub(crate) struct RawSignal {
    pub samples: Vec<f64>,
    pub sample_rate: f64,
    pub source: String,
    pub channels: usize,
}

/// Decode `bytes` of `file_name` as a `domain` recording
///
/// # Errors
/// * `UnsupportedFormat` - extension not accepted by the domain, or no
///   decode backend compiled in
/// * `DataNotFound` - no signal dataset/variable inside the container
/// * `SizeLimitExceeded` - LIGO/GRACE input above the configured caps
/// * `Decode` - corrupt or truncated container
pub fn load(domain: Domain, file_name: &str, bytes: &[u8], config: &PsiConfig) -> Result<LoadedSignal> {
    if !domain.accepts_file(file_name) {
        let expected = domain
            .accepted_extensions()
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join("/");
        return Err(Error::UnsupportedFormat(format!(
            "{} domain expects {} (got {})",
            domain, expected, file_name
        )));
    }

    debug!(domain = %domain, file = file_name, bytes = bytes.len(), "Loading recording");

    let raw = match domain {
        Domain::Audio => audio::decode_wav(bytes)?,
        Domain::Eeg => edf::read_first_channel(bytes)?,
        Domain::Ligo => load_ligo(bytes, config.limits.max_ligo_samples, config.defaults.ligo_fs)?,
        Domain::Grace => load_grace(bytes, config.limits.max_grace_timesteps)?,
    };

    let RawSignal {
        mut samples,
        sample_rate,
        source,
        channels,
    } = raw;
    stats::sanitize(&mut samples);

    debug!(
        domain = %domain,
        file = file_name,
        samples = samples.len(),
        sample_rate = sample_rate,
        source = %source,
        "Recording loaded"
    );

    Ok(LoadedSignal {
        samples,
        sample_rate,
        metadata: SignalMetadata {
            domain,
            name: file_name.to_string(),
            source,
            channels,
        },
    })
}

/// Fail with `SizeLimitExceeded` when `actual` is above `limit`
pub(crate) fn check_limit(what: &'static str, actual: usize, limit: usize) -> Result<()> {
    if actual > limit {
        return Err(Error::SizeLimitExceeded { what, actual, limit });
    }
    Ok(())
}

#[cfg(feature = "hdf5")]
fn load_ligo(bytes: &[u8], max_samples: usize, default_fs: f64) -> Result<RawSignal> {
    h5::read_strain(bytes, max_samples, default_fs)
}

#[cfg(not(feature = "hdf5"))]
fn load_ligo(_bytes: &[u8], _max_samples: usize, _default_fs: f64) -> Result<RawSignal> {
    Err(Error::UnsupportedFormat(
        "LIGO HDF5 files need the `hdf5` backend, which this build leaves out".to_string(),
    ))
}

fn load_grace(bytes: &[u8], max_timesteps: usize) -> Result<RawSignal> {
    if bytes.starts_with(HDF5_MAGIC) {
        return load_netcdf4(bytes, max_timesteps);
    }
    netcdf::read_grace_series(bytes, max_timesteps)
}

#[cfg(feature = "hdf5")]
fn load_netcdf4(bytes: &[u8], max_timesteps: usize) -> Result<RawSignal> {
    h5::read_grace_series(bytes, max_timesteps)
}

#[cfg(not(feature = "hdf5"))]
fn load_netcdf4(_bytes: &[u8], _max_timesteps: usize) -> Result<RawSignal> {
    Err(Error::UnsupportedFormat(
        "NetCDF-4 (HDF5-based) files need the `hdf5` backend, which this build leaves out".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mismatch_is_unsupported() {
        let config = PsiConfig::default();
        let err = load(Domain::Audio, "recording.edf", b"", &config).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(err.to_string().contains(".wav"));

        let err = load(Domain::Ligo, "strain.nc", b"", &config).unwrap_err();
        assert!(err.to_string().contains(".hdf5/.h5"));
    }

    #[test]
    fn test_extensionless_name_is_unsupported() {
        let config = PsiConfig::default();
        let bytes = super::edf::build_edf(&[("Cz", 4, (0..8).collect())], 2, 1.0);
        assert!(load(Domain::Eeg, "subject01.edf", &bytes, &config).is_ok());
        let err = load(Domain::Eeg, "subject01", &bytes, &config).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(err.to_string().contains(".edf"));
    }

    #[test]
    fn test_check_limit() {
        assert!(check_limit("grace timesteps", 10, 10).is_ok());
        let err = check_limit("grace timesteps", 11, 10).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeLimitExceeded {
                actual: 11,
                limit: 10,
                ..
            }
        ));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_ligo_without_backend_is_unsupported() {
        let config = PsiConfig::default();
        let err = load(Domain::Ligo, "H1.hdf5", HDF5_MAGIC, &config).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_netcdf4_without_backend_is_unsupported() {
        let config = PsiConfig::default();
        let err = load(Domain::Grace, "grace.nc", HDF5_MAGIC, &config).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_all_fill_timestep_loads_as_zero() {
        use super::netcdf::fixture::{build, VarSpec};

        let bytes = build(
            &[("time", 3), ("cell", 2)],
            &[VarSpec {
                name: "lwe_thickness",
                dims: vec![0, 1],
                data: vec![1.0, 3.0, -999.0, -999.0, 5.0, -999.0],
                attrs: vec![("_FillValue", -999.0)],
            }],
        );
        let signal = load(Domain::Grace, "grace.nc", &bytes, &PsiConfig::default()).unwrap();
        assert_eq!(signal.samples, vec![2.0, 0.0, 5.0]);
        assert_eq!(signal.sample_rate, 1.0);
    }

    #[test]
    fn test_corrupt_audio_is_decode_error() {
        let config = PsiConfig::default();
        let err = load(Domain::Audio, "noise.wav", &[0u8; 64], &config).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
