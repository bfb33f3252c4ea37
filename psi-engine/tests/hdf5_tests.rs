//! LIGO strain loading through the HDF5 backend
//!
//! The backend is a default feature; these tests are skipped in
//! `--no-default-features` builds.

#![cfg(feature = "hdf5")]

mod helpers;

use helpers::{decaying_tone, test_config};
use psi_engine::{analyze_batch, load, Domain, Error, UploadedFile};

/// Write an HDF5 file with one float dataset and read it back as bytes
fn strain_file(group: &str, dataset: &str, data: &[f64], interval: Option<(&str, f64)>) -> anyhow::Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("strain.hdf5");
    {
        let file = hdf5::File::create(&path)?;
        let g = file.create_group(group)?;
        let ds = g.new_dataset_builder().with_data(data).create(dataset)?;
        if let Some((name, dt)) = interval {
            ds.new_attr_builder().with_data(&[dt][..]).create(name)?;
        }
    }
    Ok(std::fs::read(&path)?)
}

/// GWOSC-style file: float32 `strain/Strain` with a scalar `dt` attribute
fn float32_strain_file(data: &[f32], dt: f64) -> anyhow::Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("H-H1_GWOSC_4KHZ.hdf5");
    {
        let file = hdf5::File::create(&path)?;
        let ds = file
            .create_group("strain")?
            .new_dataset_builder()
            .with_data(data)
            .create("Strain")?;
        ds.new_attr::<f64>().shape(()).create("dt")?.write_scalar(&dt)?;
    }
    Ok(std::fs::read(&path)?)
}

fn float32_strain(secs: f64) -> Vec<f32> {
    decaying_tone(150.0, 4096.0, secs, 0.5)
        .iter()
        .map(|v| (v * 1e-21) as f32)
        .collect()
}

#[test]
fn test_float32_strain_with_scalar_dt() -> anyhow::Result<()> {
    let config = test_config();
    let data = float32_strain(2.0);
    let bytes = float32_strain_file(&data, 1.0 / 4096.0)?;

    let loaded = load(Domain::Ligo, "H-H1_GWOSC_4KHZ.hdf5", &bytes, &config)?;
    assert_eq!(loaded.sample_rate, 4096.0);
    assert_eq!(loaded.metadata.source, "strain/Strain");
    assert_eq!(loaded.samples.len(), data.len());
    for (got, want) in loaded.samples.iter().zip(&data) {
        assert_eq!(*got, f64::from(*want));
    }
    Ok(())
}

#[test]
fn test_ligo_batch_end_to_end() -> anyhow::Result<()> {
    let config = test_config();
    let bytes = float32_strain_file(&float32_strain(4.0), 1.0 / 4096.0)?;
    let report = analyze_batch(Domain::Ligo, &[UploadedFile::new("H1.hdf5", bytes)], &config);

    let result = report.results[0]
        .as_result()
        .ok_or_else(|| anyhow::anyhow!("LIGO file failed: {:?}", report.results[0]))?;
    assert_eq!(result.domain, Domain::Ligo);
    assert_eq!(result.fs, 4096.0);
    for v in [result.rf_ct, result.kitab_ct, result.kitab_lo, result.kitab_hi] {
        assert!(v.is_finite());
    }
    assert_eq!(report.per_domain[0].median_fs, Some(4096.0));
    Ok(())
}

#[test]
fn test_strain_with_dt_attribute() -> anyhow::Result<()> {
    let config = test_config();
    let data: Vec<f64> = (0..8192).map(|i| (i as f64 * 0.01).sin() * 1e-21).collect();
    let bytes = strain_file("strain", "Strain", &data, Some(("dt", 1.0 / 4096.0)))?;

    let loaded = load(Domain::Ligo, "H-H1_GWOSC.hdf5", &bytes, &config)?;
    assert_eq!(loaded.samples.len(), data.len());
    assert_eq!(loaded.sample_rate, 4096.0);
    assert_eq!(loaded.metadata.source, "strain/Strain");
    Ok(())
}

#[test]
fn test_strain_found_by_search_with_xspacing() -> anyhow::Result<()> {
    let config = test_config();
    let data = vec![0.5; 2048];
    let bytes = strain_file("detector", "h1_strain", &data, Some(("Xspacing", 1.0 / 2048.0)))?;

    let loaded = load(Domain::Ligo, "custom.h5", &bytes, &config)?;
    assert_eq!(loaded.samples.len(), 2048);
    assert_eq!(loaded.sample_rate, 2048.0);
    assert_eq!(loaded.metadata.source, "detector/h1_strain");
    Ok(())
}

#[test]
fn test_missing_interval_uses_default_rate() -> anyhow::Result<()> {
    let config = test_config();
    let bytes = strain_file("strain", "Strain", &[1.0; 100], None)?;
    let loaded = load(Domain::Ligo, "s.hdf5", &bytes, &config)?;
    assert_eq!(loaded.sample_rate, config.defaults.ligo_fs);
    Ok(())
}

#[test]
fn test_no_strain_dataset() -> anyhow::Result<()> {
    let config = test_config();
    let bytes = strain_file("meta", "gps", &[0.0; 4], None)?;
    let err = load(Domain::Ligo, "s.hdf5", &bytes, &config).unwrap_err();
    assert!(matches!(err, Error::DataNotFound(_)));
    Ok(())
}

#[test]
fn test_strain_sample_cap() -> anyhow::Result<()> {
    let mut config = test_config();
    config.limits.max_ligo_samples = 1000;
    let bytes = strain_file("strain", "Strain", &[0.0; 1001], None)?;
    let err = load(Domain::Ligo, "s.hdf5", &bytes, &config).unwrap_err();
    assert!(matches!(err, Error::SizeLimitExceeded { .. }));
    Ok(())
}
