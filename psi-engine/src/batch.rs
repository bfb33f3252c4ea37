//! Multi-file analysis
//!
//! Every uploaded file is loaded and featurized on its own; a failure turns
//! that file into an error record and never aborts the batch. Successful
//! files are grouped by domain and each group gets its own ensemble.

use crate::ensemble::{self, Prediction};
use crate::features::{self, FeatureMap, FeatureVector};
use crate::loader;
use crate::metrics::Metrics;
use crate::stats;
use psi_common::{Domain, PsiConfig, Result};
use serde::Serialize;
use tracing::{info, warn};

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Features and calibrated predictions of one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub name: String,
    pub domain: Domain,
    /// Sample rate reported by the container (Hz)
    pub fs: f64,
    pub features: FeatureMap,
    /// Headline prediction (equals `kitab_ct`)
    pub ct_pred: f64,
    pub rf_ct: f64,
    pub kitab_ct: f64,
    pub kitab_lo: f64,
    pub kitab_hi: f64,
    pub delta_ct: f64,
}

/// A file that could not be analyzed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileError {
    /// File name suffixed with ` (error)`
    pub name: String,
    pub domain: Domain,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Ok(FileResult),
    Error(FileError),
}

impl FileOutcome {
    pub fn name(&self) -> &str {
        match self {
            FileOutcome::Ok(r) => &r.name,
            FileOutcome::Error(e) => &e.name,
        }
    }

    pub fn as_result(&self) -> Option<&FileResult> {
        match self {
            FileOutcome::Ok(r) => Some(r),
            FileOutcome::Error(_) => None,
        }
    }
}

/// Aggregates of one domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSummary {
    #[serde(rename = "type")]
    pub domain: Domain,
    pub files: usize,
    /// Mean calibrated `kitab_ct`
    pub avg_ct: Option<f64>,
    pub median_fs: Option<f64>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Everything `analyze_batch` produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// One entry per uploaded file, in upload order
    pub results: Vec<FileOutcome>,
    /// Requested domain's metrics (else the first domain's), gaps filled
    /// from `combined`
    pub metrics: Metrics,
    /// Metrics over every successful file of every domain
    pub combined: Metrics,
    /// Sorted by domain name
    pub per_domain: Vec<DomainSummary>,
}

/// A featurized file awaiting prediction
struct Sample {
    index: usize,
    name: String,
    domain: Domain,
    fs: f64,
    features: FeatureMap,
    vector: FeatureVector,
}

fn featurize(domain: Domain, file: &UploadedFile, config: &PsiConfig) -> Result<(f64, FeatureMap, FeatureVector)> {
    let loaded = loader::load(domain, &file.name, &file.bytes, config)?;
    let set = features::compute_features(domain, &loaded.samples, loaded.sample_rate, config)?;
    Ok((loaded.sample_rate, set.features, set.vector))
}

fn error_record(name: &str, domain: Domain, message: String) -> FileError {
    FileError {
        name: format!("{} (error)", name),
        domain,
        message,
    }
}

/// Analyze every file of one request
///
/// Each file's domain is `requested` unless its extension names another
/// domain.
pub fn analyze_batch(requested: Domain, files: &[UploadedFile], config: &PsiConfig) -> BatchReport {
    let mut results: Vec<Option<FileOutcome>> = vec![None; files.len()];
    let mut groups: Vec<(Domain, Vec<Sample>)> = Vec::new();

    for (index, file) in files.iter().enumerate() {
        let domain = Domain::resolve(requested, &file.name);
        match featurize(domain, file, config) {
            Ok((fs, features, vector)) => {
                let sample = Sample {
                    index,
                    name: file.name.clone(),
                    domain,
                    fs,
                    features,
                    vector,
                };
                match groups.iter_mut().find(|(d, _)| *d == domain) {
                    Some((_, samples)) => samples.push(sample),
                    None => groups.push((domain, vec![sample])),
                }
            }
            Err(e) => {
                warn!(file = %file.name, domain = %domain, "File analysis failed: {}", e);
                results[index] = Some(FileOutcome::Error(error_record(&file.name, domain, e.to_string())));
            }
        }
    }

    let mut per_domain = Vec::with_capacity(groups.len());
    let mut all_targets = Vec::new();
    let mut all_predictions = Vec::new();

    for (domain, samples) in &groups {
        let vectors: Vec<FeatureVector> = samples.iter().map(|s| s.vector).collect();
        let proxies: Vec<f64> = samples.iter().map(|s| s.features.ct_proxy).collect();

        let bundle = match ensemble::fit_and_predict(*domain, &vectors, &proxies, &config.model) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(domain = %domain, files = samples.len(), "Domain prediction failed: {}", e);
                for s in samples {
                    results[s.index] = Some(FileOutcome::Error(error_record(&s.name, s.domain, e.to_string())));
                }
                continue;
            }
        };

        for (s, p) in samples.iter().zip(&bundle.predictions) {
            results[s.index] = Some(FileOutcome::Ok(file_result(s, p)));
        }

        let cts: Vec<f64> = bundle.predictions.iter().map(|p| p.kitab_ct).collect();
        let rates: Vec<f64> = samples.iter().map(|s| s.fs).collect();
        all_targets.extend_from_slice(&proxies);
        all_predictions.extend_from_slice(&cts);

        per_domain.push(DomainSummary {
            domain: *domain,
            files: samples.len(),
            avg_ct: (!cts.is_empty()).then(|| stats::mean(&cts)),
            median_fs: stats::median(&rates),
            metrics: bundle.metrics,
        });
    }

    let combined = Metrics::compute(&all_targets, &all_predictions);
    let headline = per_domain
        .iter()
        .find(|s| s.domain == requested)
        .or_else(|| per_domain.first())
        .map(|s| s.metrics)
        .unwrap_or_default()
        .or(&combined);

    per_domain.sort_by_key(|s| s.domain.as_str());

    let results: Vec<FileOutcome> = results
        .into_iter()
        .zip(files)
        .map(|(outcome, file)| {
            outcome.unwrap_or_else(|| {
                FileOutcome::Error(error_record(
                    &file.name,
                    Domain::resolve(requested, &file.name),
                    "No prediction produced".to_string(),
                ))
            })
        })
        .collect();

    let failed = results.iter().filter(|r| r.as_result().is_none()).count();
    info!(
        requested = %requested,
        files = files.len(),
        failed,
        domains = per_domain.len(),
        r2 = ?headline.r2,
        "Batch analyzed"
    );

    BatchReport {
        results,
        metrics: headline,
        combined,
        per_domain,
    }
}

fn file_result(sample: &Sample, p: &Prediction) -> FileResult {
    FileResult {
        name: sample.name.clone(),
        domain: sample.domain,
        fs: sample.fs,
        features: sample.features,
        ct_pred: p.kitab_ct,
        rf_ct: p.rf_ct,
        kitab_ct: p.kitab_ct,
        kitab_lo: p.kitab_lo,
        kitab_hi: p.kitab_hi,
        delta_ct: p.delta_ct,
    }
}
