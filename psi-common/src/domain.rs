//! Recording domains
//!
//! A domain determines the loader, the filter bank and the resample target
//! applied to a recording. The set is closed: every stage dispatches with an
//! exhaustive `match`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recording domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// PCM audio (WAV)
    Audio,
    /// Clinical EEG (EDF)
    Eeg,
    /// Gravitational-wave strain (HDF5)
    Ligo,
    /// Satellite gravimetry (NetCDF)
    Grace,
}

impl Domain {
    /// All domains in canonical order
    pub fn all_variants() -> [Domain; 4] {
        [Domain::Audio, Domain::Eeg, Domain::Ligo, Domain::Grace]
    }

    /// Parse a domain name (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "audio" => Some(Domain::Audio),
            "eeg" => Some(Domain::Eeg),
            "ligo" => Some(Domain::Ligo),
            "grace" => Some(Domain::Grace),
            _ => None,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Audio => "audio",
            Domain::Eeg => "eeg",
            Domain::Ligo => "ligo",
            Domain::Grace => "grace",
        }
    }

    /// File extensions (lowercase, without dot) accepted by this domain's loader
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            Domain::Audio => &["wav"],
            Domain::Eeg => &["edf"],
            Domain::Ligo => &["hdf5", "h5"],
            Domain::Grace => &["nc"],
        }
    }

    /// Guess the domain from a file name's extension
    pub fn from_extension(file_name: &str) -> Option<Self> {
        let ext = extension_of(file_name)?;
        Domain::all_variants()
            .into_iter()
            .find(|d| d.accepted_extensions().contains(&ext.as_str()))
    }

    /// Resolve the effective domain of an uploaded file
    ///
    /// The extension wins over the declared domain when it maps to a
    /// different one; unknown extensions keep the declared domain.
    pub fn resolve(declared: Domain, file_name: &str) -> Domain {
        match Domain::from_extension(file_name) {
            Some(guessed) if guessed != declared => guessed,
            _ => declared,
        }
    }

    /// Whether `file_name` may be handed to this domain's loader
    ///
    /// The name must end in one of [`Domain::accepted_extensions`]; names
    /// without an extension are rejected.
    pub fn accepts_file(&self, file_name: &str) -> bool {
        extension_of(file_name).is_some_and(|ext| self.accepted_extensions().contains(&ext.as_str()))
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lowercase extension of a file name, if any
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
