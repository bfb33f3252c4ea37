//! European Data Format (EDF/EDF+) reader
//!
//! Layout: a 256-byte fixed header, `ns * 256` bytes of per-signal headers
//! (stored field-by-field for all signals), then data records holding
//! `samples_per_record[i]` little-endian `i16` values for each signal in
//! turn. Digital values map to physical units linearly through the
//! `digital_min/max` and `physical_min/max` header fields.

use super::RawSignal;
use byteorder::{ByteOrder, LittleEndian};
use psi_common::{Error, Result};
use tracing::debug;

const FIXED_HEADER_LEN: usize = 256;
const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Per-signal header fields
#[derive(Debug, Clone, PartialEq)]
pub struct EdfSignalHeader {
    pub label: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: f64,
    pub digital_max: f64,
    pub samples_per_record: usize,
}

impl EdfSignalHeader {
    fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }

    /// Physical units per digital step
    fn gain(&self) -> f64 {
        let span = self.digital_max - self.digital_min;
        if span == 0.0 {
            1.0
        } else {
            (self.physical_max - self.physical_min) / span
        }
    }

    fn to_physical(&self, digital: i16) -> f64 {
        (digital as f64 - self.digital_min) * self.gain() + self.physical_min
    }
}

/// Parsed EDF header
#[derive(Debug, Clone, PartialEq)]
pub struct EdfHeader {
    pub header_bytes: usize,
    /// Number of complete data records present
    pub records: usize,
    /// Bytes in one data record across all signals
    pub record_bytes: usize,
    /// Duration of one data record (seconds)
    pub record_duration: f64,
    pub signals: Vec<EdfSignalHeader>,
}

impl EdfHeader {
    /// Parse the fixed and per-signal headers
    ///
    /// The record count is taken from the file size when the header says
    /// `-1` or claims more records than the file holds.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(Error::Decode(format!(
                "EDF header truncated ({} bytes)",
                bytes.len()
            )));
        }
        if bytes[0] == 0xFF {
            return Err(Error::UnsupportedFormat(
                "24-bit BDF recordings are not supported; convert to EDF".to_string(),
            ));
        }
        if ascii(&bytes[0..8]) != "0" {
            return Err(Error::Decode("Not an EDF file (bad version field)".to_string()));
        }

        let header_bytes: usize = parse_field(&bytes[184..192], "header bytes")?;
        let declared_records: i64 = parse_field(&bytes[236..244], "number of records")?;
        let record_duration: f64 = parse_field(&bytes[244..252], "record duration")?;
        let ns: usize = parse_field(&bytes[252..256], "number of signals")?;

        let expected_header = FIXED_HEADER_LEN + ns * 256;
        if ns == 0 || bytes.len() < expected_header {
            return Err(Error::Decode(format!(
                "EDF signal headers truncated ({} signals, {} bytes)",
                ns,
                bytes.len()
            )));
        }

        let mut fields = SignalFieldReader {
            bytes,
            offset: FIXED_HEADER_LEN,
            ns,
        };
        let labels = fields.next_text(16);
        let _transducers = fields.next_text(80);
        let dimensions = fields.next_text(8);
        let physical_min = fields.next_numbers(8, "physical minimum")?;
        let physical_max = fields.next_numbers(8, "physical maximum")?;
        let digital_min = fields.next_numbers(8, "digital minimum")?;
        let digital_max = fields.next_numbers(8, "digital maximum")?;
        let _prefilters = fields.next_text(80);
        let samples = fields.next_counts(8, "samples per record")?;

        let signals: Vec<EdfSignalHeader> = (0..ns)
            .map(|i| EdfSignalHeader {
                label: labels[i].clone(),
                physical_dimension: dimensions[i].clone(),
                physical_min: physical_min[i],
                physical_max: physical_max[i],
                digital_min: digital_min[i],
                digital_max: digital_max[i],
                samples_per_record: samples[i],
            })
            .collect();

        let record_bytes = signals
            .iter()
            .try_fold(0usize, |acc, s| s.samples_per_record.checked_mul(2)?.checked_add(acc))
            .ok_or_else(|| Error::Decode("EDF data record size overflows".to_string()))?;
        let data_start = header_bytes.max(expected_header);
        let available = if record_bytes == 0 {
            0
        } else {
            bytes.len().saturating_sub(data_start) / record_bytes
        };
        let records = if declared_records < 0 {
            available
        } else {
            (declared_records as usize).min(available)
        };

        Ok(EdfHeader {
            header_bytes: data_start,
            records,
            record_bytes,
            record_duration,
            signals,
        })
    }

    /// Index of the first non-annotation signal
    pub fn first_data_signal(&self) -> Option<usize> {
        self.signals.iter().position(|s| !s.is_annotation())
    }

    /// Number of non-annotation signals
    pub fn data_signal_count(&self) -> usize {
        self.signals.iter().filter(|s| !s.is_annotation()).count()
    }

    /// Sample rate of signal `index` (Hz)
    pub fn sample_rate(&self, index: usize) -> f64 {
        match self.signals.get(index) {
            Some(s) if self.record_duration > 0.0 => s.samples_per_record as f64 / self.record_duration,
            _ => 0.0,
        }
    }

    /// Physical samples of signal `index` across all complete records
    pub fn read_signal(&self, bytes: &[u8], index: usize) -> Result<Vec<f64>> {
        let signal = self
            .signals
            .get(index)
            .ok_or_else(|| Error::DataNotFound(format!("EDF signal {} not present", index)))?;

        // Every partial sum below is bounded by `record_bytes`, checked in `parse`
        let record_bytes = self.record_bytes;
        let offset_in_record: usize = self.signals[..index]
            .iter()
            .map(|s| s.samples_per_record * 2)
            .sum();
        let span = signal.samples_per_record * 2;

        let mut out = Vec::with_capacity(self.records * signal.samples_per_record);
        for record in 0..self.records {
            let start = self.header_bytes + record * record_bytes + offset_in_record;
            let chunk = bytes
                .get(start..start + span)
                .ok_or_else(|| Error::Decode(format!("EDF record {} truncated", record)))?;
            out.extend(
                chunk
                    .chunks_exact(2)
                    .map(|pair| signal.to_physical(LittleEndian::read_i16(pair))),
            );
        }
        Ok(out)
    }
}

/// Reads one per-signal header field for all `ns` signals at a time
struct SignalFieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    ns: usize,
}

impl SignalFieldReader<'_> {
    fn next_text(&mut self, width: usize) -> Vec<String> {
        let values = (0..self.ns)
            .map(|i| {
                let start = self.offset + i * width;
                ascii(&self.bytes[start..start + width])
            })
            .collect();
        self.offset += self.ns * width;
        values
    }

    fn next_counts(&mut self, width: usize, what: &str) -> Result<Vec<usize>> {
        self.next_text(width)
            .into_iter()
            .map(|text| {
                text.parse::<usize>()
                    .map_err(|_| Error::Decode(format!("Invalid EDF {} field: {:?}", what, text)))
            })
            .collect()
    }

    fn next_numbers(&mut self, width: usize, what: &str) -> Result<Vec<f64>> {
        self.next_text(width)
            .into_iter()
            .map(|text| {
                text.parse::<f64>()
                    .map_err(|_| Error::Decode(format!("Invalid EDF {} field: {:?}", what, text)))
            })
            .collect()
    }
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn parse_field<T: std::str::FromStr>(bytes: &[u8], what: &str) -> Result<T> {
    let text = ascii(bytes);
    text.parse::<T>()
        .map_err(|_| Error::Decode(format!("Invalid EDF {} field: {:?}", what, text)))
}

/// Decode the first data channel of an EDF recording
pub(crate) fn read_first_channel(bytes: &[u8]) -> Result<RawSignal> {
    let header = EdfHeader::parse(bytes)?;
    let index = header
        .first_data_signal()
        .ok_or_else(|| Error::DataNotFound("EDF file contains only annotation signals".to_string()))?;

    let sample_rate = header.sample_rate(index);
    if !(sample_rate > 0.0 && sample_rate.is_finite()) {
        return Err(Error::Decode(format!(
            "EDF record duration {} s gives no sample rate",
            header.record_duration
        )));
    }

    let samples = header.read_signal(bytes, index)?;
    let label = header.signals[index].label.clone();

    debug!(
        channel = %label,
        sample_rate = sample_rate,
        records = header.records,
        samples = samples.len(),
        "EDF channel decoded"
    );

    Ok(RawSignal {
        samples,
        sample_rate,
        source: label,
        channels: header.data_signal_count(),
    })
}

/// Build a minimal EDF file (test fixture helper)
#[cfg(test)]
pub(crate) fn build_edf(signals: &[(&str, usize, Vec<i16>)], records: usize, duration: f64) -> Vec<u8> {
    fn field(out: &mut Vec<u8>, text: &str, width: usize) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(width, b' ');
        out.extend_from_slice(&bytes);
    }

    let ns = signals.len();
    let mut out = Vec::new();
    field(&mut out, "0", 8);
    field(&mut out, "X X X X", 80);
    field(&mut out, "Startdate 01-JAN-2024 X X X", 80);
    field(&mut out, "01.01.24", 8);
    field(&mut out, "00.00.00", 8);
    field(&mut out, &(256 + ns * 256).to_string(), 8);
    field(&mut out, "", 44);
    field(&mut out, &records.to_string(), 8);
    field(&mut out, &duration.to_string(), 8);
    field(&mut out, &ns.to_string(), 4);
    for (label, _, _) in signals {
        field(&mut out, label, 16);
    }
    for _ in signals {
        field(&mut out, "AgAgCl electrode", 80);
    }
    for _ in signals {
        field(&mut out, "uV", 8);
    }
    for _ in signals {
        field(&mut out, "-3276.8", 8);
    }
    for _ in signals {
        field(&mut out, "3276.7", 8);
    }
    for _ in signals {
        field(&mut out, "-32768", 8);
    }
    for _ in signals {
        field(&mut out, "32767", 8);
    }
    for _ in signals {
        field(&mut out, "", 80);
    }
    for (_, spr, _) in signals {
        field(&mut out, &spr.to_string(), 8);
    }
    for _ in signals {
        field(&mut out, "", 32);
    }
    for record in 0..records {
        for (_, spr, data) in signals {
            for k in 0..*spr {
                let v = data.get(record * spr + k).copied().unwrap_or(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_channel_and_rate() {
        let ch0: Vec<i16> = (0..512).map(|i| (i % 64) as i16 * 10).collect();
        let ch1: Vec<i16> = vec![7; 256];
        let bytes = build_edf(&[("Fp1", 256, ch0.clone()), ("Fp2", 128, ch1)], 2, 1.0);

        let raw = read_first_channel(&bytes).unwrap();
        assert_eq!(raw.sample_rate, 256.0);
        assert_eq!(raw.samples.len(), 512);
        assert_eq!(raw.source, "Fp1");
        assert_eq!(raw.channels, 2);
        // Gain is 0.1 uV per step with this fixture
        assert!((raw.samples[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_second_channel_offsets() {
        let ch0: Vec<i16> = vec![1; 20];
        let ch1: Vec<i16> = (0..10).collect();
        let bytes = build_edf(&[("A", 10, ch0), ("B", 5, ch1)], 2, 0.5);
        let header = EdfHeader::parse(&bytes).unwrap();
        assert_eq!(header.sample_rate(1), 10.0);
        let b = header.read_signal(&bytes, 1).unwrap();
        let expected: Vec<f64> = (0..10).map(|v| v as f64 * 0.1).collect();
        for (got, want) in b.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_skips_annotation_signal() {
        let bytes = build_edf(
            &[("EDF Annotations", 30, vec![0; 30]), ("C3", 100, vec![5; 100])],
            1,
            1.0,
        );
        let raw = read_first_channel(&bytes).unwrap();
        assert_eq!(raw.source, "C3");
        assert_eq!(raw.sample_rate, 100.0);
        assert_eq!(raw.channels, 1);
    }

    #[test]
    fn test_unknown_record_count_uses_file_size() {
        let mut bytes = build_edf(&[("Cz", 4, (0..12).collect())], 3, 1.0);
        // Overwrite the record count with -1
        bytes[236..244].copy_from_slice(b"-1      ");
        let header = EdfHeader::parse(&bytes).unwrap();
        assert_eq!(header.records, 3);
    }

    #[test]
    fn test_truncated_data_drops_partial_record() {
        let mut bytes = build_edf(&[("Cz", 4, (0..12).collect())], 3, 1.0);
        bytes.truncate(bytes.len() - 3);
        let header = EdfHeader::parse(&bytes).unwrap();
        assert_eq!(header.records, 2);
        assert_eq!(header.read_signal(&bytes, 0).unwrap().len(), 8);
    }

    #[test]
    fn test_bdf_is_unsupported() {
        let mut bytes = vec![b' '; 256];
        bytes[0] = 0xFF;
        bytes[1..8].copy_from_slice(b"BIOSEMI");
        let err = EdfHeader::parse(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_non_integer_samples_per_record_is_decode_error() {
        for field in [&b"inf     "[..], b"1e300   ", b"-5      ", b"2.5     "] {
            let mut bytes = build_edf(&[("Cz", 4, (0..8).collect())], 2, 1.0);
            // samples-per-record of the only signal sits after 216 header bytes
            bytes[256 + 216..256 + 224].copy_from_slice(field);
            let err = read_first_channel(&bytes).unwrap_err();
            assert!(matches!(err, Error::Decode(_)), "{:?}", field);
        }
    }

    #[test]
    fn test_oversized_samples_per_record_yields_no_records() {
        let mut bytes = build_edf(&[("Cz", 4, (0..8).collect())], 2, 1.0);
        bytes[256 + 216..256 + 224].copy_from_slice(b"99999999");
        let header = EdfHeader::parse(&bytes).unwrap();
        assert_eq!(header.records, 0);
        assert!(header.read_signal(&bytes, 0).unwrap().is_empty());
    }

    #[test]
    fn test_short_input_is_decode_error() {
        assert!(matches!(read_first_channel(b"0       ").unwrap_err(), Error::Decode(_)));
    }
}
