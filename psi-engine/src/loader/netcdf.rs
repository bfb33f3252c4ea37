//! Classic NetCDF reader (CDF-1, CDF-2 and CDF-5)
//!
//! Big-endian throughout. Header layout:
//!
//! ```text
//! magic "CDF" version | numrecs | dim_list | gatt_list | var_list
//! ```
//!
//! Names and attribute values are padded to 4-byte boundaries. CDF-2 widens
//! variable offsets to 64 bits; CDF-5 additionally widens every count and
//! adds unsigned and 64-bit integer types. Record variables are stored
//! interleaved: record `r` of every record variable, then record `r + 1`.

use super::{check_limit, RawSignal};
use byteorder::{BigEndian, ByteOrder};
use psi_common::{Error, Result};
use tracing::debug;

const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;
const STREAMING: u64 = 0xFFFF_FFFF;

/// Name of the dimension treated as the time axis
const TIME_DIM: &str = "time";

/// External data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
}

impl NcType {
    fn from_code(code: u32, version: u8) -> Option<Self> {
        let t = match code {
            1 => NcType::Byte,
            2 => NcType::Char,
            3 => NcType::Short,
            4 => NcType::Int,
            5 => NcType::Float,
            6 => NcType::Double,
            7 => NcType::UByte,
            8 => NcType::UShort,
            9 => NcType::UInt,
            10 => NcType::Int64,
            11 => NcType::UInt64,
            _ => return None,
        };
        // Types 7-11 exist only in CDF-5
        if code > 6 && version != 5 {
            return None;
        }
        Some(t)
    }

    pub fn size(self) -> usize {
        match self {
            NcType::Byte | NcType::Char | NcType::UByte => 1,
            NcType::Short | NcType::UShort => 2,
            NcType::Int | NcType::UInt | NcType::Float => 4,
            NcType::Double | NcType::Int64 | NcType::UInt64 => 8,
        }
    }

    pub fn is_numeric(self) -> bool {
        self != NcType::Char
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            NcType::Byte => bytes[0] as i8 as f64,
            NcType::Char | NcType::UByte => bytes[0] as f64,
            NcType::Short => BigEndian::read_i16(bytes) as f64,
            NcType::UShort => BigEndian::read_u16(bytes) as f64,
            NcType::Int => BigEndian::read_i32(bytes) as f64,
            NcType::UInt => BigEndian::read_u32(bytes) as f64,
            NcType::Float => BigEndian::read_f32(bytes) as f64,
            NcType::Double => BigEndian::read_f64(bytes),
            NcType::Int64 => BigEndian::read_i64(bytes) as f64,
            NcType::UInt64 => BigEndian::read_u64(bytes) as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    /// Declared length; 0 marks the record (unlimited) dimension
    pub len: usize,
}

impl Dimension {
    pub fn is_record(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dim_ids: Vec<usize>,
    pub attrs: Vec<Attribute>,
    pub nc_type: NcType,
    pub vsize: u64,
    pub begin: u64,
}

impl Variable {
    /// First numeric value of attribute `name`
    pub fn numeric_attr(&self, name: &str) -> Option<f64> {
        self.attrs.iter().find(|a| a.name == name).and_then(|a| match &a.value {
            AttrValue::Numbers(v) => v.first().copied(),
            AttrValue::Text(_) => None,
        })
    }
}

/// Parsed classic NetCDF file borrowing its bytes
#[derive(Debug)]
pub struct NetCdfFile<'a> {
    data: &'a [u8],
    pub version: u8,
    pub numrecs: usize,
    pub dims: Vec<Dimension>,
    pub attrs: Vec<Attribute>,
    pub vars: Vec<Variable>,
}

impl<'a> NetCdfFile<'a> {
    /// Parse the header of a classic NetCDF file
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 || &data[0..3] != b"CDF" {
            return Err(Error::UnsupportedFormat("Not a NetCDF file (missing CDF magic)".to_string()));
        }
        let version = data[3];
        if !matches!(version, 1 | 2 | 5) {
            return Err(Error::UnsupportedFormat(format!(
                "Unknown NetCDF format version {}",
                version
            )));
        }

        let mut reader = HeaderReader { data, pos: 4, version };
        let numrecs_raw = reader.count()?;
        let dims = reader.dim_list()?;
        let attrs = reader.attr_list()?;
        let vars = reader.var_list(dims.len())?;

        let mut file = NetCdfFile {
            data,
            version,
            numrecs: 0,
            dims,
            attrs,
            vars,
        };

        let streaming = numrecs_raw == STREAMING || (version == 5 && numrecs_raw == u64::MAX);
        file.numrecs = if streaming {
            file.records_from_size()?
        } else {
            numrecs_raw as usize
        };
        Ok(file)
    }

    /// Whether `var` is laid out along the record dimension
    pub fn is_record_var(&self, var: &Variable) -> bool {
        var.dim_ids
            .first()
            .and_then(|&id| self.dims.get(id))
            .is_some_and(Dimension::is_record)
    }

    /// Dimension lengths of `var`, record dimension resolved to `numrecs`
    pub fn shape(&self, var: &Variable) -> Vec<usize> {
        var.dim_ids
            .iter()
            .map(|&id| match self.dims.get(id) {
                Some(d) if d.is_record() => self.numrecs,
                Some(d) => d.len,
                None => 0,
            })
            .collect()
    }

    /// Names of `var`'s dimensions
    pub fn dim_names(&self, var: &Variable) -> Vec<&str> {
        var.dim_ids
            .iter()
            .filter_map(|&id| self.dims.get(id).map(|d| d.name.as_str()))
            .collect()
    }

    /// Whether `var` is a coordinate variable (named after a dimension)
    pub fn is_coordinate(&self, var: &Variable) -> bool {
        self.dims.iter().any(|d| d.name == var.name)
    }

    /// Bytes between consecutive records
    fn record_size(&self) -> Result<usize> {
        let record_vars: Vec<&Variable> = self.vars.iter().filter(|v| self.is_record_var(v)).collect();
        let size = match record_vars.as_slice() {
            // A lone record variable is stored without padding
            [only] => self
                .elements_per_record(only)?
                .checked_mul(only.nc_type.size())
                .map(|n| n as u64),
            many => many.iter().try_fold(0u64, |acc, v| acc.checked_add(v.vsize)),
        };
        size.and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::Decode("NetCDF record size overflows".to_string()))
    }

    fn elements_per_record(&self, var: &Variable) -> Result<usize> {
        element_count(self.shape(var).get(1..).unwrap_or(&[]), &var.name)
    }

    fn records_from_size(&self) -> Result<usize> {
        let recsize = self.record_size()?;
        let start = self
            .vars
            .iter()
            .filter(|v| self.is_record_var(v))
            .map(|v| v.begin)
            .min();
        Ok(match start {
            Some(start) if recsize > 0 => (self.data.len() as u64).saturating_sub(start) as usize / recsize,
            _ => 0,
        })
    }

    /// Read `var` as `f64`, masking `_FillValue`/`missing_value` to NaN and
    /// applying `scale_factor`/`add_offset`
    pub fn read_f64(&self, var: &Variable) -> Result<Vec<f64>> {
        if !var.nc_type.is_numeric() {
            return Err(Error::DataNotFound(format!("Variable {} is not numeric", var.name)));
        }
        let tsize = var.nc_type.size();
        let mut raw = Vec::new();

        let overflow = || Error::Decode(format!("Data of variable {} overflows", var.name));
        let begin = usize::try_from(var.begin).map_err(|_| overflow())?;

        if self.is_record_var(var) {
            let span = self
                .elements_per_record(var)?
                .checked_mul(tsize)
                .ok_or_else(overflow)?;
            let recsize = self.record_size()?;
            for r in 0..self.numrecs {
                let start = r
                    .checked_mul(recsize)
                    .and_then(|o| o.checked_add(begin))
                    .ok_or_else(overflow)?;
                let chunk = self.slice(start, span, &var.name)?;
                raw.extend(chunk.chunks_exact(tsize).map(|b| var.nc_type.decode(b)));
            }
        } else {
            let len = element_count(&self.shape(var), &var.name)?
                .checked_mul(tsize)
                .ok_or_else(overflow)?;
            let chunk = self.slice(begin, len, &var.name)?;
            raw.extend(chunk.chunks_exact(tsize).map(|b| var.nc_type.decode(b)));
        }

        let fill = var.numeric_attr("_FillValue");
        let missing = var.numeric_attr("missing_value");
        let scale = var.numeric_attr("scale_factor").unwrap_or(1.0);
        let offset = var.numeric_attr("add_offset").unwrap_or(0.0);

        Ok(raw
            .into_iter()
            .map(|v| {
                if Some(v) == fill || Some(v) == missing {
                    f64::NAN
                } else {
                    v * scale + offset
                }
            })
            .collect())
    }

    fn slice(&self, start: usize, len: usize, what: &str) -> Result<&'a [u8]> {
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| Error::Decode(format!("Data of variable {} lies outside the file", what)))
    }
}

/// Cursor over the header bytes
struct HeaderReader<'a> {
    data: &'a [u8],
    pos: usize,
    version: u8,
}

impl<'a> HeaderReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::Decode(format!("NetCDF header truncated at byte {}", self.pos)))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    /// Element counts and lengths: 64-bit in CDF-5
    fn count(&mut self) -> Result<u64> {
        if self.version == 5 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    /// Data offsets: 64-bit from CDF-2 on
    fn offset(&mut self) -> Result<u64> {
        if self.version == 1 {
            self.u32().map(u64::from)
        } else {
            self.u64()
        }
    }

    fn padded(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.take(len)?;
        self.take((4 - len % 4) % 4)?;
        Ok(bytes)
    }

    fn name(&mut self) -> Result<String> {
        let len = self.count()? as usize;
        let bytes = self.padded(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// List header: `ABSENT` (two zero words) or `tag nelems`
    fn list_header(&mut self, expected_tag: u32) -> Result<usize> {
        let tag = self.u32()?;
        let nelems = self.count()? as usize;
        match tag {
            0 if nelems == 0 => Ok(0),
            t if t == expected_tag => Ok(nelems),
            t => Err(Error::Decode(format!(
                "Unexpected NetCDF list tag {:#x} (expected {:#x})",
                t, expected_tag
            ))),
        }
    }

    fn dim_list(&mut self) -> Result<Vec<Dimension>> {
        let n = self.list_header(NC_DIMENSION)?;
        (0..n)
            .map(|_| {
                let name = self.name()?;
                let len = self.count()? as usize;
                Ok(Dimension { name, len })
            })
            .collect()
    }

    fn attr_list(&mut self) -> Result<Vec<Attribute>> {
        let n = self.list_header(NC_ATTRIBUTE)?;
        (0..n).map(|_| self.attribute()).collect()
    }

    fn nc_type(&mut self) -> Result<NcType> {
        let code = self.u32()?;
        NcType::from_code(code, self.version)
            .ok_or_else(|| Error::Decode(format!("Unknown NetCDF type code {}", code)))
    }

    fn attribute(&mut self) -> Result<Attribute> {
        let name = self.name()?;
        let nc_type = self.nc_type()?;
        let nelems = self.count()? as usize;
        let len = nelems
            .checked_mul(nc_type.size())
            .ok_or_else(|| Error::Decode(format!("Attribute {} too large", name)))?;
        let bytes = self.padded(len)?;
        let value = match nc_type {
            NcType::Char => AttrValue::Text(
                String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
            ),
            t => AttrValue::Numbers(bytes.chunks_exact(t.size()).map(|b| t.decode(b)).collect()),
        };
        Ok(Attribute { name, value })
    }

    fn var_list(&mut self, ndims_total: usize) -> Result<Vec<Variable>> {
        let n = self.list_header(NC_VARIABLE)?;
        (0..n)
            .map(|_| {
                let name = self.name()?;
                let ndims = self.count()? as usize;
                let dim_ids = (0..ndims)
                    .map(|_| {
                        let id = self.count()? as usize;
                        if id >= ndims_total {
                            return Err(Error::Decode(format!(
                                "Variable {} references unknown dimension {}",
                                name, id
                            )));
                        }
                        Ok(id)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let attrs = self.attr_list()?;
                let nc_type = self.nc_type()?;
                let vsize = self.count()?;
                let begin = self.offset()?;
                Ok(Variable {
                    name,
                    dim_ids,
                    attrs,
                    nc_type,
                    vsize,
                    begin,
                })
            })
            .collect()
    }
}

/// Product of `shape`, or a decode error when it does not fit in `usize`
fn element_count(shape: &[usize], what: &str) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| Error::Decode(format!("Shape of variable {} overflows", what)))
}

/// Reduce a C-ordered array to one value per index of `axis` by averaging
/// the finite values over every other axis (NaN when none are finite)
pub(crate) fn mean_along_axis(values: &[f64], shape: &[usize], axis: usize) -> Vec<f64> {
    let len = shape.get(axis).copied().unwrap_or(0);
    let stride: usize = shape[axis + 1..].iter().product();
    let mut sums = vec![0.0; len];
    let mut counts = vec![0usize; len];
    if stride == 0 || len == 0 {
        return vec![f64::NAN; len];
    }
    for (i, &v) in values.iter().enumerate() {
        if v.is_finite() {
            let t = (i / stride) % len;
            sums[t] += v;
            counts[t] += 1;
        }
    }
    sums.iter()
        .zip(&counts)
        .map(|(&s, &c)| if c == 0 { f64::NAN } else { s / c as f64 })
        .collect()
}

/// Extract the GRACE series from a classic NetCDF file
///
/// Picks the first numeric non-coordinate variable with at least one
/// dimension. With a `time` dimension the other dimensions are averaged per
/// time step; otherwise the variable is flattened. The series is treated
/// as sampled at 1 Hz.
pub(crate) fn read_grace_series(bytes: &[u8], max_timesteps: usize) -> Result<RawSignal> {
    let file = NetCdfFile::parse(bytes)?;

    let var = file
        .vars
        .iter()
        .find(|v| v.nc_type.is_numeric() && !v.dim_ids.is_empty() && !file.is_coordinate(v))
        .ok_or_else(|| Error::DataNotFound("No numeric data variables found in NetCDF file".to_string()))?;

    let shape = file.shape(var);
    let time_axis = file.dim_names(var).iter().position(|&d| d == TIME_DIM);
    let series_len = match time_axis {
        Some(axis) => shape[axis],
        None => element_count(&shape, &var.name)?,
    };
    check_limit("grace timesteps", series_len, max_timesteps)?;

    let values = file.read_f64(var)?;
    let samples = match time_axis {
        Some(axis) => mean_along_axis(&values, &shape, axis),
        None => values,
    };

    debug!(
        variable = %var.name,
        shape = ?shape,
        time_axis = ?time_axis,
        samples = samples.len(),
        "NetCDF variable decoded"
    );

    Ok(RawSignal {
        samples,
        sample_rate: 1.0,
        source: var.name.clone(),
        channels: 1,
    })
}


#[cfg(test)]
mod tests {
    use super::fixture::{build, VarSpec};
    use super::*;

    fn grace_fixture() -> Vec<u8> {
        // lwe_thickness(time=3, lat=2, lon=2) with lat/lon coordinates first
        build(
            &[("time", 3), ("lat", 2), ("lon", 2)],
            &[
                VarSpec {
                    name: "lat",
                    dims: vec![1],
                    data: vec![-45.0, 45.0],
                    attrs: vec![],
                },
                VarSpec {
                    name: "lon",
                    dims: vec![2],
                    data: vec![0.0, 180.0],
                    attrs: vec![],
                },
                VarSpec {
                    name: "lwe_thickness",
                    dims: vec![0, 1, 2],
                    data: vec![
                        1.0, 2.0, 3.0, 4.0, // t0
                        5.0, 5.0, 5.0, -999.0, // t1 (one fill value)
                        -999.0, -999.0, -999.0, -999.0, // t2 (all fill)
                    ],
                    attrs: vec![("_FillValue", -999.0)],
                },
            ],
        )
    }

    #[test]
    fn test_parse_header() {
        let bytes = grace_fixture();
        let file = NetCdfFile::parse(&bytes).unwrap();
        assert_eq!(file.version, 1);
        assert_eq!(file.dims.len(), 3);
        assert_eq!(file.vars.len(), 3);
        assert!(file.is_coordinate(&file.vars[0]));
        assert_eq!(file.shape(&file.vars[2]), vec![3, 2, 2]);
    }

    #[test]
    fn test_grace_time_mean_skips_coordinates_and_fill() {
        let bytes = grace_fixture();
        let raw = read_grace_series(&bytes, 10_000).unwrap();
        assert_eq!(raw.source, "lwe_thickness");
        assert_eq!(raw.sample_rate, 1.0);
        assert_eq!(raw.samples.len(), 3);
        assert!((raw.samples[0] - 2.5).abs() < 1e-9);
        assert!((raw.samples[1] - 5.0).abs() < 1e-9);
        assert!(raw.samples[2].is_nan());
    }

    #[test]
    fn test_no_time_dimension_flattens() {
        let bytes = build(
            &[("x", 2), ("y", 3)],
            &[VarSpec {
                name: "field",
                dims: vec![0, 1],
                data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                attrs: vec![("scale_factor", 2.0), ("add_offset", 1.0)],
            }],
        );
        let raw = read_grace_series(&bytes, 10_000).unwrap();
        assert_eq!(raw.samples, vec![3.0, 5.0, 7.0, 9.0, 11.0, 13.0]);
    }

    #[test]
    fn test_timestep_cap() {
        let bytes = grace_fixture();
        let err = read_grace_series(&bytes, 2).unwrap_err();
        assert!(matches!(err, Error::SizeLimitExceeded { actual: 3, limit: 2, .. }));
    }

    #[test]
    fn test_only_coordinates_is_data_not_found() {
        let bytes = build(
            &[("time", 2)],
            &[VarSpec {
                name: "time",
                dims: vec![0],
                data: vec![0.0, 1.0],
                attrs: vec![],
            }],
        );
        let err = read_grace_series(&bytes, 10).unwrap_err();
        assert!(matches!(err, Error::DataNotFound(_)));
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        assert!(matches!(
            NetCdfFile::parse(b"PK\x03\x04").unwrap_err(),
            Error::UnsupportedFormat(_)
        ));
        let bytes = grace_fixture();
        assert!(matches!(
            NetCdfFile::parse(&bytes[..20]).unwrap_err(),
            Error::Decode(_)
        ));
    }

    #[test]
    fn test_record_variables_interleave() {
        // Two record variables a(time) and b(time), 3 records, CDF-1
        let mut out = b"CDF\x01".to_vec();
        out.extend_from_slice(&3u32.to_be_bytes());
        out.extend_from_slice(&0x0Au32.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&4u32.to_be_bytes());
        out.extend_from_slice(b"time");
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&0x0Bu32.to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes());
        let header_len = out.len() + 2 * (4 + 4 + 4 + 4 + 8 + 4 + 4 + 4);
        for (i, name) in ["a", "b"].iter().enumerate() {
            out.extend_from_slice(&1u32.to_be_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&[0u8; 3]);
            out.extend_from_slice(&1u32.to_be_bytes());
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&[0u8; 8]);
            out.extend_from_slice(&5u32.to_be_bytes());
            out.extend_from_slice(&4u32.to_be_bytes());
            out.extend_from_slice(&((header_len + 4 * i) as u32).to_be_bytes());
        }
        assert_eq!(out.len(), header_len);
        for r in 0..3 {
            out.extend_from_slice(&(r as f32).to_be_bytes());
            out.extend_from_slice(&(10.0 + r as f32).to_be_bytes());
        }

        let file = NetCdfFile::parse(&out).unwrap();
        assert_eq!(file.numrecs, 3);
        assert_eq!(file.read_f64(&file.vars[0]).unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(file.read_f64(&file.vars[1]).unwrap(), vec![10.0, 11.0, 12.0]);

        // The first variable wins; "a" is not a coordinate of "time"
        let raw = read_grace_series(&out, 100).unwrap();
        assert_eq!(raw.source, "a");
    }

    #[test]
    fn test_mean_along_axis() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(mean_along_axis(&values, &[2, 3], 0), vec![2.0, 5.0]);
        assert_eq!(mean_along_axis(&values, &[2, 3], 1), vec![2.5, 3.5, 4.5]);
    }

    #[test]
    fn test_mean_along_axis_averages_finite_cells_only() {
        // time is the trailing axis: cells (2) x time (3)
        let nan = f64::NAN;
        let values = [1.0, nan, 3.0, nan, 6.0, 7.0];
        let means = mean_along_axis(&values, &[2, 3], 1);
        assert_eq!(means[0], 1.0);
        assert_eq!(means[1], 6.0);
        assert_eq!(means[2], 5.0);

        let means = mean_along_axis(&[nan, 2.0, nan, 4.0], &[2, 2], 1);
        assert!(means[0].is_nan());
        assert_eq!(means[1], 3.0);
    }

    #[test]
    fn test_partial_fill_timestep_is_mean_of_valid_cells() {
        let bytes = build(
            &[("time", 2), ("cell", 4)],
            &[VarSpec {
                name: "lwe_thickness",
                dims: vec![0, 1],
                data: vec![
                    1.0, 2.0, 6.0, -999.0, // t0
                    -999.0, 4.0, -999.0, -999.0, // t1
                ],
                attrs: vec![("_FillValue", -999.0)],
            }],
        );
        let raw = read_grace_series(&bytes, 100).unwrap();
        assert_eq!(raw.samples, vec![3.0, 4.0]);
    }

    #[test]
    fn test_overflowing_shape_is_decode_error() {
        let huge = u32::MAX;
        let bytes = build(
            &[("x", huge), ("y", huge), ("z", huge)],
            &[VarSpec {
                name: "field",
                dims: vec![0, 1, 2],
                data: vec![],
                attrs: vec![],
            }],
        );
        let err = read_grace_series(&bytes, usize::MAX).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{:?}", err);

        let bytes = build(
            &[("x", huge), ("y", huge)],
            &[VarSpec {
                name: "field",
                dims: vec![0, 1],
                data: vec![],
                attrs: vec![],
            }],
        );
        let file = NetCdfFile::parse(&bytes).unwrap();
        let err = file.read_f64(&file.vars[0]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{:?}", err);
    }
}
