//! Small numeric helpers shared by the pipeline stages
//!
//! Everything here is total: empty inputs yield 0 (or `None` where a value
//! cannot exist) instead of NaN.

/// Replace NaN/Inf with 0
#[inline]
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Replace every non-finite sample with 0, in place
pub fn sanitize(samples: &mut [f64]) {
    for s in samples.iter_mut() {
        *s = finite_or_zero(*s);
    }
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0), 0 for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Median, `None` for an empty slice
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between closest ranks
///
/// `q` is in percent. Matches the default ("linear") method of the common
/// array libraries: rank = q/100 * (n - 1).
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Index of the first maximum, `None` for an empty slice
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Discrete gradient: central differences inside, one-sided at the edges
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let mut out = Vec::with_capacity(n);
    out.push(values[1] - values[0]);
    for i in 1..n - 1 {
        out.push((values[i + 1] - values[i - 1]) / 2.0);
    }
    out.push(values[n - 1] - values[n - 2]);
    out
}
