//! Histogram and peak detection helpers for adaptive thresholding.

use crate::types::{FogError, FogResult, GridValue};

/// Histogram with `counts.len() + 1` bin edges.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub edges: Vec<GridValue>,
}

impl Histogram {
    /// Build a histogram with an automatically chosen bin count.
    ///
    /// The bin count is the larger of the Sturges and Freedman-Diaconis
    /// estimates, mirroring numpy's `bins='auto'` rule.
    pub fn auto(values: &[GridValue]) -> FogResult<Histogram> {
        if values.is_empty() {
            return Err(FogError::ThresholdDerivation(
                "no unmasked values for histogram".to_string(),
            ));
        }
        let mut sorted: Vec<GridValue> = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        if !(min.is_finite() && max.is_finite()) {
            return Err(FogError::ThresholdDerivation(
                "non-finite values in histogram input".to_string(),
            ));
        }

        let n = sorted.len();
        let range = max - min;
        let sturges = (n as f64).log2().ceil() as usize + 1;
        let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);
        let fd_width = 2.0 * iqr / (n as GridValue).powf(1.0 / 3.0);
        let fd = if fd_width > 0.0 && range > 0.0 {
            (range / fd_width).ceil() as usize
        } else {
            0
        };
        let nbins = sturges.max(fd).max(1);

        Ok(Histogram::with_bins(values, min, max, nbins))
    }

    /// Build a histogram with a fixed number of equal-width bins.
    pub fn with_bins(
        values: &[GridValue],
        min: GridValue,
        max: GridValue,
        nbins: usize,
    ) -> Histogram {
        let range = if max > min { max - min } else { 1.0 };
        let width = range / nbins as GridValue;
        let mut counts = vec![0usize; nbins];
        for &v in values {
            if !v.is_finite() {
                continue;
            }
            let idx = (((v - min) / width) as usize).min(nbins - 1);
            counts[idx] += 1;
        }
        let edges = (0..=nbins)
            .map(|i| min + width * i as GridValue)
            .collect();
        Histogram { counts, edges }
    }

    /// Indices of local minima of the bin counts, found through sign
    /// changes of the first difference.
    pub fn local_minima(&self) -> Vec<usize> {
        turning_points(&self.counts, true)
    }

    /// Indices of local maxima of the bin counts.
    pub fn local_maxima(&self) -> Vec<usize> {
        turning_points(&self.counts, false)
    }

    /// Indices of significant peaks: bins that dominate a window of
    /// `window` bins on either side.
    pub fn find_peaks(&self, window: usize) -> Vec<usize> {
        let window = window.max(1);
        let n = self.counts.len();
        let mut peaks = Vec::new();
        for i in 0..n {
            let c = self.counts[i];
            if c == 0 {
                continue;
            }
            let lo = i.saturating_sub(window);
            let hi = (i + window + 1).min(n);
            let dominant = (lo..hi).all(|j| self.counts[j] <= c);
            // Skip plateau continuations so each peak is reported once
            let plateau = i > lo && self.counts[i - 1] == c;
            if dominant && !plateau {
                peaks.push(i);
            }
        }
        peaks
    }
}

/// Turning points of a count sequence via first-difference sign changes.
fn turning_points(counts: &[usize], minima: bool) -> Vec<usize> {
    if counts.len() < 3 {
        return Vec::new();
    }
    let signs: Vec<i8> = counts
        .windows(2)
        .map(|w| {
            if w[1] > w[0] {
                1
            } else if w[1] < w[0] {
                -1
            } else {
                0
            }
        })
        .collect();
    let mut points = Vec::new();
    for i in 0..signs.len() - 1 {
        let d = signs[i + 1] - signs[i];
        if (minima && d > 0) || (!minima && d < 0) {
            points.push(i + 1);
        }
    }
    points
}

/// Linear-interpolated percentile of pre-sorted values, q in [0, 100].
fn percentile(sorted: &[GridValue], q: GridValue) -> GridValue {
    if sorted.is_empty() {
        return GridValue::NAN;
    }
    let pos = q / 100.0 * (sorted.len() - 1) as GridValue;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as GridValue;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}
