//! Adaptive cloud masking from the infrared channel difference histogram.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::core::histogram::Histogram;
use crate::types::{FogError, FogResult, Grid, GridValue, Mask, SceneData};
use serde::{Deserialize, Serialize};

const NAME: &str = "CloudFilter";

/// Cloud filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFilterConfig {
    /// Channel-difference domain containing the clear/cloud histogram peaks
    pub peak_range: (GridValue, GridValue),
    /// Candidate valley edges must lie below this value
    pub valley_limit: GridValue,
    /// Derived thresholds outside this range are reported as suspicious
    pub sanity_range: (GridValue, GridValue),
}

impl Default for CloudFilterConfig {
    fn default() -> Self {
        Self {
            peak_range: (-10.0, 10.0),
            valley_limit: 0.5,
            sanity_range: (-5.0, 0.0),
        }
    }
}

/// Cloud filtering from the 10.8 um - 3.9 um brightness temperature
/// difference.
///
/// The solar component at 3.9 um makes the difference larger for
/// cloud-contaminated pixels than for clear ones. The clear-sky and cloudy
/// populations form separate histogram peaks; the relative minimum between
/// them, nearest to zero from below, separates the two and becomes the mask
/// threshold.
pub struct CloudFilter {
    ir108: Option<Grid>,
    ir039: Option<Grid>,
    config: CloudFilterConfig,
}

impl CloudFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, CloudFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: CloudFilterConfig) -> Self {
        Self {
            ir108: scene.ir108.clone(),
            ir039: scene.ir039.clone(),
            config,
        }
    }

    /// The per-pixel channel difference driving the filter.
    pub fn channel_difference(&self) -> FogResult<Grid> {
        let ir108 = require(&self.ir108, "ir108", NAME)?;
        let ir039 = require(&self.ir039, "ir039", NAME)?;
        Ok(ir108 - ir039)
    }

    /// Derive the clear/cloud separation threshold from the histogram of
    /// the channel difference over unmasked pixels.
    pub fn derive_threshold(&self, inmask: &Mask) -> FogResult<GridValue> {
        let diff = self.channel_difference()?;
        let unmasked: Vec<GridValue> = diff
            .iter()
            .zip(inmask.iter())
            .filter(|&(v, &m)| !m && v.is_finite())
            .map(|(&v, _)| v)
            .collect();

        let hist = Histogram::auto(&unmasked)?;

        // Significant peaks, window sized to a tenth of the bin count
        let window = hist.counts.len() / 10;
        let (lo, hi) = self.config.peak_range;
        let peak_edges: Vec<GridValue> = hist
            .find_peaks(window)
            .into_iter()
            .map(|i| hist.edges[i])
            .filter(|&e| e >= lo && e < hi)
            .collect();
        if peak_edges.is_empty() {
            return Err(FogError::ThresholdDerivation(format!(
                "no significant histogram peaks within {:?}",
                self.config.peak_range
            )));
        }
        let minpeak = peak_edges
            .iter()
            .cloned()
            .fold(GridValue::INFINITY, GridValue::min);
        let maxpeak = peak_edges
            .iter()
            .cloned()
            .fold(GridValue::NEG_INFINITY, GridValue::max);
        log::debug!(
            "Histogram range for cloudy/clear sky pixels: {} - {}",
            minpeak,
            maxpeak
        );

        // The valley between the clear-sky and cloud peaks, nearest to zero
        // from below
        let threshold = hist
            .local_minima()
            .into_iter()
            .map(|i| hist.edges[i])
            .filter(|&e| e >= minpeak && e <= maxpeak && e < self.config.valley_limit)
            .fold(GridValue::NEG_INFINITY, GridValue::max);
        if !threshold.is_finite() {
            return Err(FogError::ThresholdDerivation(format!(
                "no histogram minimum within peak bounds {} - {}",
                minpeak, maxpeak
            )));
        }

        let (sane_lo, sane_hi) = self.config.sanity_range;
        if threshold < sane_lo || threshold > sane_hi {
            log::warn!(
                "Cloud mask difference threshold {} outside normal range ({} to {})",
                threshold,
                sane_lo,
                sane_hi
            );
        } else {
            log::debug!("Cloud mask difference threshold set to {}", threshold);
        }

        Ok(threshold)
    }
}

impl ArrayFilter for CloudFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("ir108", self.ir108.is_some()),
            ("ir039", self.ir039.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        [("ir108", &self.ir108), ("ir039", &self.ir039)]
            .into_iter()
            .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
            .collect()
    }

    fn compute_mask(&self, _values: &Grid, inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Cloud Filter");
        let threshold = self.derive_threshold(inmask)?;
        let diff = self.channel_difference()?;
        Ok(diff.mapv(|d| d > threshold))
    }
}
