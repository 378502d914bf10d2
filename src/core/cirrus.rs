//! Thin cirrus masking with a dynamic split-window threshold.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::core::solar::sun_zenith_angle_grid;
use crate::types::{FogResult, Grid, GridValue, Mask, SceneData};
use chrono::{DateTime, Utc};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

const NAME: &str = "CirrusCloudFilter";

/// Secant-of-solar-zenith keys of the threshold lookup table
pub const LUT_SECANT_KEYS: [GridValue; 5] = [1.0, 1.25, 1.5, 1.75, 2.0];

/// 10.8 um brightness temperature keys of the threshold lookup table in K
pub const LUT_BT_KEYS: [GridValue; 6] = [260.0, 270.0, 280.0, 290.0, 300.0, 310.0];

/// Split-window difference thresholds in K, rows by brightness temperature,
/// columns by secant of solar zenith angle (Saunders and Kriebel, 1988)
const LUT: [[GridValue; 5]; 6] = [
    [0.55, 0.60, 0.65, 0.90, 1.10],
    [0.58, 0.63, 0.81, 1.03, 1.13],
    [1.30, 1.61, 1.88, 2.14, 2.30],
    [3.06, 3.72, 3.95, 4.27, 4.73],
    [5.77, 6.92, 7.00, 7.42, 8.43],
    [9.41, 11.22, 11.03, 11.60, 13.39],
];

fn nearest_key(keys: &[GridValue], value: GridValue) -> usize {
    let mut best = 0;
    for (i, &k) in keys.iter().enumerate() {
        if (value - k).abs() < (value - keys[best]).abs() {
            best = i;
        }
    }
    best
}

/// Dynamic cirrus threshold for a secant of solar zenith angle and a
/// 10.8 um brightness temperature. Both keys are snapped to their nearest
/// table entry independently.
pub fn cirrus_threshold(secsza: GridValue, bt: GridValue) -> GridValue {
    LUT[nearest_key(&LUT_BT_KEYS, bt)][nearest_key(&LUT_SECANT_KEYS, secsza)]
}

/// Cirrus filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirrusFilterConfig {
    /// Minimum 8.7 um - 10.8 um difference of the strong cirrus test in K
    pub strong_cirrus_threshold: GridValue,
}

impl Default for CirrusFilterConfig {
    fn default() -> Self {
        Self {
            strong_cirrus_threshold: 0.0,
        }
    }
}

/// Thin cirrus cloud filtering for satellite images.
///
/// Thin cirrus is detected through the split-window brightness temperature
/// difference (T10.8 - T12.0), compared against a threshold interpolated
/// from a lookup table keyed by solar zenith angle and 10.8 um brightness
/// temperature (Saunders and Kriebel, 1988). A second strong cirrus test
/// (T8.7 - T10.8 > 0 K) exploits the pronounced cirrus signal at 8.7 um
/// (Wiegner et al., 1998); either signal alone masks the pixel.
pub struct CirrusCloudFilter {
    ir087: Option<Grid>,
    ir108: Option<Grid>,
    ir120: Option<Grid>,
    lat: Option<Grid>,
    lon: Option<Grid>,
    time: Option<DateTime<Utc>>,
    config: CirrusFilterConfig,
}

impl CirrusCloudFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, CirrusFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: CirrusFilterConfig) -> Self {
        Self {
            ir087: scene.ir087.clone(),
            ir108: scene.ir108.clone(),
            ir120: scene.ir120.clone(),
            lat: scene.lat.clone(),
            lon: scene.lon.clone(),
            time: scene.time,
            config,
        }
    }
}

impl ArrayFilter for CirrusCloudFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("ir087", self.ir087.is_some()),
            ("ir108", self.ir108.is_some()),
            ("ir120", self.ir120.is_some()),
            ("lat", self.lat.is_some()),
            ("lon", self.lon.is_some()),
            ("time", self.time.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        [
            ("ir087", &self.ir087),
            ("ir108", &self.ir108),
            ("ir120", &self.ir120),
            ("lat", &self.lat),
            ("lon", &self.lon),
        ]
        .into_iter()
        .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
        .collect()
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Cirrus Filter");
        let ir087 = require(&self.ir087, "ir087", NAME)?;
        let ir108 = require(&self.ir108, "ir108", NAME)?;
        let ir120 = require(&self.ir120, "ir120", NAME)?;
        let lat = require(&self.lat, "lat", NAME)?;
        let lon = require(&self.lon, "lon", NAME)?;
        let time = *require(&self.time, "time", NAME)?;

        let sza = sun_zenith_angle_grid(time, lon, lat);
        let min_sza = sza.iter().cloned().fold(GridValue::INFINITY, GridValue::min);
        let max_sza = sza
            .iter()
            .cloned()
            .fold(GridValue::NEG_INFINITY, GridValue::max);
        log::debug!(
            "Found solar zenith angles from {} to {} degrees",
            min_sza,
            max_sza
        );

        let mask = Zip::from(&sza)
            .and(ir108)
            .and(ir120)
            .and(ir087)
            .map_collect(|&sza, &ir108, &ir120, &ir087| {
                let secsza = 1.0 / sza.to_radians().cos();
                let threshold = cirrus_threshold(secsza, ir108);
                let split_window = ir108 - ir120;
                let strong = ir087 - ir108;
                split_window > threshold || strong > self.config.strong_cirrus_threshold
            });
        Ok(mask)
    }
}
