//! Snow masking with the Normalized Difference Snow Index.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::types::{FogResult, Grid, GridValue, Mask, SceneData};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

const NAME: &str = "SnowFilter";

/// Snow filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowFilterConfig {
    /// Minimum NDSI for snow cover
    pub ndsi_threshold: GridValue,
    /// Minimum 0.8 um reflectance for snow (fractional, input is in %)
    pub reflectance_threshold: GridValue,
    /// Minimum 10.8 um brightness temperature for snow in K
    pub temperature_threshold: GridValue,
}

impl Default for SnowFilterConfig {
    fn default() -> Self {
        Self {
            ndsi_threshold: 0.4,
            reflectance_threshold: 0.11,
            temperature_threshold: 256.0,
        }
    }
}

/// Snow filtering for satellite images.
///
/// Snow has a minimum 0.8 um reflectance (0.11) and a minimum temperature
/// (256 K), and reflects less at 1.6 um than water clouds do (Wiscombe and
/// Warren, 1980). Both criteria are combined with the Normalized Difference
/// Snow Index: where the NDSI exceeds 0.4 and the reflectance and
/// temperature tests hold, a pixel is rejected as snow-covered.
pub struct SnowFilter {
    vis006: Option<Grid>,
    vis008: Option<Grid>,
    nir016: Option<Grid>,
    ir108: Option<Grid>,
    config: SnowFilterConfig,
}

impl SnowFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, SnowFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: SnowFilterConfig) -> Self {
        Self {
            vis006: scene.vis006.clone(),
            vis008: scene.vis008.clone(),
            nir016: scene.nir016.clone(),
            ir108: scene.ir108.clone(),
            config,
        }
    }
}

/// (A - B) / (A + B), the normalized difference between two channels.
pub fn normalized_difference(a: &Grid, b: &Grid) -> Grid {
    Zip::from(a).and(b).map_collect(|&a, &b| (a - b) / (a + b))
}

impl ArrayFilter for SnowFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("vis006", self.vis006.is_some()),
            ("vis008", self.vis008.is_some()),
            ("nir016", self.nir016.is_some()),
            ("ir108", self.ir108.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        [
            ("vis006", &self.vis006),
            ("vis008", &self.vis008),
            ("nir016", &self.nir016),
            ("ir108", &self.ir108),
        ]
        .into_iter()
        .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
        .collect()
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Snow Filter");
        let vis006 = require(&self.vis006, "vis006", NAME)?;
        let vis008 = require(&self.vis008, "vis008", NAME)?;
        let nir016 = require(&self.nir016, "nir016", NAME)?;
        let ir108 = require(&self.ir108, "ir108", NAME)?;

        let ndsi = normalized_difference(vis006, nir016);

        // Reflectance input is in percent
        let mask = Zip::from(&ndsi)
            .and(vis008)
            .and(ir108)
            .map_collect(|&ndsi, &refl, &bt| {
                ndsi >= self.config.ndsi_threshold
                    && refl / 100.0 >= self.config.reflectance_threshold
                    && bt >= self.config.temperature_threshold
            });
        Ok(mask)
    }
}
