//! Ice cloud phase discrimination.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::types::{FogResult, Grid, GridValue, Mask, SceneData};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

const NAME: &str = "IceCloudFilter";

/// Ice cloud filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceFilterConfig {
    /// Minimum 12.0 um - 8.7 um difference for water phase in K
    pub phase_difference_threshold: GridValue,
    /// Minimum 10.8 um brightness temperature for water phase in K
    pub temperature_threshold: GridValue,
}

impl Default for IceFilterConfig {
    fn default() -> Self {
        Self {
            phase_difference_threshold: 2.5,
            temperature_threshold: 250.0,
        }
    }
}

/// Ice cloud filtering for satellite images.
///
/// The 12.0 um - 8.7 um brightness temperature difference indicates cloud
/// phase (Strabala et al., 1994): above 2.5 K a water cloud is assumed with
/// high certainty. A straightforward temperature cut-off at very low 10.8 um
/// brightness temperatures (250 K) is applied in addition. A pixel is kept
/// only when both tests indicate liquid water phase.
pub struct IceCloudFilter {
    ir087: Option<Grid>,
    ir108: Option<Grid>,
    ir120: Option<Grid>,
    config: IceFilterConfig,
}

impl IceCloudFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, IceFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: IceFilterConfig) -> Self {
        Self {
            ir087: scene.ir087.clone(),
            ir108: scene.ir108.clone(),
            ir120: scene.ir120.clone(),
            config,
        }
    }
}

impl ArrayFilter for IceCloudFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("ir087", self.ir087.is_some()),
            ("ir108", self.ir108.is_some()),
            ("ir120", self.ir120.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        [
            ("ir087", &self.ir087),
            ("ir108", &self.ir108),
            ("ir120", &self.ir120),
        ]
        .into_iter()
        .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
        .collect()
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Ice Cloud Filter");
        let ir087 = require(&self.ir087, "ir087", NAME)?;
        let ir108 = require(&self.ir108, "ir108", NAME)?;
        let ir120 = require(&self.ir120, "ir120", NAME)?;

        let mask = Zip::from(ir120)
            .and(ir087)
            .and(ir108)
            .map_collect(|&ir120, &ir087, &ir108| {
                ir120 - ir087 < self.config.phase_difference_threshold
                    || ir108 < self.config.temperature_threshold
            });
        Ok(mask)
    }
}
