//! Cloud microphysics plausibility masking.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::types::{FogResult, Grid, GridValue, Mask, SceneData};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

const NAME: &str = "CloudPhysicsFilter";

/// Microphysics filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrophysicsConfig {
    /// Maximum plausible fog optical thickness
    pub max_optical_thickness: GridValue,
    /// Maximum plausible fog droplet effective radius in meters
    pub max_effective_radius: GridValue,
}

impl Default for MicrophysicsConfig {
    fn default() -> Self {
        Self {
            max_optical_thickness: 30.0,
            max_effective_radius: 20e-6,
        }
    }
}

/// Cloud microphysics filtering for satellite images.
///
/// Fog optical depth ranges between 0.15 and 30 and droplet effective
/// radius between 3 and 12 um, with a 20 um maximum in coastal fog. The
/// respective maxima are applied as cut-off levels: pixels outside either
/// range are flagged as non-fog.
pub struct CloudPhysicsFilter {
    cot: Option<Grid>,
    reff: Option<Grid>,
    config: MicrophysicsConfig,
}

impl CloudPhysicsFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, MicrophysicsConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: MicrophysicsConfig) -> Self {
        Self {
            cot: scene.cot.clone(),
            reff: scene.reff.clone(),
            config,
        }
    }
}

impl ArrayFilter for CloudPhysicsFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[("cot", self.cot.is_some()), ("reff", self.reff.is_some())])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        [("cot", &self.cot), ("reff", &self.reff)]
            .into_iter()
            .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
            .collect()
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Cloud Physics Filter");
        let cot = require(&self.cot, "cot", NAME)?;
        let reff = require(&self.reff, "reff", NAME)?;

        let mask = Zip::from(cot).and(reff).map_collect(|&cot, &reff| {
            cot > self.config.max_optical_thickness || reff > self.config.max_effective_radius
        });
        Ok(mask)
    }
}
