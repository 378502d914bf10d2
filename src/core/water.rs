//! Water cloud phase and small droplet proxy masking.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::core::snow::normalized_difference;
use crate::types::{FogResult, Grid, GridValue, Mask, SceneData};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

const NAME: &str = "WaterCloudFilter";

/// Water cloud filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterCloudFilterConfig {
    /// NDSI above this value indicates non-water cloud phase
    pub ndsi_threshold: GridValue,
}

impl Default for WaterCloudFilterConfig {
    fn default() -> Self {
        Self {
            ndsi_threshold: 0.1,
        }
    }
}

/// Water cloud filtering for satellite images.
///
/// A weak cloud phase test flags pixels whose NDSI exceeds 0.1 as
/// non-water-phase. A small droplet proxy test follows: fog radiates more
/// strongly at 3.9 um than clear ground, which in turn radiates more than
/// other clouds. The 3.9 um values of cloud-free pixels are averaged per
/// image row to obtain an approximately latitudinal reference; cloudy
/// pixels exceeding their row's reference are flagged. Rows without any
/// cloud-free pixel fall back to the scene-wide cloud-free mean.
pub struct WaterCloudFilter {
    vis006: Option<Grid>,
    nir016: Option<Grid>,
    ir039: Option<Grid>,
    cloud_mask: Option<Mask>,
    config: WaterCloudFilterConfig,
}

impl WaterCloudFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, WaterCloudFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: WaterCloudFilterConfig) -> Self {
        Self {
            vis006: scene.vis006.clone(),
            nir016: scene.nir016.clone(),
            ir039: scene.ir039.clone(),
            cloud_mask: scene.cloud_mask.clone(),
            config,
        }
    }

    /// Mean 3.9 um value of the cloud-free pixels of each row, NaN for rows
    /// without any cloud-free pixel.
    fn cloudfree_row_means(ir039: &Grid, cloud_mask: &Mask) -> Vec<GridValue> {
        ir039
            .axis_iter(Axis(0))
            .zip(cloud_mask.axis_iter(Axis(0)))
            .map(|(row, mask_row)| {
                let mut sum = 0.0;
                let mut count = 0usize;
                for (&v, &cloudy) in row.iter().zip(mask_row.iter()) {
                    if !cloudy && v.is_finite() {
                        sum += v;
                        count += 1;
                    }
                }
                if count > 0 {
                    sum / count as GridValue
                } else {
                    GridValue::NAN
                }
            })
            .collect()
    }

    /// Droplet proxy flags for one row, with the row index passed in
    /// explicitly. Cloudy pixels exceeding the row threshold are flagged;
    /// undefined row thresholds fall back to the global cloud-free mean.
    fn row_droplet_flags(
        row_index: usize,
        ir039_row: &[GridValue],
        cloudy_row: &[bool],
        row_means: &[GridValue],
        global_mean: GridValue,
    ) -> Vec<bool> {
        let threshold = if row_means[row_index].is_finite() {
            row_means[row_index]
        } else {
            global_mean
        };
        if !threshold.is_finite() {
            return vec![false; ir039_row.len()];
        }
        ir039_row
            .iter()
            .zip(cloudy_row.iter())
            .map(|(&v, &cloudy)| cloudy && v > threshold)
            .collect()
    }
}

impl ArrayFilter for WaterCloudFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("vis006", self.vis006.is_some()),
            ("nir016", self.nir016.is_some()),
            ("ir039", self.ir039.is_some()),
            ("cloud_mask", self.cloud_mask.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        let mut shapes: Vec<(&'static str, (usize, usize))> = [
            ("vis006", &self.vis006),
            ("nir016", &self.nir016),
            ("ir039", &self.ir039),
        ]
        .into_iter()
        .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
        .collect();
        if let Some(cloud_mask) = &self.cloud_mask {
            shapes.push(("cloud_mask", cloud_mask.dim()));
        }
        shapes
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Water Cloud Filter");
        let vis006 = require(&self.vis006, "vis006", NAME)?;
        let nir016 = require(&self.nir016, "nir016", NAME)?;
        let ir039 = require(&self.ir039, "ir039", NAME)?;
        let cloud_mask = require(&self.cloud_mask, "cloud_mask", NAME)?;

        // Weak water cloud phase test
        let ndsi = normalized_difference(vis006, nir016);
        let mut mask = ndsi.mapv(|v| v > self.config.ndsi_threshold);

        // Small droplet proxy test against latitudinal cloud-free averages
        let row_means = Self::cloudfree_row_means(ir039, cloud_mask);
        let finite: Vec<GridValue> = row_means.iter().cloned().filter(|v| v.is_finite()).collect();
        let global_mean = if finite.is_empty() {
            GridValue::NAN
        } else {
            finite.iter().sum::<GridValue>() / finite.len() as GridValue
        };
        log::debug!(
            "Mean latitudinal threshold for cloudfree areas: {:.2} K",
            global_mean
        );

        let ncols = ir039.ncols();
        for (row_index, mut mask_row) in mask.axis_iter_mut(Axis(0)).enumerate() {
            let ir039_row: Vec<GridValue> =
                (0..ncols).map(|c| ir039[[row_index, c]]).collect();
            let cloudy_row: Vec<bool> = (0..ncols).map(|c| cloud_mask[[row_index, c]]).collect();
            let flags = Self::row_droplet_flags(
                row_index,
                &ir039_row,
                &cloudy_row,
                &row_means,
                global_mean,
            );
            for (m, flag) in mask_row.iter_mut().zip(flags) {
                *m |= flag;
            }
        }

        Ok(mask)
    }
}
