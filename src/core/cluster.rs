//! Spatial cluster statistics and cluster-level masking.
//!
//! Cluster labels are produced by an upstream spatial clustering step; the
//! filters here only consume them. Mask decisions are atomic per cluster:
//! every pixel sharing a label receives the same outcome.

use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::types::{ClusterGrid, ClusterValues, FogResult, Grid, GridValue, Mask, SceneData};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Mean of a value grid over each positive cluster label.
///
/// Background (label 0) and NaN values are always excluded;
/// `skip_nonpositive` additionally drops values <= 0 as non-physical.
pub fn cluster_mean(labels: &ClusterGrid, values: &Grid, skip_nonpositive: bool) -> ClusterValues {
    let mut sums: HashMap<u32, (GridValue, usize)> = HashMap::new();
    for (&label, &value) in labels.iter().zip(values.iter()) {
        if label == 0 {
            continue;
        }
        let entry = sums.entry(label).or_insert((0.0, 0));
        if value.is_finite() && !(skip_nonpositive && value <= 0.0) {
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(label, (sum, count))| {
            let mean = if count > 0 {
                sum / count as GridValue
            } else {
                GridValue::NAN
            };
            (label, mean)
        })
        .collect()
}

/// Standard deviation of a value grid over each positive cluster label.
pub fn cluster_std(labels: &ClusterGrid, values: &Grid) -> ClusterValues {
    let means = cluster_mean(labels, values, false);
    let mut sums: HashMap<u32, (GridValue, usize)> = HashMap::new();
    for (&label, &value) in labels.iter().zip(values.iter()) {
        if label == 0 || !value.is_finite() {
            continue;
        }
        if let Some(&mean) = means.get(&label) {
            let entry = sums.entry(label).or_insert((0.0, 0));
            let d = value - mean;
            entry.0 += d * d;
            entry.1 += 1;
        }
    }
    means
        .into_iter()
        .map(|(label, _)| {
            let std = match sums.get(&label) {
                Some(&(sq, count)) if count > 0 => (sq / count as GridValue).sqrt(),
                _ => GridValue::NAN,
            };
            (label, std)
        })
        .collect()
}

/// Clustering filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterFilterConfig {
    /// Maximum cloud top height for fog candidate clusters in meters
    pub max_cluster_height: GridValue,
    /// Maximum 10.8 um standard deviation for homogeneous clusters in K
    pub max_cluster_stddev: GridValue,
}

impl Default for ClusterFilterConfig {
    fn default() -> Self {
        Self {
            max_cluster_height: 2000.0,
            max_cluster_stddev: 2.5,
        }
    }
}

/// Filtering cloud clusters by cloud top height.
///
/// Masks whole clusters in which any height observation exceeds the
/// low-cloud limit (2000 m). Passing clusters are additionally relabeled
/// with their mean height for downstream use.
pub struct SpatialCloudTopHeightFilter {
    clusters: Option<ClusterGrid>,
    cluster_heights: Option<HashMap<u32, Vec<GridValue>>>,
    config: ClusterFilterConfig,
}

const CTH_NAME: &str = "SpatialCloudTopHeightFilter";

impl SpatialCloudTopHeightFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, ClusterFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: ClusterFilterConfig) -> Self {
        Self {
            clusters: scene.clusters.clone(),
            cluster_heights: scene.cluster_heights.clone(),
            config,
        }
    }

    fn rejected_clusters(&self) -> FogResult<HashSet<u32>> {
        let heights = require(&self.cluster_heights, "cluster_heights", CTH_NAME)?;
        Ok(heights
            .iter()
            .filter(|(_, obs)| obs.iter().any(|&z| z > self.config.max_cluster_height))
            .map(|(&label, _)| label)
            .collect())
    }

    /// Mean-height grid for the clusters passing the height test, NaN
    /// elsewhere.
    pub fn cluster_height_grid(&self) -> FogResult<Grid> {
        let clusters = require(&self.clusters, "clusters", CTH_NAME)?;
        let heights = require(&self.cluster_heights, "cluster_heights", CTH_NAME)?;
        let mean_heights: HashMap<u32, GridValue> = heights
            .iter()
            .filter(|(_, obs)| obs.iter().all(|&z| z <= self.config.max_cluster_height))
            .map(|(&label, obs)| {
                let mean = obs.iter().sum::<GridValue>() / obs.len().max(1) as GridValue;
                (label, mean)
            })
            .collect();
        Ok(clusters.mapv(|label| *mean_heights.get(&label).unwrap_or(&GridValue::NAN)))
    }
}

impl ArrayFilter for SpatialCloudTopHeightFilter {
    fn name(&self) -> &'static str {
        CTH_NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("clusters", self.clusters.is_some()),
            ("cluster_heights", self.cluster_heights.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        self.clusters
            .as_ref()
            .map(|c| ("clusters", c.dim()))
            .into_iter()
            .collect()
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Spatial Clustering Cloud Top Height Filter");
        let clusters = require(&self.clusters, "clusters", CTH_NAME)?;
        let rejected = self.rejected_clusters()?;
        Ok(clusters.mapv(|label| label != 0 && rejected.contains(&label)))
    }
}

/// Filtering cloud clusters by spatial homogeneity.
///
/// Uniform fog layers show little 10.8 um variation; clusters whose
/// brightness temperature standard deviation exceeds the limit (2.5 K) are
/// masked wholesale.
pub struct SpatialHomogeneityFilter {
    ir108: Option<Grid>,
    clusters: Option<ClusterGrid>,
    config: ClusterFilterConfig,
}

const HOM_NAME: &str = "SpatialHomogeneityFilter";

impl SpatialHomogeneityFilter {
    pub fn new(scene: &SceneData) -> Self {
        Self::with_config(scene, ClusterFilterConfig::default())
    }

    pub fn with_config(scene: &SceneData, config: ClusterFilterConfig) -> Self {
        Self {
            ir108: scene.ir108.clone(),
            clusters: scene.clusters.clone(),
            config,
        }
    }
}

impl ArrayFilter for SpatialHomogeneityFilter {
    fn name(&self) -> &'static str {
        HOM_NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("ir108", self.ir108.is_some()),
            ("clusters", self.clusters.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        let mut shapes = Vec::new();
        if let Some(ir108) = &self.ir108 {
            shapes.push(("ir108", ir108.dim()));
        }
        if let Some(clusters) = &self.clusters {
            shapes.push(("clusters", clusters.dim()));
        }
        shapes
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Spatial Clustering Inhomogeneity Filter");
        let ir108 = require(&self.ir108, "ir108", HOM_NAME)?;
        let clusters = require(&self.clusters, "clusters", HOM_NAME)?;

        let stddevs = cluster_std(clusters, ir108);
        Ok(clusters.mapv(|label| {
            label != 0
                && stddevs
                    .get(&label)
                    .map(|&sd| sd > self.config.max_cluster_stddev)
                    .unwrap_or(false)
        }))
    }
}
