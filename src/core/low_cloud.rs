//! Ground fog separation with a concurrent per-cluster cloud model.
//!
//! For each candidate cluster the evaluator aggregates satellite retrievals
//! into scalar means, hands them to an external 1-D low cloud model to
//! solve for cloud base and fog base height, and masks clusters whose fog
//! base lies above the terrain as elevated low stratus.

use crate::core::cluster::cluster_mean;
use crate::core::filter::{missing_from, require, ArrayFilter};
use crate::types::{
    ClusterGrid, FogError, FogResult, Grid, GridValue, Mask, SceneData,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NAME: &str = "LowCloudFilter";

/// Bracketing strategy of the external model's cloud base height solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMethod {
    /// Basin-hopping global optimization
    Basin,
}

/// Construction parameters of the external 1-D low cloud model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudModelInput {
    /// Cloud top height in meters
    pub cth: GridValue,
    /// Cloud top temperature in K
    pub ctt: GridValue,
    /// Liquid water path in g m^-2 (retrieval bias already corrected)
    pub lwp: GridValue,
    /// Initial cloud base height in meters
    pub cbh: GridValue,
    /// Droplet effective radius in meters
    pub reff: GridValue,
}

/// The external 1-D low cloud model contract.
///
/// Both operations may fail (non-convergence, invalid physical state);
/// failures are recovered per cluster and never abort the evaluation.
pub trait CloudModel {
    /// Solve for the cloud base height in meters.
    fn solve_cloud_base_height(
        &self,
        search_anchor: GridValue,
        method: SolveMethod,
    ) -> FogResult<GridValue>;

    /// Fog base height in meters for the solved cloud state.
    fn fog_base_height(&self) -> FogResult<GridValue>;
}

/// Builds one model instance per cluster evaluation.
pub trait CloudModelFactory: Send + Sync {
    fn build(&self, input: CloudModelInput) -> Box<dyn CloudModel + Send>;
}

/// Policy for clusters whose model evaluation yielded no height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndefinedClusterPolicy {
    /// Mask the whole cluster (conservative)
    Exclude,
    /// Keep the cluster unmasked (optimistic)
    Retain,
}

/// Low cloud filter tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowCloudConfig {
    /// Worker pool size for per-cluster model runs, 0 = number of cores
    pub workers: usize,
    /// Correction factor for 3.7 um LWP retrievals (Platnick, 2000)
    pub lwp_correction: GridValue,
    /// Lower search interval anchor for the cloud base solver in meters
    pub search_anchor: GridValue,
    /// Solver strategy passed to the model
    pub solve_method: SolveMethod,
    /// Handling of clusters without a defined model result
    pub undefined_policy: UndefinedClusterPolicy,
}

impl Default for LowCloudConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            lwp_correction: 0.88,
            search_anchor: -100.0,
            solve_method: SolveMethod::Basin,
            undefined_policy: UndefinedClusterPolicy::Exclude,
        }
    }
}

/// Full-resolution products of one evaluator run.
#[derive(Debug, Clone)]
pub struct LowCloudProducts {
    /// Cloud base height per pixel, NaN where undefined
    pub cloud_base_height: Grid,
    /// Fog base height per pixel, NaN where undefined
    pub fog_base_height: Grid,
    /// Elevated stratus mask, `true` = not ground fog
    pub mask: Mask,
    /// Per-cluster (cloud base, fog base) heights
    pub cluster_heights: HashMap<u32, (GridValue, GridValue)>,
}

/// Low cloud filtering for satellite images.
///
/// Separates low stratus from ground fog by calibrating a cloud base
/// height per cluster with the external 1-D low cloud model and comparing
/// the resulting fog base height against terrain elevation.
pub struct LowCloudFilter<F> {
    lwp: Option<Grid>,
    cth: Option<Grid>,
    ir108: Option<Grid>,
    reff: Option<Grid>,
    elevation: Option<Grid>,
    clusters: Option<ClusterGrid>,
    factory: F,
    config: LowCloudConfig,
}

impl<F: CloudModelFactory> LowCloudFilter<F> {
    pub fn new(scene: &SceneData, factory: F) -> Self {
        Self::with_config(scene, factory, LowCloudConfig::default())
    }

    pub fn with_config(scene: &SceneData, factory: F, config: LowCloudConfig) -> Self {
        Self {
            lwp: scene.lwp.clone(),
            cth: scene.cth.clone(),
            ir108: scene.ir108.clone(),
            reff: scene.reff.clone(),
            elevation: scene.elevation.clone(),
            clusters: scene.clusters.clone(),
            factory,
            config,
        }
    }

    /// Run the cluster models and assemble the full-resolution products.
    ///
    /// One unit of work is submitted per cluster with a defined liquid
    /// water path mean; units are independent and their results are keyed
    /// by cluster label, so completion order does not matter. The worker
    /// pool lives only for the duration of this call.
    pub fn evaluate(&self) -> FogResult<LowCloudProducts> {
        let lwp = require(&self.lwp, "lwp", NAME)?;
        let cth = require(&self.cth, "cth", NAME)?;
        let ir108 = require(&self.ir108, "ir108", NAME)?;
        let reff = require(&self.reff, "reff", NAME)?;
        let elevation = require(&self.elevation, "elevation", NAME)?;
        let clusters = require(&self.clusters, "clusters", NAME)?;

        // Every retrieval grid is indexed with cluster grid coordinates below
        let expected = clusters.dim();
        let inputs: [(&'static str, &Grid); 5] = [
            ("lwp", lwp),
            ("cth", cth),
            ("ir108", ir108),
            ("reff", reff),
            ("elevation", elevation),
        ];
        for (name, grid) in inputs {
            if grid.dim() != expected {
                return Err(FogError::ShapeMismatch {
                    name,
                    expected,
                    actual: grid.dim(),
                });
            }
        }

        // Cluster means of the model inputs. LWP is scaled from kg m^-2 to
        // the model's g m^-2; non-positive water paths and heights are
        // non-physical retrieval artifacts and excluded.
        let lwp_cluster = cluster_mean(clusters, &lwp.mapv(|v| v * 1000.0), true);
        let cth_cluster = cluster_mean(clusters, cth, true);
        let ctt_cluster = cluster_mean(clusters, ir108, false);
        let reff_cluster = cluster_mean(clusters, reff, false);

        let keys: Vec<u32> = lwp_cluster
            .iter()
            .filter(|(_, &v)| v.is_finite())
            .map(|(&k, _)| k)
            .collect();
        log::info!("Run low cloud models for {} clusters", keys.len());

        // Scoped worker pool, torn down when this call returns
        let mut builder = rayon::ThreadPoolBuilder::new();
        if self.config.workers > 0 {
            builder = builder.num_threads(self.config.workers);
        }
        let pool = builder
            .build()
            .map_err(|e| FogError::InvalidConfig(e.to_string()))?;

        let cluster_heights: HashMap<u32, (GridValue, GridValue)> = pool.install(|| {
            keys.par_iter()
                .map(|&key| {
                    let heights = self.solve_cluster(
                        lwp_cluster[&key],
                        cth_cluster[&key],
                        ctt_cluster[&key],
                        reff_cluster[&key],
                    );
                    (key, heights)
                })
                .collect()
        });

        // Broadcast cluster scalars back to scene resolution
        let exclude_undefined = self.config.undefined_policy == UndefinedClusterPolicy::Exclude;
        let mut cbh = Grid::from_elem(clusters.raw_dim(), GridValue::NAN);
        let mut fbh = Grid::from_elem(clusters.raw_dim(), GridValue::NAN);
        let mut mask = Mask::from_elem(clusters.raw_dim(), false);
        for ((row, col), &label) in clusters.indexed_iter() {
            if label == 0 {
                continue;
            }
            match cluster_heights.get(&label).copied() {
                Some((cluster_cbh, cluster_fbh)) if cluster_fbh.is_finite() => {
                    cbh[[row, col]] = cluster_cbh;
                    fbh[[row, col]] = cluster_fbh;
                    // Fog base above terrain: elevated stratus, not ground fog
                    if cluster_fbh - elevation[[row, col]] > 0.0 {
                        mask[[row, col]] = true;
                    }
                }
                Some((cluster_cbh, cluster_fbh)) => {
                    cbh[[row, col]] = cluster_cbh;
                    fbh[[row, col]] = cluster_fbh;
                    mask[[row, col]] = exclude_undefined;
                }
                None => {
                    mask[[row, col]] = exclude_undefined;
                }
            }
        }

        Ok(LowCloudProducts {
            cloud_base_height: cbh,
            fog_base_height: fbh,
            mask,
            cluster_heights,
        })
    }

    /// One unit of work: build and solve the model for a cluster. Any model
    /// failure yields undefined heights for this cluster only.
    fn solve_cluster(
        &self,
        lwp: GridValue,
        cth: GridValue,
        ctt: GridValue,
        reff: GridValue,
    ) -> (GridValue, GridValue) {
        let model = self.factory.build(CloudModelInput {
            cth,
            ctt,
            lwp: lwp * self.config.lwp_correction,
            cbh: 0.0,
            reff,
        });
        let solved = model
            .solve_cloud_base_height(self.config.search_anchor, self.config.solve_method)
            .and_then(|cbh| model.fog_base_height().map(|fbh| (cbh, fbh)));
        match solved {
            Ok(heights) => heights,
            Err(e) => {
                log::debug!("Cluster model run failed: {}", e);
                (GridValue::NAN, GridValue::NAN)
            }
        }
    }
}

impl<F: CloudModelFactory> ArrayFilter for LowCloudFilter<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn missing_inputs(&self) -> Vec<&'static str> {
        missing_from(&[
            ("lwp", self.lwp.is_some()),
            ("cth", self.cth.is_some()),
            ("ir108", self.ir108.is_some()),
            ("reff", self.reff.is_some()),
            ("elevation", self.elevation.is_some()),
            ("clusters", self.clusters.is_some()),
        ])
    }

    fn input_shapes(&self) -> Vec<(&'static str, (usize, usize))> {
        let mut shapes: Vec<(&'static str, (usize, usize))> = [
            ("lwp", &self.lwp),
            ("cth", &self.cth),
            ("ir108", &self.ir108),
            ("reff", &self.reff),
            ("elevation", &self.elevation),
        ]
        .into_iter()
        .filter_map(|(n, g)| g.as_ref().map(|g| (n, g.dim())))
        .collect();
        if let Some(clusters) = &self.clusters {
            shapes.push(("clusters", clusters.dim()));
        }
        shapes
    }

    fn compute_mask(&self, _values: &Grid, _inmask: &Mask) -> FogResult<Mask> {
        log::info!("Applying Low Cloud Filter");
        Ok(self.evaluate()?.mask)
    }
}
