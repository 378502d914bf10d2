//! fogmask: Fog and Low Stratus Detection Filters
//!
//! This library implements the masking stages of a satellite fog detection
//! scheme for geostationary imagery: per-pixel threshold filters (cloud,
//! snow, ice phase, thin cirrus, water cloud phase, microphysics), spatial
//! cluster filters, and a concurrent per-cluster evaluation of an external
//! 1-D low cloud model that separates ground fog from elevated low stratus.
//!
//! Filters share one contract ([`core::ArrayFilter`]): each declares its
//! required scene inputs, computes an exclusion mask and OR-merges it with
//! the inbound mask, so masks accumulate monotonically along a chain:
//!
//! ```no_run
//! use fogmask::core::{ArrayFilter, CloudFilter, FilterResult, SnowFilter};
//! use fogmask::types::SceneData;
//!
//! # fn run(scene: SceneData) -> fogmask::types::FogResult<()> {
//! let start = FilterResult::unmasked(scene.ir108.clone().unwrap());
//! let clouds = CloudFilter::new(&scene).apply(&start.values, &start.mask)?;
//! let _snow = SnowFilter::new(&scene).apply(&clouds.values, &clouds.mask)?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    ClusterGrid, ClusterValues, FogError, FogResult, Grid, GridValue, Mask, SceneData,
};

pub use core::{
    ArrayFilter, CirrusCloudFilter, CloudFilter, CloudModel, CloudModelFactory, CloudModelInput,
    CloudPhysicsFilter, FilterResult, FilterStats, IceCloudFilter, LowCloudConfig, LowCloudFilter,
    LowCloudProducts, SnowFilter, SolveMethod, SpatialCloudTopHeightFilter,
    SpatialHomogeneityFilter, UndefinedClusterPolicy, WaterCloudFilter,
};
