//! Core fog detection filter modules

pub mod cirrus;
pub mod cloud;
pub mod cluster;
pub mod filter;
pub mod histogram;
pub mod ice;
pub mod low_cloud;
pub mod microphysics;
pub mod snow;
pub mod solar;
pub mod water;

// Re-export main types
pub use cirrus::{cirrus_threshold, CirrusCloudFilter, CirrusFilterConfig};
pub use cloud::{CloudFilter, CloudFilterConfig};
pub use cluster::{
    cluster_mean, cluster_std, ClusterFilterConfig, SpatialCloudTopHeightFilter,
    SpatialHomogeneityFilter,
};
pub use filter::{ArrayFilter, FilterResult, FilterStats};
pub use histogram::Histogram;
pub use ice::{IceCloudFilter, IceFilterConfig};
pub use low_cloud::{
    CloudModel, CloudModelFactory, CloudModelInput, LowCloudConfig, LowCloudFilter,
    LowCloudProducts, SolveMethod, UndefinedClusterPolicy,
};
pub use microphysics::{CloudPhysicsFilter, MicrophysicsConfig};
pub use snow::{normalized_difference, SnowFilter, SnowFilterConfig};
pub use solar::{sun_zenith_angle, sun_zenith_angle_grid};
pub use water::{WaterCloudFilter, WaterCloudFilterConfig};
