use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::collections::HashMap;

/// Physical measurement value (brightness temperature, reflectance, height)
pub type GridValue = f32;

/// 2D grid of physical measurements (rows x columns)
pub type Grid = Array2<GridValue>;

/// 2D exclusion mask, `true` = pixel excluded from further consideration
pub type Mask = Array2<bool>;

/// 2D cluster label grid, 0 = background, positive = cluster id
pub type ClusterGrid = Array2<u32>;

/// Per-cluster scalar aggregate keyed by cluster label
pub type ClusterValues = HashMap<u32, GridValue>;

/// Scene inputs recognized by the fog detection filters.
///
/// Channel grids are pre-calibrated brightness temperatures (K) or
/// reflectances (%), all sharing one scene shape. Every field is optional;
/// each filter declares which ones it requires and reports the missing ones
/// through its applicability check.
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    /// 3.9 um brightness temperature
    pub ir039: Option<Grid>,
    /// 0.6 um reflectance
    pub vis006: Option<Grid>,
    /// 0.8 um reflectance
    pub vis008: Option<Grid>,
    /// 1.6 um reflectance
    pub nir016: Option<Grid>,
    /// 8.7 um brightness temperature
    pub ir087: Option<Grid>,
    /// 10.8 um brightness temperature
    pub ir108: Option<Grid>,
    /// 12.0 um brightness temperature
    pub ir120: Option<Grid>,
    /// Pixel latitudes in degrees north
    pub lat: Option<Grid>,
    /// Pixel longitudes in degrees east
    pub lon: Option<Grid>,
    /// Terrain elevation in meters
    pub elevation: Option<Grid>,
    /// Cloud optical thickness retrieval
    pub cot: Option<Grid>,
    /// Droplet effective radius retrieval in meters
    pub reff: Option<Grid>,
    /// Liquid water path retrieval in kg m^-2
    pub lwp: Option<Grid>,
    /// Cloud top height retrieval in meters
    pub cth: Option<Grid>,
    /// Cluster label grid from the upstream spatial clustering step
    pub clusters: Option<ClusterGrid>,
    /// Height observations per cluster label
    pub cluster_heights: Option<HashMap<u32, Vec<GridValue>>>,
    /// Cloud mask from the cloud filter, `true` = cloudy
    pub cloud_mask: Option<Mask>,
    /// Scene acquisition time
    pub time: Option<DateTime<Utc>>,
}

/// Error types for fog detection processing
#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error("filter <{filter}> is not applicable, missing inputs: {missing:?}")]
    Inapplicable {
        filter: &'static str,
        missing: Vec<&'static str>,
    },

    #[error("shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("threshold derivation failed: {0}")]
    ThresholdDerivation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cloud model error: {0}")]
    Model(String),
}

/// Result type for fog detection operations
pub type FogResult<T> = Result<T, FogError>;
