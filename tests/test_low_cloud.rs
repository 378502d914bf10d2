use approx::assert_relative_eq;
use fogmask::core::{ArrayFilter, LowCloudConfig, UndefinedClusterPolicy};
use fogmask::types::{ClusterGrid, FogError, FogResult, Grid, GridValue, Mask, SceneData};
use fogmask::{CloudModel, CloudModelFactory, CloudModelInput, LowCloudFilter, SolveMethod};
use std::time::Duration;

/// Deterministic stand-in for the external 1-D low cloud model.
///
/// Cloud base = cth - lwp, fog base = cloud base - 50 m. Runs with a liquid
/// water path above `fail_above` abort like a non-converged solver, and
/// every run sleeps an input-dependent amount so completion order differs
/// from submission order.
struct StubModel {
    input: CloudModelInput,
    fail_above: GridValue,
}

impl CloudModel for StubModel {
    fn solve_cloud_base_height(
        &self,
        search_anchor: GridValue,
        method: SolveMethod,
    ) -> FogResult<GridValue> {
        assert_relative_eq!(search_anchor, -100.0);
        assert_eq!(method, SolveMethod::Basin);
        let jitter = (self.input.lwp as u64) % 23;
        std::thread::sleep(Duration::from_millis(jitter));
        if self.input.lwp > self.fail_above {
            return Err(FogError::Model("cloud base solver diverged".to_string()));
        }
        Ok(self.input.cth - self.input.lwp)
    }

    fn fog_base_height(&self) -> FogResult<GridValue> {
        Ok(self.input.cth - self.input.lwp - 50.0)
    }
}

struct StubFactory {
    fail_above: GridValue,
}

impl CloudModelFactory for StubFactory {
    fn build(&self, input: CloudModelInput) -> Box<dyn CloudModel + Send> {
        Box::new(StubModel {
            input,
            fail_above: self.fail_above,
        })
    }
}

/// 6x6 scene with four 2x2 clusters.
///
/// Cluster LWP means (kg m^-2): 1 -> 0.1, 2 -> 0.2, 3 -> 0.3,
/// 4 -> negative (never submitted to the model).
fn cluster_scene() -> SceneData {
    let shape = (6, 6);
    let mut clusters = ClusterGrid::from_elem(shape, 0);
    let mut lwp = Grid::from_elem(shape, 0.0);
    let mut elevation = Grid::from_elem(shape, 0.0);

    let blocks: [(u32, usize, usize, GridValue, GridValue); 4] = [
        // (label, row, col, lwp, elevation)
        (1, 0, 0, 0.1, 900.0),
        (2, 0, 4, 0.2, 100.0),
        (3, 4, 0, 0.3, 0.0),
        (4, 4, 4, -0.05, 0.0),
    ];
    for &(label, row, col, cluster_lwp, elev) in &blocks {
        for r in row..row + 2 {
            for c in col..col + 2 {
                clusters[[r, c]] = label;
                lwp[[r, c]] = cluster_lwp;
                elevation[[r, c]] = elev;
            }
        }
    }

    SceneData {
        lwp: Some(lwp),
        cth: Some(Grid::from_elem(shape, 1000.0)),
        ir108: Some(Grid::from_elem(shape, 270.0)),
        reff: Some(Grid::from_elem(shape, 5e-6)),
        elevation: Some(elevation),
        clusters: Some(clusters),
        ..SceneData::default()
    }
}

#[test]
fn evaluator_returns_one_result_per_submitted_cluster() {
    let scene = cluster_scene();
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 1e9 });
    let products = filter.evaluate().unwrap();

    // Clusters 1-3 submitted, cluster 4 has no physical water path
    assert_eq!(products.cluster_heights.len(), 3);

    // Heights keyed by label, independent of completion order; the model
    // sees the 0.88-corrected LWP in g m^-2
    let (cbh1, fbh1) = products.cluster_heights[&1];
    assert_relative_eq!(cbh1, 1000.0 - 0.1 * 1000.0 * 0.88, epsilon = 1e-3);
    assert_relative_eq!(fbh1, cbh1 - 50.0, epsilon = 1e-3);
    let (cbh2, _) = products.cluster_heights[&2];
    assert_relative_eq!(cbh2, 1000.0 - 0.2 * 1000.0 * 0.88, epsilon = 1e-3);
    let (cbh3, _) = products.cluster_heights[&3];
    assert_relative_eq!(cbh3, 1000.0 - 0.3 * 1000.0 * 0.88, epsilon = 1e-3);
}

#[test]
fn fog_base_against_terrain_separates_ground_fog_from_stratus() {
    let scene = cluster_scene();
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 1e9 });
    let products = filter.evaluate().unwrap();

    // Cluster 1: fog base 862 m, terrain 900 m -> ground fog, unmasked
    assert!(!products.mask[[0, 0]]);
    assert!(!products.mask[[1, 1]]);
    // Cluster 2: fog base 774 m, terrain 100 m -> elevated stratus, masked
    assert!(products.mask[[0, 4]]);
    assert!(products.mask[[1, 5]]);
    // Background stays untouched
    assert!(!products.mask[[3, 3]]);

    // Heights are broadcast to every cluster pixel
    assert_relative_eq!(products.fog_base_height[[0, 4]], 774.0, epsilon = 1e-3);
    assert_relative_eq!(products.fog_base_height[[1, 5]], 774.0, epsilon = 1e-3);
    assert!(products.cloud_base_height[[3, 3]].is_nan());
}

#[test]
fn model_failure_is_contained_to_its_cluster() {
    let scene = cluster_scene();
    // Cluster 3 (264 g m^-2 after correction) diverges
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 200.0 });
    let products = filter.evaluate().unwrap();

    assert_eq!(products.cluster_heights.len(), 3);
    let (cbh3, fbh3) = products.cluster_heights[&3];
    assert!(cbh3.is_nan() && fbh3.is_nan());
    assert!(products.fog_base_height[[4, 0]].is_nan());

    // Siblings are unaffected
    let (cbh1, _) = products.cluster_heights[&1];
    assert!(cbh1.is_finite());
    assert!(!products.mask[[0, 0]]);
}

#[test]
fn undefined_clusters_follow_the_configured_policy() {
    let scene = cluster_scene();

    // Conservative default: failed and unsubmitted clusters are excluded
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 200.0 });
    let products = filter.evaluate().unwrap();
    assert!(products.mask[[4, 0]]); // failed model
    assert!(products.mask[[4, 4]]); // no physical LWP

    // Optimistic policy keeps them in play
    let config = LowCloudConfig {
        undefined_policy: UndefinedClusterPolicy::Retain,
        ..LowCloudConfig::default()
    };
    let filter =
        LowCloudFilter::with_config(&scene, StubFactory { fail_above: 200.0 }, config);
    let products = filter.evaluate().unwrap();
    assert!(!products.mask[[4, 0]]);
    assert!(!products.mask[[4, 4]]);
}

#[test]
fn many_clusters_resolve_correctly_on_a_small_pool() {
    // 16 single-row clusters with distinct water paths and staggered model
    // runtimes, evaluated on two workers
    let shape = (16, 4);
    let mut clusters = ClusterGrid::from_elem(shape, 0);
    let mut lwp = Grid::from_elem(shape, 0.0);
    for row in 0..16 {
        let label = (row + 1) as u32;
        for col in 0..4 {
            clusters[[row, col]] = label;
            lwp[[row, col]] = 0.01 * (16 - row) as GridValue;
        }
    }
    let scene = SceneData {
        lwp: Some(lwp),
        cth: Some(Grid::from_elem(shape, 1000.0)),
        ir108: Some(Grid::from_elem(shape, 270.0)),
        reff: Some(Grid::from_elem(shape, 5e-6)),
        elevation: Some(Grid::from_elem(shape, 0.0)),
        clusters: Some(clusters),
        ..SceneData::default()
    };

    let config = LowCloudConfig {
        workers: 2,
        ..LowCloudConfig::default()
    };
    let filter = LowCloudFilter::with_config(&scene, StubFactory { fail_above: 1e9 }, config);
    let products = filter.evaluate().unwrap();

    assert_eq!(products.cluster_heights.len(), 16);
    for row in 0..16 {
        let label = (row + 1) as u32;
        let expected = 1000.0 - 0.01 * (16 - row) as GridValue * 1000.0 * 0.88;
        let (cbh, fbh) = products.cluster_heights[&label];
        assert_relative_eq!(cbh, expected, epsilon = 1e-2);
        assert_relative_eq!(fbh, expected - 50.0, epsilon = 1e-2);
    }
}

#[test]
fn low_cloud_filter_implements_the_filter_contract() {
    let scene = cluster_scene();
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 1e9 });
    let values = scene.ir108.clone().unwrap();
    let mut inmask = Mask::from_elem((6, 6), false);
    inmask[[3, 3]] = true;

    let result = filter.apply(&values, &inmask).unwrap();
    // Inbound mask is preserved and merged
    assert!(result.mask[[3, 3]]);
    assert!(result.mask[[0, 4]]);
    assert!(!result.mask[[0, 0]]);

    // Missing elevation makes the filter inapplicable
    let mut scene = cluster_scene();
    scene.elevation = None;
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 1e9 });
    let err = filter.apply(&values, &inmask).unwrap_err();
    assert!(matches!(err, FogError::Inapplicable { .. }));
}

#[test]
fn evaluate_rejects_grids_smaller_than_the_cluster_grid() {
    let mut scene = cluster_scene();
    scene.elevation = Some(Grid::from_elem((2, 2), 0.0));
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 1e9 });
    let err = filter.evaluate().unwrap_err();
    match err {
        FogError::ShapeMismatch { name, expected, actual } => {
            assert_eq!(name, "elevation");
            assert_eq!(expected, (6, 6));
            assert_eq!(actual, (2, 2));
        }
        other => panic!("expected shape mismatch, got {:?}", other),
    }
}

#[test]
fn cluster_four_is_never_submitted() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = cluster_scene();
    let filter = LowCloudFilter::new(&scene, StubFactory { fail_above: 1e9 });
    let products = filter.evaluate().unwrap();
    assert!(!products.cluster_heights.contains_key(&4));
    assert!(products.cloud_base_height[[4, 4]].is_nan());
    assert!(products.fog_base_height[[5, 5]].is_nan());
}
