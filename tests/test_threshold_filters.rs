use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use fogmask::core::{cirrus_threshold, sun_zenith_angle, ArrayFilter};
use fogmask::types::{Grid, Mask, SceneData};
use fogmask::{CirrusCloudFilter, CloudPhysicsFilter, IceCloudFilter, SnowFilter, WaterCloudFilter};
use ndarray::Array2;

fn empty_mask(shape: (usize, usize)) -> Mask {
    Mask::from_elem(shape, false)
}

#[test]
fn snow_pixel_is_masked_when_all_three_criteria_hold() {
    let shape = (1, 3);
    let mut scene = SceneData {
        // NDSI = (30 - 10) / (30 + 10) = 0.5
        vis006: Some(Grid::from_elem(shape, 30.0)),
        nir016: Some(Grid::from_elem(shape, 10.0)),
        // 20 % reflectance = 0.2 proxy
        vis008: Some(Grid::from_elem(shape, 20.0)),
        ir108: Some(Grid::from_elem(shape, 260.0)),
        ..SceneData::default()
    };
    // Pixel 1 too cold for snow, pixel 2 too dark
    scene.ir108.as_mut().unwrap()[[0, 1]] = 250.0;
    scene.vis008.as_mut().unwrap()[[0, 2]] = 5.0;

    let values = scene.ir108.clone().unwrap();
    let result = SnowFilter::new(&scene)
        .apply(&values, &empty_mask(shape))
        .unwrap();
    assert!(result.mask[[0, 0]]);
    assert!(!result.mask[[0, 1]]);
    assert!(!result.mask[[0, 2]]);
}

#[test]
fn ice_phase_tests_are_individually_sufficient() {
    let shape = (1, 3);
    let mut scene = SceneData {
        ir087: Some(Grid::from_elem(shape, 265.0)),
        ir108: Some(Grid::from_elem(shape, 260.0)),
        ir120: Some(Grid::from_elem(shape, 269.0)),
        ..SceneData::default()
    };
    // Pixel 0: phase difference 4 K, warm -> liquid water, kept
    // Pixel 1: phase difference below 2.5 K -> ice
    scene.ir120.as_mut().unwrap()[[0, 1]] = 266.0;
    // Pixel 2: very cold 10.8 um alone -> ice
    scene.ir108.as_mut().unwrap()[[0, 2]] = 245.0;

    let values = scene.ir108.clone().unwrap();
    let result = IceCloudFilter::new(&scene)
        .apply(&values, &empty_mask(shape))
        .unwrap();
    assert!(!result.mask[[0, 0]]);
    assert!(result.mask[[0, 1]]);
    assert!(result.mask[[0, 2]]);
}

#[test]
fn cirrus_lut_returns_tabulated_values_for_exact_keys() {
    assert_relative_eq!(cirrus_threshold(1.0, 260.0), 0.55);
    assert_relative_eq!(cirrus_threshold(2.0, 310.0), 13.39);
    assert_relative_eq!(cirrus_threshold(1.5, 280.0), 1.88);
}

#[test]
fn cirrus_lut_snaps_to_nearest_key_per_axis() {
    // 1.1 is nearer to 1.0 than 1.25, 262 K nearer to 260 K
    assert_relative_eq!(cirrus_threshold(1.1, 262.0), 0.55);
    // 1.13 is nearer to 1.25, 284 K nearer to 280 K
    assert_relative_eq!(cirrus_threshold(1.13, 284.0), 1.61);
}

#[test]
fn cirrus_filter_combines_split_window_and_strong_test() {
    let shape = (1, 3);
    let mut scene = SceneData {
        ir087: Some(Grid::from_elem(shape, 255.0)),
        ir108: Some(Grid::from_elem(shape, 260.0)),
        ir120: Some(Grid::from_elem(shape, 259.7)),
        // Subsolar point at the equinox: secant of zenith snaps to 1.0
        lat: Some(Grid::from_elem(shape, 0.0)),
        lon: Some(Grid::from_elem(shape, 0.0)),
        time: Some(Utc.with_ymd_and_hms(2020, 3, 20, 12, 0, 0).unwrap()),
        ..SceneData::default()
    };
    // Pixel 1: split-window difference 1.0 K above the 0.55 K threshold
    scene.ir120.as_mut().unwrap()[[0, 1]] = 259.0;
    // Pixel 2: strong cirrus signal at 8.7 um
    scene.ir087.as_mut().unwrap()[[0, 2]] = 261.0;

    let values = scene.ir108.clone().unwrap();
    let result = CirrusCloudFilter::new(&scene)
        .apply(&values, &empty_mask(shape))
        .unwrap();
    // Pixel 0: split-window difference 0.3 K stays below threshold
    assert!(!result.mask[[0, 0]]);
    assert!(result.mask[[0, 1]]);
    assert!(result.mask[[0, 2]]);
}

#[test]
fn solar_zenith_is_small_at_the_equinox_subsolar_point() {
    let time = Utc.with_ymd_and_hms(2020, 3, 20, 12, 0, 0).unwrap();
    let sza = sun_zenith_angle(time, 0.0, 0.0);
    assert!(sza < 5.0, "subsolar zenith angle was {}", sza);

    // Local midnight on the opposite meridian
    let night = sun_zenith_angle(time, 180.0, 0.0);
    assert!(night > 90.0, "midnight zenith angle was {}", night);
}

#[test]
fn implausible_microphysics_is_masked() {
    let shape = (1, 3);
    let mut scene = SceneData {
        cot: Some(Grid::from_elem(shape, 10.0)),
        reff: Some(Grid::from_elem(shape, 8e-6)),
        ..SceneData::default()
    };
    scene.cot.as_mut().unwrap()[[0, 1]] = 31.0;
    scene.reff.as_mut().unwrap()[[0, 2]] = 25e-6;

    let values = Grid::from_elem(shape, 0.0);
    let result = CloudPhysicsFilter::new(&scene)
        .apply(&values, &empty_mask(shape))
        .unwrap();
    assert!(!result.mask[[0, 0]]);
    assert!(result.mask[[0, 1]]);
    assert!(result.mask[[0, 2]]);
}

#[test]
fn water_filter_flags_phase_and_droplet_proxy() {
    let shape = (2, 4);
    let ir039 = Array2::from_shape_vec(
        shape,
        vec![280.0, 282.0, 285.0, 279.0, 283.0, 280.0, 281.0, 282.0],
    )
    .unwrap();
    let cloud_mask = Array2::from_shape_vec(
        shape,
        vec![false, false, true, true, true, true, true, true],
    )
    .unwrap();
    let mut vis006 = Grid::from_elem(shape, 10.0);
    // NDSI 0.2 at this pixel flags non-water phase
    vis006[[1, 1]] = 15.0;

    let scene = SceneData {
        vis006: Some(vis006),
        nir016: Some(Grid::from_elem(shape, 10.0)),
        ir039: Some(ir039),
        cloud_mask: Some(cloud_mask),
        ..SceneData::default()
    };

    let values = scene.ir039.clone().unwrap();
    let result = WaterCloudFilter::new(&scene)
        .apply(&values, &empty_mask(shape))
        .unwrap();

    // Row 0 cloud-free mean is 281 K: only the 285 K cloudy pixel exceeds it
    assert!(!result.mask[[0, 0]]);
    assert!(!result.mask[[0, 1]]);
    assert!(result.mask[[0, 2]]);
    assert!(!result.mask[[0, 3]]);
    // Row 1 has no cloud-free pixels and falls back to the global mean
    assert!(result.mask[[1, 0]]);
    assert!(result.mask[[1, 1]]); // phase test
    assert!(!result.mask[[1, 2]]);
    assert!(result.mask[[1, 3]]);
}
