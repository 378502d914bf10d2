//! Solar geometry for daytime filter thresholds.

use crate::types::{Grid, GridValue};
use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::Zip;

/// Solar zenith angle in degrees for one pixel.
///
/// Uses the NOAA low-accuracy solar position formulas (fractional year,
/// declination and equation of time as truncated Fourier series), which is
/// sufficient for threshold lookup purposes.
pub fn sun_zenith_angle(time: DateTime<Utc>, lon: GridValue, lat: GridValue) -> GridValue {
    let doy = time.ordinal() as f64;
    let hour = time.hour() as f64
        + time.minute() as f64 / 60.0
        + time.second() as f64 / 3600.0;

    // Fractional year in radians
    let gamma = 2.0 * std::f64::consts::PI / 365.0 * (doy - 1.0 + (hour - 12.0) / 24.0);

    // Solar declination in radians
    let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    // Equation of time in minutes
    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    // True solar time in minutes, longitude east positive
    let tst = hour * 60.0 + eqtime + 4.0 * lon as f64;
    let ha = (tst / 4.0 - 180.0).to_radians();

    let lat_rad = (lat as f64).to_radians();
    let cos_zenith = lat_rad.sin() * decl.sin() + lat_rad.cos() * decl.cos() * ha.cos();
    cos_zenith.clamp(-1.0, 1.0).acos().to_degrees() as GridValue
}

/// Solar zenith angle grid for a whole scene.
pub fn sun_zenith_angle_grid(time: DateTime<Utc>, lon: &Grid, lat: &Grid) -> Grid {
    Zip::from(lon)
        .and(lat)
        .map_collect(|&lon, &lat| sun_zenith_angle(time, lon, lat))
}
