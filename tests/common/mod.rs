//! Synthetic Landsat 5 scene shared by the integration tests.
//!
//! Pixels are built backwards from target surface reflectances and
//! temperatures so the expected physics is known up front.
#![allow(dead_code)]

use sebal::core::radiation_balance::RadiationBalance;
use sebal::core::radiometry::{leaf_area_index, narrow_band_emissivity, savi, RadiometricRetrieval};
use sebal::types::THERMAL_BAND;
use sebal::{GeoLoc, Pixel, PixelStatus, ProcessedPixel, SatelliteConstants, SceneParams, WeatherObservables};
use std::f64::consts::PI;

pub const COS_THETA: f64 = 0.9;

/// Top-of-atmosphere reflectances per band; band 6 is ignored
pub const DENSE_CANOPY: [f64; 7] = [0.03, 0.05, 0.033, 0.30, 0.15, 0.0, 0.06];
pub const CROPLAND: [f64; 7] = [0.06, 0.08, 0.08, 0.25, 0.20, 0.0, 0.12];
pub const SPARSE_SHRUB: [f64; 7] = [0.09, 0.11, 0.12, 0.22, 0.25, 0.0, 0.18];
pub const BARE_SOIL: [f64; 7] = [0.12, 0.14, 0.16, 0.195, 0.30, 0.0, 0.25];
pub const OPEN_WATER: [f64; 7] = [0.05, 0.04, 0.03, 0.02, 0.01, 0.0, 0.005];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn satellite() -> SatelliteConstants {
    SatelliteConstants::landsat5_tm()
}

/// Defaults with the Earth-Sun distance pinned to 1 AU
pub fn scene_params() -> SceneParams {
    let mut params = SceneParams::default();
    params.radiometry.earth_sun_distance = Some(1.0);
    params
}

pub fn weather(ux: f64) -> WeatherObservables {
    WeatherObservables { ta: 30.0, ux, zx: 2.0, hc: 0.3, d: 0.2 }
}

/// Digital numbers that retrieve to `rho` and `ts` at d = 1 AU
pub fn surface_pixel(i: usize, j: usize, rho: [f64; 7], ts: f64) -> Pixel {
    let constants = satellite();
    let epsilon_nb = narrow_band_emissivity(leaf_area_index(savi(rho[2], rho[3])));

    let mut bands = [0.0; 7];
    for (band, dn) in bands.iter_mut().enumerate() {
        let calibration = constants.band(band);
        let radiance = if band == THERMAL_BAND {
            epsilon_nb * constants.k1 / ((constants.k2 / ts).exp() - 1.0)
        } else {
            rho[band] * calibration.esun * COS_THETA / PI
        };
        *dn = (radiance - calibration.l_min) * 255.0 / (calibration.l_max - calibration.l_min);
    }

    Pixel {
        geo_loc: GeoLoc::new(i, j, -7.2 - 0.001 * i as f64, -36.5 + 0.001 * j as f64),
        bands,
        cos_theta: COS_THETA,
        day_of_year: 180,
        elevation: 100.0,
        weather: weather(3.0),
        cloud_masked: false,
    }
}

/// One row running from dense canopy (NDVI ~0.8) to bare soil (NDVI ~0.1)
pub fn four_pixel_scene() -> Vec<Pixel> {
    vec![
        surface_pixel(0, 0, DENSE_CANOPY, 295.0),
        surface_pixel(0, 1, CROPLAND, 303.0),
        surface_pixel(0, 2, SPARSE_SHRUB, 309.0),
        surface_pixel(0, 3, BARE_SOIL, 315.0),
    ]
}

/// 3 x 4 scene:
///
/// | row | 0 | 1 | 2 | 3 |
/// |-----|---|---|---|---|
/// | 0 | canopy 295 K | cropland 303 K | shrub 309 K | bare soil 315 K |
/// | 1 | canopy 297 K | cropland 304 K | shrub 310 K | bare soil 313 K |
/// | 2 | water 293 K | cloud-masked canopy 288 K | calm cropland | negative thermal DN |
pub fn synthetic_scene() -> Vec<Pixel> {
    let mut pixels = vec![
        surface_pixel(0, 0, DENSE_CANOPY, 295.0),
        surface_pixel(0, 1, CROPLAND, 303.0),
        surface_pixel(0, 2, SPARSE_SHRUB, 309.0),
        surface_pixel(0, 3, BARE_SOIL, 315.0),
        surface_pixel(1, 0, [0.035, 0.055, 0.04, 0.29, 0.16, 0.0, 0.07], 297.0),
        surface_pixel(1, 1, [0.065, 0.085, 0.09, 0.24, 0.21, 0.0, 0.13], 304.0),
        surface_pixel(1, 2, [0.095, 0.115, 0.13, 0.215, 0.26, 0.0, 0.19], 310.0),
        surface_pixel(1, 3, [0.11, 0.13, 0.15, 0.19, 0.29, 0.0, 0.24], 313.0),
        surface_pixel(2, 0, OPEN_WATER, 293.0),
        surface_pixel(2, 1, DENSE_CANOPY, 288.0),
        surface_pixel(2, 2, CROPLAND, 303.0),
        surface_pixel(2, 3, CROPLAND, 303.0),
    ];
    pixels[9].cloud_masked = true;
    pixels[10].weather = weather(0.0);
    pixels[11].bands[THERMAL_BAND] = -50.0;
    pixels
}

/// Radiometry and radiation balance only, as seen by anchor selection
pub fn radiative_pixels(pixels: Vec<Pixel>) -> Vec<ProcessedPixel> {
    let retrieval = RadiometricRetrieval::new(scene_params().radiometry);
    let balance = RadiationBalance::new();
    let constants = satellite();

    pixels
        .into_iter()
        .map(|pixel| {
            let mut processed = ProcessedPixel::new(pixel);
            let result = retrieval.retrieve(&processed.pixel, &constants).and_then(|radiometry| {
                let d = retrieval.distance_for(&processed.pixel);
                let radiation = balance.compute(&processed.pixel, &radiometry, d)?;
                Ok((radiometry, radiation))
            });
            match result {
                Ok((radiometry, radiation)) => {
                    processed.output.radiometry = Some(radiometry);
                    processed.output.radiation = Some(radiation);
                    processed.output.status = PixelStatus::Valid;
                }
                Err(e) => processed.output.status = PixelStatus::from_error(&e),
            }
            processed
        })
        .collect()
}

pub fn find(pixels: &[ProcessedPixel], i: usize, j: usize) -> &ProcessedPixel {
    pixels
        .iter()
        .find(|p| p.pixel.geo_loc.i == i && p.pixel.geo_loc.j == j)
        .expect("pixel present in scene")
}
