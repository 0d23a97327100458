use crate::io::satellite::SatelliteConstants;
use crate::types::{
    ensure_finite, Pixel, RadiometricOutput, SebalError, SebalResult, BAND_COUNT, THERMAL_BAND,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Interpretation of the raw band values carried by a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadianceInput {
    /// 8-bit digital numbers, rescaled with LMin/LMax
    #[default]
    DigitalNumber,
    /// At-sensor spectral radiance, used as is
    Radiance,
}

/// Parameters for radiometric retrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiometryParams {
    pub radiance_input: RadianceInput,
    /// Earth-Sun distance in AU; computed from the day of year when unset
    pub earth_sun_distance: Option<f64>,
}

/// Day of year of an acquisition date
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Earth-Sun distance in AU from the inverse relative distance
/// `dr = 1 + 0.033·cos(2π·doy/365)`
pub fn earth_sun_distance(day_of_year: u32) -> f64 {
    let dr = 1.0 + 0.033 * (2.0 * PI * day_of_year as f64 / 365.0).cos();
    1.0 / dr.sqrt()
}

/// At-sensor spectral radiance from a digital number
pub fn spectral_radiance(l_min: f64, l_max: f64, dn: f64) -> f64 {
    l_min + ((l_max - l_min) / 255.0) * dn
}

/// Top-of-atmosphere reflectance
pub fn reflectance(radiance: f64, d: f64, esun: f64, cos_theta: f64) -> f64 {
    (PI * radiance * d.powi(2)) / (esun * cos_theta)
}

pub fn albedo_toa(rho: &[f64; BAND_COUNT]) -> f64 {
    0.298221 * rho[0]
        + 0.270098 * rho[1]
        + 0.230997 * rho[2]
        + 0.155051 * rho[3]
        + 0.033085 * rho[4]
        + 0.012548 * rho[6]
}

/// Broadband atmospheric transmissivity at elevation `z` (meters)
pub fn tau_sw(z: f64) -> f64 {
    0.75 + 2.0 * 0.00001 * z
}

/// Surface albedo; 0.03 is the path radiance albedo
pub fn surface_albedo(alpha_toa: f64, tau_sw: f64) -> f64 {
    (alpha_toa - 0.03) / tau_sw.powi(2)
}

pub fn ndvi(rho3: f64, rho4: f64) -> f64 {
    (rho4 - rho3) / (rho4 + rho3)
}

pub fn savi(rho3: f64, rho4: f64) -> f64 {
    let l = 0.1;
    (1.0 + l) * (rho4 - rho3) / (l + rho4 + rho3)
}

pub fn evi(rho1: f64, rho3: f64, rho4: f64) -> f64 {
    const G: f64 = 2.5;
    const C1: f64 = 6.0;
    const C2: f64 = 7.5;
    const L: f64 = 1.0;
    G * ((rho4 - rho3) / (rho4 + C1 * rho3 - C2 * rho1 + L))
}

/// Leaf area index from SAVI. Both thresholds are compared literally.
pub fn leaf_area_index(savi: f64) -> f64 {
    if savi == 0.69 {
        return 6.0;
    }
    if savi < 0.1 {
        return 0.0;
    }
    -((0.69 - savi) / 0.59).ln() / 0.91
}

pub fn narrow_band_emissivity(iaf: f64) -> f64 {
    if iaf >= 3.0 {
        return 0.98;
    }
    0.97 + 0.0033 * iaf
}

pub fn broad_band_emissivity(iaf: f64) -> f64 {
    if iaf >= 3.0 {
        return 0.98;
    }
    0.95 + 0.01 * iaf
}

/// Land-surface temperature (Kelvin) from band-6 radiance
pub fn surface_temperature(k1: f64, k2: f64, epsilon_nb: f64, radiance6: f64) -> f64 {
    k2 / ((epsilon_nb * k1 / radiance6) + 1.0).ln()
}

/// Per-pixel reflectance, indices, emissivities and surface temperature
#[derive(Debug, Clone)]
pub struct RadiometricRetrieval {
    params: RadiometryParams,
}

impl RadiometricRetrieval {
    pub fn new(params: RadiometryParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RadiometryParams {
        &self.params
    }

    /// Earth-Sun distance applying the configured override
    pub fn distance_for(&self, pixel: &Pixel) -> f64 {
        self.params
            .earth_sun_distance
            .unwrap_or_else(|| earth_sun_distance(pixel.day_of_year))
    }

    fn radiance(&self, satellite: &SatelliteConstants, pixel: &Pixel, band: usize) -> f64 {
        match self.params.radiance_input {
            RadianceInput::DigitalNumber => {
                let calibration = satellite.band(band);
                spectral_radiance(calibration.l_min, calibration.l_max, pixel.bands[band])
            }
            RadianceInput::Radiance => pixel.bands[band],
        }
    }

    pub fn retrieve(
        &self,
        pixel: &Pixel,
        satellite: &SatelliteConstants,
    ) -> SebalResult<RadiometricOutput> {
        let d = self.distance_for(pixel);

        let mut rho = [0.0; BAND_COUNT];
        for (band, value) in rho.iter_mut().enumerate() {
            if band == THERMAL_BAND {
                continue;
            }
            let radiance = self.radiance(satellite, pixel, band);
            *value = reflectance(radiance, d, satellite.band(band).esun, pixel.cos_theta);
        }
        ensure_finite("reflectance", rho.iter().sum())?;

        let alpha_toa = albedo_toa(&rho);
        let tau_sw = tau_sw(pixel.elevation);
        let alpha = ensure_finite("surface albedo", surface_albedo(alpha_toa, tau_sw))?;

        if rho[3] + rho[2] == 0.0 {
            return Err(SebalError::Domain {
                quantity: "NDVI",
                detail: "red + near-infrared reflectance is zero".to_string(),
            });
        }
        let ndvi = ensure_finite("NDVI", ndvi(rho[2], rho[3]))?;
        if !(-1.0..=1.0).contains(&ndvi) {
            return Err(SebalError::Domain {
                quantity: "NDVI",
                detail: format!(
                    "{:.4} outside [-1, 1] (red {:.5}, near-infrared {:.5})",
                    ndvi, rho[2], rho[3]
                ),
            });
        }
        let savi = ensure_finite("SAVI", savi(rho[2], rho[3]))?;
        let evi = ensure_finite("EVI", evi(rho[0], rho[2], rho[3]))?;
        let iaf = ensure_finite("IAF", leaf_area_index(savi))?;

        let epsilon_nb = narrow_band_emissivity(iaf);
        let epsilon_zero = broad_band_emissivity(iaf);

        let radiance6 = self.radiance(satellite, pixel, THERMAL_BAND);
        if radiance6 <= 0.0 {
            return Err(SebalError::Domain {
                quantity: "Ts",
                detail: format!("thermal radiance {} is not positive", radiance6),
            });
        }
        let ts = ensure_finite(
            "Ts",
            surface_temperature(satellite.k1, satellite.k2, epsilon_nb, radiance6),
        )?;

        Ok(RadiometricOutput {
            rho,
            alpha_toa,
            tau_sw,
            alpha,
            ndvi,
            savi,
            evi,
            iaf,
            epsilon_nb,
            epsilon_zero,
            ts,
        })
    }
}
