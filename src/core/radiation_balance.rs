use crate::types::{
    ensure_finite, Pixel, RadiationOutput, RadiometricOutput, SebalResult, KELVIN_OFFSET,
};

/// Solar constant, W/m²
pub const SOLAR_CONSTANT: f64 = 1367.0;

/// Stefan-Boltzmann constant, W/(m²·K⁴)
pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;

/// Incoming shortwave radiation at the overpass
pub fn rs_down(cos_theta: f64, d: f64, tau_sw: f64) -> f64 {
    (SOLAR_CONSTANT * cos_theta * tau_sw) / d.powi(2)
}

/// Effective atmospheric emissivity
pub fn epsilon_a(tau_sw: f64) -> f64 {
    0.85 * (-tau_sw.ln()).powf(0.09)
}

/// Incoming longwave radiation; `ta` in Celsius
pub fn rl_down(epsilon_a: f64, ta: f64) -> f64 {
    epsilon_a * STEFAN_BOLTZMANN * (ta + KELVIN_OFFSET).powi(4)
}

/// Outgoing longwave radiation; `ts` in Kelvin
pub fn rl_up(epsilon_zero: f64, ts: f64) -> f64 {
    epsilon_zero * STEFAN_BOLTZMANN * ts.powi(4)
}

pub fn net_radiation(alpha: f64, rs_down: f64, rl_down: f64, rl_up: f64, epsilon_zero: f64) -> f64 {
    (1.0 - alpha) * rs_down + rl_down - rl_up - (1.0 - epsilon_zero) * rl_down
}

/// Soil heat flux.
///
/// Water (`NDVI < 0`) stores half of Rn. Otherwise the calibrated form with
/// the division by albedo outside the parenthesis is used as is.
pub fn soil_heat_flux(ts: f64, alpha: f64, ndvi: f64, rn: f64) -> f64 {
    if ndvi < 0.0 {
        return rn * 0.5;
    }
    ((ts - KELVIN_OFFSET) / alpha
        * (0.0038 * alpha + 0.0074 * alpha.powi(2))
        * (1.0 - 0.98 * ndvi.powi(4)))
        * rn
}

/// Net radiation and soil heat flux for one pixel
#[derive(Debug, Clone, Default)]
pub struct RadiationBalance;

impl RadiationBalance {
    pub fn new() -> Self {
        Self
    }

    /// `d` is the Earth-Sun distance used for the radiometric retrieval
    pub fn compute(
        &self,
        pixel: &Pixel,
        radiometry: &RadiometricOutput,
        d: f64,
    ) -> SebalResult<RadiationOutput> {
        let rs_down = ensure_finite("RSdown", rs_down(pixel.cos_theta, d, radiometry.tau_sw))?;
        let epsilon_a = ensure_finite("atmospheric emissivity", epsilon_a(radiometry.tau_sw))?;
        let rl_down = ensure_finite("RLdown", rl_down(epsilon_a, pixel.weather.ta))?;
        let rl_up = ensure_finite("RLup", rl_up(radiometry.epsilon_zero, radiometry.ts))?;

        let rn = ensure_finite(
            "Rn",
            net_radiation(radiometry.alpha, rs_down, rl_down, rl_up, radiometry.epsilon_zero),
        )?;
        let g = ensure_finite(
            "G",
            soil_heat_flux(radiometry.ts, radiometry.alpha, radiometry.ndvi, rn),
        )?;

        Ok(RadiationOutput {
            rs_down,
            epsilon_a,
            rl_down,
            rl_up,
            rn,
            g,
        })
    }
}
