use crate::core::anchor_selection::AnchorPixel;
use crate::types::{HOutput, SebalError, SebalResult, WeatherObservables, KELVIN_OFFSET};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Air density, kg/m³
pub const RHO_AIR: f64 = 1.15;

/// Specific heat of air at constant pressure, J/(kg·K)
pub const CP_AIR: f64 = 1004.0;

/// von Kármán constant
pub const VON_KARMAN: f64 = 0.41;

/// Gravitational acceleration, m/s²
pub const GRAVITY: f64 = 9.81;

/// Parameters for the stability-corrected sensible heat iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Hard cap on iterations per anchor calibration or pixel
    pub max_iterations: usize,
    /// Convergence threshold on the relative change of rah, in percent
    pub convergence_tolerance_percent: f64,
    /// Blending height where wind speed is assumed uniform (meters)
    pub blending_height: f64,
    /// Lower reference height above the zero-plane displacement (meters)
    pub z1: f64,
    /// Upper reference height above the zero-plane displacement (meters)
    pub z2: f64,
    /// Intercept of the ln(z0m) vs SAVI regression
    pub z0m_intercept: f64,
    /// Slope of the ln(z0m) vs SAVI regression
    pub z0m_slope: f64,
    /// Roughness length as a fraction of canopy height at the station
    pub z0m_canopy_ratio: f64,
    /// Smallest physically plausible aerodynamic resistance (s/m)
    pub min_rah: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance_percent: 0.01,
            blending_height: 200.0,
            z1: 0.1,
            z2: 2.0,
            z0m_intercept: -5.809,
            z0m_slope: 5.62,
            z0m_canopy_ratio: 0.12,
            min_rah: 1.0,
        }
    }
}

impl SolverParams {
    pub fn validate(&self) -> SebalResult<()> {
        if self.max_iterations == 0 {
            return Err(SebalError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.convergence_tolerance_percent.is_finite() && self.convergence_tolerance_percent > 0.0) {
            return Err(SebalError::InvalidConfiguration(format!(
                "convergence tolerance must be positive (got {})",
                self.convergence_tolerance_percent
            )));
        }
        if !(self.z1 > 0.0 && self.z2 > self.z1 && self.blending_height > self.z2) {
            return Err(SebalError::InvalidConfiguration(format!(
                "reference heights must satisfy 0 < z1 < z2 < blending height (got {}, {}, {})",
                self.z1, self.z2, self.blending_height
            )));
        }
        let coefficients = [self.z0m_intercept, self.z0m_slope, self.z0m_canopy_ratio];
        if coefficients.iter().any(|c| !c.is_finite()) || self.z0m_canopy_ratio <= 0.0 {
            return Err(SebalError::InvalidConfiguration(
                "roughness coefficients must be finite and the canopy ratio positive".to_string(),
            ));
        }
        if !(self.min_rah.is_finite() && self.min_rah > 0.0) {
            return Err(SebalError::InvalidConfiguration(format!(
                "min_rah must be positive (got {})",
                self.min_rah
            )));
        }
        Ok(())
    }
}

/// Momentum roughness length at the weather station
pub fn station_roughness(hc: f64, canopy_ratio: f64) -> f64 {
    hc * canopy_ratio
}

/// Friction velocity at the weather station from the log wind profile
pub fn friction_velocity(ux: f64, zx: f64, d: f64, z0m: f64) -> f64 {
    VON_KARMAN * ux / ((zx - d) / z0m).ln()
}

/// Wind speed at the blending height
pub fn blending_wind_speed(u_star: f64, d: f64, z0m: f64, blending_height: f64) -> f64 {
    (u_star * ((blending_height - d) / z0m).ln()) / VON_KARMAN
}

/// Pixel momentum roughness length from SAVI
pub fn surface_roughness(savi: f64, intercept: f64, slope: f64) -> f64 {
    (intercept + savi * slope).exp()
}

/// Pixel friction velocity, optionally stability corrected by `psi_m`
pub fn pixel_friction_velocity(u_blend: f64, d: f64, z0mxy: f64, blending_height: f64, psi_m: f64) -> f64 {
    (VON_KARMAN * u_blend) / (((blending_height - d) / z0mxy).ln() - psi_m)
}

/// Aerodynamic resistance to heat transport between z1 and z2
pub fn aerodynamic_resistance(z1: f64, z2: f64, psi_h_z1: f64, psi_h_z2: f64, u_star: f64) -> f64 {
    ((z2 / z1).ln() - psi_h_z2 + psi_h_z1) / (u_star * VON_KARMAN)
}

/// Monin-Obukhov length. Zero flux is neutral and reported as 0.
pub fn stability_length(u_star: f64, ts: f64, h: f64) -> f64 {
    if h == 0.0 {
        return 0.0;
    }
    -(RHO_AIR * CP_AIR * u_star.powi(3) * ts) / (VON_KARMAN * GRAVITY * h)
}

/// Stability correction for momentum transport at height `z`
pub fn psi_m(z: f64, l: f64) -> f64 {
    if l == 0.0 {
        return 0.0;
    }
    if l > 0.0 {
        return -5.0 * (z / l);
    }
    let y = (1.0 - 16.0 * (z / l)).powf(0.25);
    2.0 * ((1.0 + y) / 2.0).ln() + ((1.0 + y.powi(2)) / 2.0).ln() - 2.0 * y.atan() + 0.5 * PI
}

/// Stability correction for heat transport at height `z`
pub fn psi_h(z: f64, l: f64) -> f64 {
    if l == 0.0 {
        return 0.0;
    }
    if l > 0.0 {
        return -5.0 * (z / l);
    }
    let y = (1.0 - 16.0 * (z / l)).powf(0.25);
    2.0 * ((1.0 + y.powi(2)) / 2.0).ln()
}

/// Near-surface temperature difference that carries `Rn - G` as H
pub fn temperature_difference(rah: f64, rn: f64, g: f64) -> f64 {
    (rah * (rn - g)) / (RHO_AIR * CP_AIR)
}

/// H from the linear dT relation; `ts` in Kelvin
pub fn sensible_heat_flux(a: f64, b: f64, ts: f64, rah: f64) -> f64 {
    (RHO_AIR * CP_AIR) * (a + b * (ts - KELVIN_OFFSET)) / rah
}

fn relative_change_percent(previous: f64, current: f64) -> f64 {
    ((1.0 - previous / current) * 100.0).abs()
}

/// Neutral wind profile of a pixel, the starting point of its iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindProfile {
    pub z0m: f64,
    pub u_star: f64,
    pub u_blend: f64,
    pub z0mxy: f64,
    pub u_star_xy: f64,
    pub rah_xy: f64,
}

impl WindProfile {
    pub fn new(weather: &WeatherObservables, savi: f64, params: &SolverParams) -> Self {
        let z0m = station_roughness(weather.hc, params.z0m_canopy_ratio);
        let u_star = friction_velocity(weather.ux, weather.zx, weather.d, z0m);
        let u_blend = blending_wind_speed(u_star, weather.d, z0m, params.blending_height);
        let z0mxy = surface_roughness(savi, params.z0m_intercept, params.z0m_slope);
        let u_star_xy = pixel_friction_velocity(u_blend, weather.d, z0mxy, params.blending_height, 0.0);
        let rah_xy = aerodynamic_resistance(params.z1, params.z2, 0.0, 0.0, u_star_xy);
        Self {
            z0m,
            u_star,
            u_blend,
            z0mxy,
            u_star_xy,
            rah_xy,
        }
    }
}

/// Calibration series produced at the anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorCalibration {
    pub hot_ts: f64,
    pub cold_ts: f64,
    pub series: Vec<HOutput>,
}

impl AnchorCalibration {
    /// Final `(a, b)` pair
    pub fn coefficients(&self) -> Option<(f64, f64)> {
        self.series.last().map(|record| (record.a, record.b))
    }
}

/// Converged sensible heat flux of one pixel
#[derive(Debug, Clone, PartialEq)]
pub struct PixelHeatFlux {
    pub z0mxy: f64,
    pub records: Vec<HOutput>,
    pub h: f64,
}

/// Stability-corrected sensible heat flux solver
#[derive(Debug, Clone)]
pub struct SensibleHeatSolver {
    params: SolverParams,
}

impl SensibleHeatSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    fn stability_step(&self, profile: &WindProfile, d: f64, ts: f64, u_star: f64, h: f64) -> (f64, f64, f64) {
        let p = &self.params;
        let l = stability_length(u_star, ts, h);
        let u_star = pixel_friction_velocity(profile.u_blend, d, profile.z0mxy, p.blending_height, psi_m(p.blending_height, l));
        let rah = aerodynamic_resistance(p.z1, p.z2, psi_h(p.z1, l), psi_h(p.z2, l), u_star);
        (l, u_star, rah)
    }

    /// Reject states outside the physical domain, including a collapsed rah
    fn check_state(&self, iterations: usize, relative_change: f64, u_star: f64, rah: f64, h: f64) -> SebalResult<()> {
        let usable = |x: f64| x.is_finite() && x > 0.0;
        if usable(u_star) && usable(rah) && rah >= self.params.min_rah && h.is_finite() {
            Ok(())
        } else {
            log::debug!(
                "Stability iteration left the physical domain at step {} (u* = {}, rah = {}, H = {})",
                iterations, u_star, rah, h
            );
            Err(SebalError::NonConvergence { iterations, relative_change })
        }
    }

    /// Calibrate `dT = a + b·(Ts - 273.15)` at the anchors, iterating the
    /// hot pixel's stability correction until rah settles
    pub fn calibrate(&self, hot: &AnchorPixel, cold: &AnchorPixel) -> SebalResult<AnchorCalibration> {
        if !(hot.ts > cold.ts) {
            return Err(SebalError::AnchorSelection(format!(
                "hot anchor ({:.2} K) must be warmer than cold anchor ({:.2} K)",
                hot.ts, cold.ts
            )));
        }

        let profile = WindProfile::new(&hot.weather, hot.savi, &self.params);
        log::debug!("Hot anchor wind profile: {:?}", profile);

        let mut rah = profile.rah_xy;
        let mut u_star = profile.u_star_xy;
        let mut h = hot.rn - hot.g;
        let mut relative_change = f64::INFINITY;
        self.check_state(0, relative_change, u_star, rah, h)?;

        let mut series = Vec::new();
        for iteration in 1..=self.params.max_iterations {
            let (l, corrected_u_star, corrected_rah) = self.stability_step(&profile, hot.weather.d, hot.ts, u_star, h);

            let dt = temperature_difference(rah, hot.rn, hot.g);
            let b = dt / (hot.ts - cold.ts);
            let a = -b * (cold.ts - KELVIN_OFFSET);
            h = sensible_heat_flux(a, b, hot.ts, rah);

            relative_change = relative_change_percent(rah, corrected_rah);
            self.check_state(iteration, relative_change, corrected_u_star, corrected_rah, h)?;

            let record = HOutput { a, b, h, rah: corrected_rah, u_star: corrected_u_star, l };
            log::trace!("Anchor iteration {}: {:?}", iteration, record);
            series.push(record);

            u_star = corrected_u_star;
            rah = corrected_rah;
            if relative_change <= self.params.convergence_tolerance_percent {
                log::info!(
                    "Anchor calibration converged after {} iterations (a = {:.4}, b = {:.4}, H = {:.2} W/m²)",
                    iteration, a, b, h
                );
                return Ok(AnchorCalibration { hot_ts: hot.ts, cold_ts: cold.ts, series });
            }
        }

        Err(SebalError::NonConvergence {
            iterations: self.params.max_iterations,
            relative_change,
        })
    }

    /// Iterate one pixel's stability correction along the anchor series.
    ///
    /// Once the series is exhausted the final `(a, b)` is kept until the
    /// pixel's own rah settles.
    pub fn solve_pixel(
        &self,
        calibration: &AnchorCalibration,
        weather: &WeatherObservables,
        savi: f64,
        ts: f64,
    ) -> SebalResult<PixelHeatFlux> {
        let last = calibration.series.len().checked_sub(1).ok_or_else(|| {
            SebalError::Processing("anchor calibration series is empty".to_string())
        })?;

        let profile = WindProfile::new(weather, savi, &self.params);
        let mut rah = profile.rah_xy;
        let mut u_star = profile.u_star_xy;
        let mut relative_change = f64::INFINITY;
        self.check_state(0, relative_change, u_star, rah, 0.0)?;

        let mut records = Vec::new();
        for step in 0..self.params.max_iterations {
            let coefficients = &calibration.series[step.min(last)];
            let h = sensible_heat_flux(coefficients.a, coefficients.b, ts, rah);
            let (l, corrected_u_star, corrected_rah) = self.stability_step(&profile, weather.d, ts, u_star, h);

            relative_change = relative_change_percent(rah, corrected_rah);
            self.check_state(step + 1, relative_change, corrected_u_star, corrected_rah, h)?;

            records.push(HOutput {
                a: coefficients.a,
                b: coefficients.b,
                h,
                rah: corrected_rah,
                u_star: corrected_u_star,
                l,
            });

            u_star = corrected_u_star;
            rah = corrected_rah;
            if step >= last && relative_change <= self.params.convergence_tolerance_percent {
                return Ok(PixelHeatFlux { z0mxy: profile.z0mxy, records, h });
            }
        }

        Err(SebalError::NonConvergence {
            iterations: self.params.max_iterations,
            relative_change,
        })
    }
}
