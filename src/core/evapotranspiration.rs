use crate::types::{ensure_finite, DailyOutput, PixelOutput, SebalError, SebalResult, KELVIN_OFFSET};
use serde::{Deserialize, Serialize};

/// Seconds in a day
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Daily extrapolation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvapotranspirationParams {
    /// Daily atmospheric transmissivity; the pixel's τsw when unset
    pub tau_24h: Option<f64>,
}

impl EvapotranspirationParams {
    pub fn validate(&self) -> SebalResult<()> {
        match self.tau_24h {
            Some(tau) if !(tau.is_finite() && tau > 0.0 && tau <= 1.0) => Err(
                SebalError::InvalidConfiguration(format!("daily transmissivity {} outside (0, 1]", tau)),
            ),
            _ => Ok(()),
        }
    }
}

/// Fraction of the available energy consumed by evaporation
pub fn evaporative_fraction(lambda_e: f64, rn: f64, g: f64) -> SebalResult<f64> {
    let available = rn - g;
    if available == 0.0 {
        return Err(SebalError::Domain {
            quantity: "EF",
            detail: "available energy Rn - G is zero".to_string(),
        });
    }
    ensure_finite("EF", lambda_e / available)
}

/// Daily net radiation, W/m²
pub fn net_radiation_24h(alpha: f64, rs_down: f64, tau_24h: f64) -> f64 {
    (1.0 - alpha) * rs_down - 100.0 * tau_24h
}

/// Latent heat of vaporisation at surface temperature `ts` (Kelvin), J/kg
pub fn latent_heat_of_vaporization(ts: f64) -> f64 {
    (2.501 - 0.002361 * (ts - KELVIN_OFFSET)) * 1e6
}

/// Daily evapotranspiration in mm/day
pub fn daily_evapotranspiration(evaporative_fraction: f64, rn_24h: f64, lambda_v: f64) -> f64 {
    (SECONDS_PER_DAY * evaporative_fraction * rn_24h) / lambda_v
}

#[derive(Debug, Clone, Default)]
pub struct EvapotranspirationExtrapolator {
    params: EvapotranspirationParams,
}

impl EvapotranspirationExtrapolator {
    pub fn new(params: EvapotranspirationParams) -> Self {
        Self { params }
    }

    /// Extrapolate a pixel whose λE has been computed
    pub fn extrapolate(&self, output: &PixelOutput) -> SebalResult<DailyOutput> {
        let missing = |what: &str| SebalError::Processing(format!("{} is not available for the daily extrapolation", what));
        let radiometry = output.radiometry.as_ref().ok_or_else(|| missing("radiometry"))?;
        let radiation = output.radiation.as_ref().ok_or_else(|| missing("radiation balance"))?;
        let lambda_e = output.lambda_e.ok_or_else(|| missing("λE"))?;

        let tau_24h = self.params.tau_24h.unwrap_or(radiometry.tau_sw);
        let evaporative_fraction = evaporative_fraction(lambda_e, radiation.rn, radiation.g)?;
        let rn_24h = ensure_finite("Rn24h", net_radiation_24h(radiometry.alpha, radiation.rs_down, tau_24h))?;
        let lambda_v = latent_heat_of_vaporization(radiometry.ts);
        let et_24h = ensure_finite("ET24h", daily_evapotranspiration(evaporative_fraction, rn_24h, lambda_v))?;

        Ok(DailyOutput {
            tau_24h,
            rn_24h,
            evaporative_fraction,
            le_24h: evaporative_fraction * rn_24h,
            et_24h,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RadiationOutput, RadiometricOutput};
    use approx::assert_relative_eq;

    fn output(lambda_e: Option<f64>) -> PixelOutput {
        PixelOutput {
            radiometry: Some(RadiometricOutput {
                rho: [0.0; 7],
                alpha_toa: 0.2,
                tau_sw: 0.752,
                alpha: 0.15,
                ndvi: 0.5,
                savi: 0.42,
                evi: 0.5,
                iaf: 1.2,
                epsilon_nb: 0.98,
                epsilon_zero: 0.98,
                ts: 303.15,
            }),
            radiation: Some(RadiationOutput {
                rs_down: 900.0,
                epsilon_a: 0.8,
                rl_down: 380.0,
                rl_up: 470.0,
                rn: 600.0,
                g: 100.0,
            }),
            lambda_e,
            ..PixelOutput::default()
        }
    }

    #[test]
    fn test_evaporative_fraction() {
        assert_relative_eq!(evaporative_fraction(250.0, 600.0, 100.0).unwrap(), 0.5);
        assert!(matches!(
            evaporative_fraction(10.0, 100.0, 100.0),
            Err(SebalError::Domain { quantity: "EF", .. })
        ));
    }

    #[test]
    fn test_latent_heat_at_thirty_degrees() {
        assert_relative_eq!(latent_heat_of_vaporization(303.15), 2.43017e6, max_relative = 1e-9);
    }

    #[test]
    fn test_extrapolate_uses_pixel_transmissivity() {
        let daily = EvapotranspirationExtrapolator::default()
            .extrapolate(&output(Some(250.0)))
            .unwrap();

        let rn_24h = 0.85 * 900.0 - 100.0 * 0.752;
        assert_eq!(daily.tau_24h, 0.752);
        assert_relative_eq!(daily.rn_24h, rn_24h, epsilon = 1e-9);
        assert_relative_eq!(daily.le_24h, 0.5 * rn_24h, epsilon = 1e-9);
        assert_relative_eq!(daily.et_24h, 86400.0 * 0.5 * rn_24h / 2.43017e6, max_relative = 1e-9);
    }

    #[test]
    fn test_extrapolate_with_configured_transmissivity() {
        let params = EvapotranspirationParams { tau_24h: Some(0.6) };
        let daily = EvapotranspirationExtrapolator::new(params)
            .extrapolate(&output(Some(250.0)))
            .unwrap();
        assert_relative_eq!(daily.rn_24h, 0.85 * 900.0 - 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extrapolate_requires_lambda_e() {
        let err = EvapotranspirationExtrapolator::default()
            .extrapolate(&output(None))
            .unwrap_err();
        assert!(matches!(err, SebalError::Processing(_)));
    }

    #[test]
    fn test_params_validation() {
        assert!(EvapotranspirationParams::default().validate().is_ok());
        assert!(EvapotranspirationParams { tau_24h: Some(1.5) }.validate().is_err());
    }
}
