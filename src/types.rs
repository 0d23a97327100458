use serde::{Deserialize, Serialize};

/// Number of reflective + thermal bands carried by a Landsat TM/ETM+ pixel
pub const BAND_COUNT: usize = 7;

/// Zero-based index of the thermal band (band 6)
pub const THERMAL_BAND: usize = 5;

/// Offset between Celsius and Kelvin
pub const KELVIN_OFFSET: f64 = 273.15;

/// Image position and geographic location of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLoc {
    pub i: usize,      // row
    pub j: usize,      // column
    pub lat: f64,      // degrees
    pub lon: f64,      // degrees
}

impl GeoLoc {
    pub fn new(i: usize, j: usize, lat: f64, lon: f64) -> Self {
        Self { i, j, lat, lon }
    }
}

/// Weather observables interpolated to a pixel by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservables {
    pub ta: f64,       // air temperature, Celsius
    pub ux: f64,       // wind speed at zx, m/s
    pub zx: f64,       // anemometer height, meters
    pub hc: f64,       // canopy height, meters
    pub d: f64,        // displacement height, meters
}

/// Input pixel as delivered by the product reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub geo_loc: GeoLoc,
    /// Raw band values; digital numbers unless configured as radiance
    pub bands: [f64; BAND_COUNT],
    pub cos_theta: f64,
    pub day_of_year: u32,
    pub elevation: f64,              // meters
    pub weather: WeatherObservables,
    /// Cloud/shadow flag from the upstream mask
    #[serde(default)]
    pub cloud_masked: bool,
}

impl Pixel {
    /// Reject records that cannot be processed at all
    pub fn validate(&self) -> SebalResult<()> {
        let w = &self.weather;
        let scalars = [
            ("cos_theta", self.cos_theta),
            ("elevation", self.elevation),
            ("lat", self.geo_loc.lat),
            ("lon", self.geo_loc.lon),
            ("ta", w.ta),
            ("ux", w.ux),
            ("zx", w.zx),
            ("hc", w.hc),
            ("d", w.d),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(SebalError::InvalidConfiguration(format!(
                    "pixel ({}, {}) has non-finite {}",
                    self.geo_loc.i, self.geo_loc.j, name
                )));
            }
        }
        if let Some(band) = self.bands.iter().position(|b| !b.is_finite()) {
            return Err(SebalError::InvalidConfiguration(format!(
                "pixel ({}, {}) has non-finite value in band {}",
                self.geo_loc.i,
                self.geo_loc.j,
                band + 1
            )));
        }
        if self.cos_theta <= 0.0 || self.cos_theta > 1.0 {
            return Err(SebalError::InvalidConfiguration(format!(
                "pixel ({}, {}) has cos_theta {} outside (0, 1]",
                self.geo_loc.i, self.geo_loc.j, self.cos_theta
            )));
        }
        if w.hc <= 0.0 || w.d < 0.0 || w.zx <= w.d || w.ux < 0.0 {
            return Err(SebalError::InvalidConfiguration(format!(
                "pixel ({}, {}) has inconsistent weather: ux {}, zx {}, hc {}, d {}",
                self.geo_loc.i, self.geo_loc.j, w.ux, w.zx, w.hc, w.d
            )));
        }
        if !(1..=366).contains(&self.day_of_year) {
            return Err(SebalError::InvalidConfiguration(format!(
                "pixel ({}, {}) has day of year {}",
                self.geo_loc.i, self.geo_loc.j, self.day_of_year
            )));
        }
        Ok(())
    }
}

/// Surface reflectance, indices, emissivities and temperature for one pixel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiometricOutput {
    pub rho: [f64; BAND_COUNT],  // band 6 left at 0
    pub alpha_toa: f64,
    pub tau_sw: f64,
    pub alpha: f64,
    pub ndvi: f64,
    pub savi: f64,
    pub evi: f64,
    pub iaf: f64,
    pub epsilon_nb: f64,
    pub epsilon_zero: f64,
    pub ts: f64,                 // Kelvin
}

/// Radiation terms of the instantaneous energy balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiationOutput {
    pub rs_down: f64,    // W/m²
    pub epsilon_a: f64,
    pub rl_down: f64,    // W/m²
    pub rl_up: f64,      // W/m²
    pub rn: f64,         // W/m²
    pub g: f64,          // W/m²
}

/// One iteration of the sensible heat flux calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HOutput {
    pub a: f64,
    pub b: f64,
    pub h: f64,          // W/m²
    pub rah: f64,        // s/m
    pub u_star: f64,     // m/s
    pub l: f64,          // Monin-Obukhov length, meters (0 = neutral)
}

/// Daily extrapolation of the instantaneous balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOutput {
    pub tau_24h: f64,
    pub rn_24h: f64,                 // W/m²
    pub evaporative_fraction: f64,
    pub le_24h: f64,                 // W/m²
    pub et_24h: f64,                 // mm/day
}

/// Processing state of a pixel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PixelStatus {
    /// Not processed yet
    #[default]
    Pending,
    /// Every stage run so far succeeded
    Valid,
    /// A domain error occurred; the pixel is skipped downstream
    Invalid { reason: String },
    /// The stability iteration did not converge
    NonConverged { iterations: usize, reason: String },
}

impl PixelStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, PixelStatus::Valid)
    }

    /// Status recorded for a failed per-pixel stage
    pub fn from_error(error: &SebalError) -> Self {
        match error {
            SebalError::NonConvergence { iterations, .. } => PixelStatus::NonConverged {
                iterations: *iterations,
                reason: error.to_string(),
            },
            _ => PixelStatus::Invalid {
                reason: error.to_string(),
            },
        }
    }
}

/// Output record built up stage by stage for one pixel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelOutput {
    pub status: PixelStatus,
    pub radiometry: Option<RadiometricOutput>,
    pub radiation: Option<RadiationOutput>,
    pub z0mxy: Option<f64>,
    pub h_outputs: Vec<HOutput>,
    pub h: Option<f64>,
    pub lambda_e: Option<f64>,
    pub daily: Option<DailyOutput>,
}

impl PixelOutput {
    /// Attach the iteration history; the last record becomes `H`
    pub fn set_h_outputs(&mut self, records: Vec<HOutput>) -> SebalResult<f64> {
        let h = records
            .last()
            .map(|record| record.h)
            .ok_or_else(|| SebalError::Processing("empty H iteration history".to_string()))?;
        self.h_outputs = records;
        self.h = Some(h);
        Ok(h)
    }

    /// λE = Rn - G - H; requires Rn, G and H to be set
    pub fn compute_lambda_e(&mut self) -> SebalResult<f64> {
        let radiation = self
            .radiation
            .as_ref()
            .ok_or_else(|| SebalError::Processing("Rn and G are not set".to_string()))?;
        let h = self
            .h
            .ok_or_else(|| SebalError::Processing("H is not set".to_string()))?;
        let lambda_e = radiation.rn - radiation.g - h;
        self.lambda_e = Some(lambda_e);
        Ok(lambda_e)
    }

    /// First iteration record ("initial" estimate)
    pub fn initial_h(&self) -> Option<&HOutput> {
        self.h_outputs.first()
    }

    /// Last iteration record ("final" estimate)
    pub fn final_h(&self) -> Option<&HOutput> {
        self.h_outputs.last()
    }

    pub fn ts(&self) -> Option<f64> {
        self.radiometry.as_ref().map(|r| r.ts)
    }

    pub fn ndvi(&self) -> Option<f64> {
        self.radiometry.as_ref().map(|r| r.ndvi)
    }

    pub fn rn(&self) -> Option<f64> {
        self.radiation.as_ref().map(|r| r.rn)
    }

    pub fn g(&self) -> Option<f64> {
        self.radiation.as_ref().map(|r| r.g)
    }

    /// Record a failed stage
    pub(crate) fn fail(&mut self, error: &SebalError) {
        log::warn!("Pixel excluded: {}", error);
        self.status = PixelStatus::from_error(error);
    }
}

/// A pixel paired with the output the pipeline attached to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPixel {
    pub pixel: Pixel,
    pub output: PixelOutput,
}

impl ProcessedPixel {
    pub fn new(pixel: Pixel) -> Self {
        Self {
            pixel,
            output: PixelOutput::default(),
        }
    }
}

/// Role of a calibration anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorRole {
    Hot,
    Cold,
}

impl std::fmt::Display for AnchorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorRole::Hot => write!(f, "hot"),
            AnchorRole::Cold => write!(f, "cold"),
        }
    }
}

/// Error types for SEBAL processing
#[derive(Debug, thiserror::Error)]
pub enum SebalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Domain error in {quantity}: {detail}")]
    Domain { quantity: &'static str, detail: String },

    #[error("No convergence after {iterations} iterations (last relative change {relative_change:.4}%)")]
    NonConvergence { iterations: usize, relative_change: f64 },

    #[error("Anchor selection failed: {0}")]
    AnchorSelection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Processing cancelled")]
    Cancelled,
}

/// Result type for SEBAL operations
pub type SebalResult<T> = Result<T, SebalError>;

/// Pass `value` through, or report the quantity as a domain error
pub(crate) fn ensure_finite(quantity: &'static str, value: f64) -> SebalResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SebalError::Domain {
            quantity,
            detail: format!("evaluated to {}", value),
        })
    }
}
