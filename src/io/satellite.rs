use crate::types::{SebalError, SebalResult, BAND_COUNT, THERMAL_BAND};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Radiometric rescaling and solar irradiance of one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandCalibration {
    pub l_min: f64,      // W/(m²·sr·µm)
    pub l_max: f64,      // W/(m²·sr·µm)
    pub esun: f64,       // W/(m²·µm), unused for the thermal band
}

/// Sensors whose irradiance tables share the legacy JSON layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensor {
    Landsat5,
    Landsat7,
    Landsat8,
}

impl Sensor {
    /// Column holding ESUN in a legacy `"band<N>"` array
    fn esun_column(self) -> usize {
        match self {
            Sensor::Landsat5 => 7,
            Sensor::Landsat7 => 9,
            Sensor::Landsat8 => 11,
        }
    }
}

/// Per-scene calibration constants shared by every pixel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteConstants {
    pub name: String,
    pub bands: [BandCalibration; BAND_COUNT],
    pub k1: f64,         // W/(m²·sr·µm)
    pub k2: f64,         // Kelvin
}

impl SatelliteConstants {
    /// Landsat 5 TM post-2003 rescaling and Chander & Markham irradiances
    pub fn landsat5_tm() -> Self {
        let band = |l_min, l_max, esun| BandCalibration { l_min, l_max, esun };
        Self {
            name: "landsat5".to_string(),
            bands: [
                band(-1.52, 193.0, 1957.0),
                band(-2.84, 365.0, 1826.0),
                band(-1.17, 264.0, 1554.0),
                band(-1.51, 221.0, 1036.0),
                band(-0.37, 30.2, 215.0),
                band(1.2378, 15.303, 0.0),
                band(-0.15, 16.5, 80.67),
            ],
            k1: 607.76,
            k2: 1260.56,
        }
    }

    pub fn band(&self, band: usize) -> &BandCalibration {
        &self.bands[band]
    }

    /// Parse either the serde representation or the legacy sensor table
    pub fn from_json_str(json: &str, sensor: Sensor) -> SebalResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let constants = if value.get("bands").is_some() {
            serde_json::from_value(value)?
        } else {
            Self::from_legacy_value(&value, sensor)?
        };
        constants.validate()?;
        Ok(constants)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P, sensor: Sensor) -> SebalResult<Self> {
        log::info!("Reading satellite constants: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content, sensor)
    }

    /// Legacy layout: `"band<N>"` arrays with LMin at 3, LMax at 4 and one
    /// ESUN column per sensor, plus top-level `k1` and `k2`
    fn from_legacy_value(value: &Value, sensor: Sensor) -> SebalResult<Self> {
        let number = |key: &str| -> SebalResult<f64> {
            value.get(key).and_then(Value::as_f64).ok_or_else(|| {
                SebalError::InvalidConfiguration(format!("missing numeric field '{}'", key))
            })
        };

        let mut bands = [BandCalibration { l_min: 0.0, l_max: 0.0, esun: 0.0 }; BAND_COUNT];
        for (index, calibration) in bands.iter_mut().enumerate() {
            let key = format!("band{}", index + 1);
            let row = value.get(&key).and_then(Value::as_array).ok_or_else(|| {
                SebalError::InvalidConfiguration(format!("missing array '{}'", key))
            })?;
            let column = |col: usize| row.get(col).and_then(Value::as_f64);

            calibration.l_min = column(3).ok_or_else(|| {
                SebalError::InvalidConfiguration(format!("'{}' has no LMin", key))
            })?;
            calibration.l_max = column(4).ok_or_else(|| {
                SebalError::InvalidConfiguration(format!("'{}' has no LMax", key))
            })?;
            calibration.esun = match column(sensor.esun_column()) {
                Some(esun) => esun,
                None if index == THERMAL_BAND => 0.0,
                None => {
                    return Err(SebalError::InvalidConfiguration(format!(
                        "'{}' has no ESUN for {:?}",
                        key, sensor
                    )))
                }
            };
        }

        Ok(Self {
            name: format!("{:?}", sensor).to_lowercase(),
            bands,
            k1: number("k1")?,
            k2: number("k2")?,
        })
    }

    pub fn validate(&self) -> SebalResult<()> {
        for (index, band) in self.bands.iter().enumerate() {
            if !band.l_min.is_finite() || !band.l_max.is_finite() || band.l_max <= band.l_min {
                return Err(SebalError::InvalidConfiguration(format!(
                    "band {} needs finite LMin < LMax (got {} and {})",
                    index + 1,
                    band.l_min,
                    band.l_max
                )));
            }
            if index != THERMAL_BAND && !(band.esun.is_finite() && band.esun > 0.0) {
                return Err(SebalError::InvalidConfiguration(format!(
                    "band {} needs positive ESUN (got {})",
                    index + 1,
                    band.esun
                )));
            }
        }
        if !(self.k1.is_finite() && self.k1 > 0.0) || !(self.k2.is_finite() && self.k2 > 0.0) {
            return Err(SebalError::InvalidConfiguration(format!(
                "thermal constants must be positive (K1 = {}, K2 = {})",
                self.k1, self.k2
            )));
        }
        Ok(())
    }
}
