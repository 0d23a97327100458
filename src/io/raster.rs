use crate::types::{PixelOutput, ProcessedPixel, SebalError, SebalResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scalar output that can be laid out as an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputField {
    AlphaToa,
    TauSw,
    Alpha,
    Ndvi,
    Savi,
    Evi,
    Iaf,
    EpsilonNb,
    EpsilonZero,
    Ts,
    RsDown,
    RlDown,
    RlUp,
    Rn,
    G,
    Z0mxy,
    H,
    LambdaE,
    Rn24h,
    EvaporativeFraction,
    Le24h,
    Et24h,
}

impl OutputField {
    pub const ALL: [OutputField; 22] = [
        OutputField::AlphaToa,
        OutputField::TauSw,
        OutputField::Alpha,
        OutputField::Ndvi,
        OutputField::Savi,
        OutputField::Evi,
        OutputField::Iaf,
        OutputField::EpsilonNb,
        OutputField::EpsilonZero,
        OutputField::Ts,
        OutputField::RsDown,
        OutputField::RlDown,
        OutputField::RlUp,
        OutputField::Rn,
        OutputField::G,
        OutputField::Z0mxy,
        OutputField::H,
        OutputField::LambdaE,
        OutputField::Rn24h,
        OutputField::EvaporativeFraction,
        OutputField::Le24h,
        OutputField::Et24h,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputField::AlphaToa => "alpha_toa",
            OutputField::TauSw => "tau_sw",
            OutputField::Alpha => "alpha",
            OutputField::Ndvi => "ndvi",
            OutputField::Savi => "savi",
            OutputField::Evi => "evi",
            OutputField::Iaf => "iaf",
            OutputField::EpsilonNb => "epsilon_nb",
            OutputField::EpsilonZero => "epsilon_zero",
            OutputField::Ts => "ts",
            OutputField::RsDown => "rs_down",
            OutputField::RlDown => "rl_down",
            OutputField::RlUp => "rl_up",
            OutputField::Rn => "rn",
            OutputField::G => "g",
            OutputField::Z0mxy => "z0mxy",
            OutputField::H => "h",
            OutputField::LambdaE => "lambda_e",
            OutputField::Rn24h => "rn_24h",
            OutputField::EvaporativeFraction => "evaporative_fraction",
            OutputField::Le24h => "le_24h",
            OutputField::Et24h => "et_24h",
        }
    }

    /// Value of this field in `output`, if that stage has run
    pub fn value(self, output: &PixelOutput) -> Option<f64> {
        let radiometry = output.radiometry.as_ref();
        let radiation = output.radiation.as_ref();
        let daily = output.daily.as_ref();
        match self {
            OutputField::AlphaToa => radiometry.map(|r| r.alpha_toa),
            OutputField::TauSw => radiometry.map(|r| r.tau_sw),
            OutputField::Alpha => radiometry.map(|r| r.alpha),
            OutputField::Ndvi => radiometry.map(|r| r.ndvi),
            OutputField::Savi => radiometry.map(|r| r.savi),
            OutputField::Evi => radiometry.map(|r| r.evi),
            OutputField::Iaf => radiometry.map(|r| r.iaf),
            OutputField::EpsilonNb => radiometry.map(|r| r.epsilon_nb),
            OutputField::EpsilonZero => radiometry.map(|r| r.epsilon_zero),
            OutputField::Ts => radiometry.map(|r| r.ts),
            OutputField::RsDown => radiation.map(|r| r.rs_down),
            OutputField::RlDown => radiation.map(|r| r.rl_down),
            OutputField::RlUp => radiation.map(|r| r.rl_up),
            OutputField::Rn => radiation.map(|r| r.rn),
            OutputField::G => radiation.map(|r| r.g),
            OutputField::Z0mxy => output.z0mxy,
            OutputField::H => output.h,
            OutputField::LambdaE => output.lambda_e,
            OutputField::Rn24h => daily.map(|d| d.rn_24h),
            OutputField::EvaporativeFraction => daily.map(|d| d.evaporative_fraction),
            OutputField::Le24h => daily.map(|d| d.le_24h),
            OutputField::Et24h => daily.map(|d| d.et_24h),
        }
    }
}

impl FromStr for OutputField {
    type Err = SebalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        OutputField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == name)
            .ok_or_else(|| SebalError::InvalidConfiguration(format!("unknown output field '{}'", s)))
    }
}

/// Smallest `(rows, cols)` grid holding every pixel position
pub fn raster_shape(pixels: &[ProcessedPixel]) -> (usize, usize) {
    pixels.iter().fold((0, 0), |(rows, cols), p| {
        (rows.max(p.pixel.geo_loc.i + 1), cols.max(p.pixel.geo_loc.j + 1))
    })
}

/// Lay `field` out on the grid spanned by the pixels
pub fn assemble_raster(pixels: &[ProcessedPixel], field: OutputField) -> Array2<f64> {
    let shape = raster_shape(pixels);
    let mut raster = Array2::from_elem(shape, f64::NAN);
    fill(&mut raster, pixels, field);
    raster
}

/// Lay `field` out on a fixed grid; NaN where no valid pixel sits
pub fn assemble_raster_with_shape(
    pixels: &[ProcessedPixel],
    field: OutputField,
    shape: (usize, usize),
) -> SebalResult<Array2<f64>> {
    if let Some(p) = pixels
        .iter()
        .find(|p| p.pixel.geo_loc.i >= shape.0 || p.pixel.geo_loc.j >= shape.1)
    {
        return Err(SebalError::Processing(format!(
            "pixel ({}, {}) is outside the {}x{} raster",
            p.pixel.geo_loc.i, p.pixel.geo_loc.j, shape.0, shape.1
        )));
    }
    let mut raster = Array2::from_elem(shape, f64::NAN);
    fill(&mut raster, pixels, field);
    Ok(raster)
}

fn fill(raster: &mut Array2<f64>, pixels: &[ProcessedPixel], field: OutputField) {
    for p in pixels.iter().filter(|p| p.output.status.is_valid()) {
        if let Some(value) = field.value(&p.output) {
            raster[[p.pixel.geo_loc.i, p.pixel.geo_loc.j]] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoLoc, Pixel, PixelStatus, WeatherObservables};

    fn processed(i: usize, j: usize, h: Option<f64>, status: PixelStatus) -> ProcessedPixel {
        let mut p = ProcessedPixel::new(Pixel {
            geo_loc: GeoLoc::new(i, j, -7.0, -36.0),
            bands: [0.0; 7],
            cos_theta: 0.9,
            day_of_year: 200,
            elevation: 500.0,
            weather: WeatherObservables { ta: 28.0, ux: 2.5, zx: 2.0, hc: 0.3, d: 0.2 },
            cloud_masked: false,
        });
        p.output.h = h;
        p.output.status = status;
        p
    }

    #[test]
    fn test_field_names_roundtrip() {
        for field in OutputField::ALL {
            assert_eq!(field.name().parse::<OutputField>().unwrap(), field);
        }
        assert!("latent".parse::<OutputField>().is_err());
    }

    #[test]
    fn test_assemble_fills_missing_with_nan() {
        let pixels = vec![
            processed(0, 0, Some(100.0), PixelStatus::Valid),
            processed(1, 2, Some(200.0), PixelStatus::Valid),
            processed(0, 1, Some(300.0), PixelStatus::Invalid { reason: "EF".to_string() }),
        ];
        let raster = assemble_raster(&pixels, OutputField::H);

        assert_eq!(raster.dim(), (2, 3));
        assert_eq!(raster[[0, 0]], 100.0);
        assert_eq!(raster[[1, 2]], 200.0);
        assert!(raster[[0, 1]].is_nan());
        assert!(raster[[1, 0]].is_nan());
    }

    #[test]
    fn test_fixed_shape_rejects_outside_pixels() {
        let pixels = vec![processed(4, 0, Some(1.0), PixelStatus::Valid)];
        assert!(assemble_raster_with_shape(&pixels, OutputField::H, (4, 4)).is_err());
        let raster = assemble_raster_with_shape(&pixels, OutputField::H, (5, 2)).unwrap();
        assert_eq!(raster[[4, 0]], 1.0);
    }
}
