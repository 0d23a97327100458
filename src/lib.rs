//! sebal: Surface Energy Balance Algorithm for Land
//!
//! This library estimates instantaneous and daily evapotranspiration from
//! Landsat TM/ETM+ pixels and interpolated weather observables. A scene goes
//! through radiometric retrieval, the radiation balance, hot/cold anchor
//! calibration of the sensible heat flux and the daily extrapolation.
//!
//! ```no_run
//! use sebal::{SatelliteConstants, SceneParams, SceneProcessor};
//!
//! # fn run(pixels: Vec<sebal::Pixel>) -> sebal::SebalResult<()> {
//! let processor = SceneProcessor::new(SatelliteConstants::landsat5_tm(), SceneParams::default())?;
//! let result = processor.process(pixels)?;
//! println!("{} valid pixels", result.report.valid);
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod core;
pub mod io;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AnchorRole, DailyOutput, GeoLoc, HOutput, Pixel, PixelOutput, PixelStatus, ProcessedPixel,
    RadiationOutput, RadiometricOutput, SebalError, SebalResult, WeatherObservables,
};

pub use crate::core::{
    AnchorSelection, AnchorSelector, ClusteredAnchorSelector, ManualAnchorSelector, SceneParams,
    SceneProcessor, SceneReport, SceneResult,
};

pub use io::{assemble_raster, OutputField, SatelliteConstants, Sensor};
