//! Calibration constants and output raster assembly

pub mod raster;
pub mod satellite;

pub use raster::{assemble_raster, assemble_raster_with_shape, raster_shape, OutputField};
pub use satellite::{BandCalibration, SatelliteConstants, Sensor};
