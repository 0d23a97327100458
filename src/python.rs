//! Python bindings.
//!
//! Scenes cross the boundary as JSON documents; rasters come back as numpy
//! arrays.

use crate::core::{ManualAnchorSelector, SceneParams, SceneProcessor, SceneResult};
use crate::io::{assemble_raster, OutputField, SatelliteConstants, Sensor};
use crate::types::{Pixel, SebalError};
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

impl From<SebalError> for PyErr {
    fn from(e: SebalError) -> Self {
        match e {
            SebalError::InvalidConfiguration(_) | SebalError::Json(_) => PyValueError::new_err(e.to_string()),
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }
}

fn parse_sensor(name: &str) -> PyResult<Sensor> {
    match name.to_lowercase().as_str() {
        "landsat5" | "l5" => Ok(Sensor::Landsat5),
        "landsat7" | "l7" => Ok(Sensor::Landsat7),
        "landsat8" | "l8" => Ok(Sensor::Landsat8),
        _ => Err(PyValueError::new_err(format!("Unknown sensor: {}", name))),
    }
}

/// Python wrapper for a processed scene
#[pyclass(name = "SceneResult")]
struct PySceneResult {
    inner: SceneResult,
}

#[pymethods]
impl PySceneResult {
    /// Raster of one output field, NaN where the pixel is missing or failed
    fn raster<'py>(&self, py: Python<'py>, field: &str) -> PyResult<&'py PyArray2<f64>> {
        let field: OutputField = field.parse()?;
        Ok(assemble_raster(&self.inner.pixels, field).into_pyarray(py))
    }

    /// Every output field keyed by name
    fn rasters<'py>(&self, py: Python<'py>) -> PyResult<&'py PyDict> {
        let dict = PyDict::new(py);
        for field in OutputField::ALL {
            dict.set_item(field.name(), assemble_raster(&self.inner.pixels, field).into_pyarray(py))?;
        }
        Ok(dict)
    }

    fn report<'py>(&self, py: Python<'py>) -> PyResult<&'py PyDict> {
        let report = &self.inner.report;
        let dict = PyDict::new(py);
        dict.set_item("total", report.total)?;
        dict.set_item("valid", report.valid)?;
        dict.set_item("invalid", report.invalid)?;
        dict.set_item("non_converged", report.non_converged)?;
        dict.set_item("anchor_iterations", report.anchor_iterations)?;
        Ok(dict)
    }

    fn anchors_json(&self) -> PyResult<String> {
        Ok(self.inner.anchors.to_json()?)
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(|e| SebalError::from(e).into())
    }

    fn __repr__(&self) -> String {
        let report = &self.inner.report;
        format!(
            "SceneResult(total={}, valid={}, invalid={}, non_converged={})",
            report.total, report.valid, report.invalid, report.non_converged
        )
    }
}

/// Run the SEBAL pipeline on a JSON array of pixels
#[pyfunction]
#[pyo3(signature = (pixels_json, satellite_json=None, sensor="landsat5", params_json=None, hot=None, cold=None))]
fn process_scene(
    py: Python<'_>,
    pixels_json: &str,
    satellite_json: Option<&str>,
    sensor: &str,
    params_json: Option<&str>,
    hot: Option<(usize, usize)>,
    cold: Option<(usize, usize)>,
) -> PyResult<PySceneResult> {
    let pixels: Vec<Pixel> = serde_json::from_str(pixels_json).map_err(SebalError::from)?;
    let satellite = match satellite_json {
        Some(json) => SatelliteConstants::from_json_str(json, parse_sensor(sensor)?)?,
        None => SatelliteConstants::landsat5_tm(),
    };
    let params = match params_json {
        Some(json) => SceneParams::from_json_str(json)?,
        None => SceneParams::default(),
    };

    let mut processor = SceneProcessor::new(satellite, params)?;
    match (hot, cold) {
        (Some(hot), Some(cold)) => processor = processor.with_selector(ManualAnchorSelector::new(hot, cold)),
        (None, None) => {}
        _ => return Err(PyValueError::new_err("hot and cold must be given together")),
    }

    let result = py.allow_threads(|| processor.process(pixels))?;
    Ok(PySceneResult { inner: result })
}

/// Python module definition
#[pymodule]
fn sebal(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(process_scene, m)?)?;
    m.add_class::<PySceneResult>()?;
    Ok(())
}
