//! Scene-level orchestration.
//!
//! Pixels go through two parallel passes separated by a barrier: the
//! radiative pass (radiometry, net radiation, soil heat flux) runs for every
//! pixel independently, then the anchors are selected and calibrated once for
//! the whole scene, and the flux pass (sensible heat, λE, daily ET) runs per
//! pixel against that single calibration.

use crate::core::anchor_selection::{
    AnchorObserver, AnchorSelection, AnchorSelectionParams, AnchorSelector, ClusteredAnchorSelector,
};
use crate::core::evapotranspiration::{EvapotranspirationExtrapolator, EvapotranspirationParams};
use crate::core::radiation_balance::RadiationBalance;
use crate::core::radiometry::{RadiometricRetrieval, RadiometryParams};
use crate::core::sensible_heat::{AnchorCalibration, SensibleHeatSolver, SolverParams};
use crate::io::satellite::SatelliteConstants;
use crate::types::{Pixel, PixelOutput, PixelStatus, ProcessedPixel, SebalError, SebalResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Every tunable of the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    pub radiometry: RadiometryParams,
    pub anchor_selection: AnchorSelectionParams,
    pub solver: SolverParams,
    pub evapotranspiration: EvapotranspirationParams,
}

impl SceneParams {
    pub fn validate(&self) -> SebalResult<()> {
        if let Some(d) = self.radiometry.earth_sun_distance {
            if !(d.is_finite() && d > 0.0) {
                return Err(SebalError::InvalidConfiguration(format!(
                    "Earth-Sun distance must be positive (got {})",
                    d
                )));
            }
        }
        self.anchor_selection.validate()?;
        self.solver.validate()?;
        self.evapotranspiration.validate()
    }

    /// Missing sections fall back to their defaults
    pub fn from_json_str(json: &str) -> SebalResult<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SebalResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// Pixel counts by final status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub non_converged: usize,
    /// Iterations taken by the anchor calibration
    pub anchor_iterations: usize,
}

impl SceneReport {
    fn from_pixels(pixels: &[ProcessedPixel], anchor_iterations: usize) -> Self {
        let mut report = Self { total: pixels.len(), anchor_iterations, ..Self::default() };
        for pixel in pixels {
            match pixel.output.status {
                PixelStatus::Valid => report.valid += 1,
                PixelStatus::NonConverged { .. } => report.non_converged += 1,
                PixelStatus::Invalid { .. } | PixelStatus::Pending => report.invalid += 1,
            }
        }
        report
    }
}

/// Outcome of a processed scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneResult {
    pub pixels: Vec<ProcessedPixel>,
    pub anchors: AnchorSelection,
    pub calibration: AnchorCalibration,
    pub report: SceneReport,
}

/// SEBAL pipeline for one scene
pub struct SceneProcessor {
    satellite: SatelliteConstants,
    params: SceneParams,
    retrieval: RadiometricRetrieval,
    radiation: RadiationBalance,
    solver: SensibleHeatSolver,
    extrapolator: EvapotranspirationExtrapolator,
    selector: Box<dyn AnchorSelector>,
    observer: Option<Box<dyn AnchorObserver>>,
    cancelled: Arc<AtomicBool>,
}

impl SceneProcessor {
    pub fn new(satellite: SatelliteConstants, params: SceneParams) -> SebalResult<Self> {
        satellite.validate()?;
        params.validate()?;
        Ok(Self {
            retrieval: RadiometricRetrieval::new(params.radiometry.clone()),
            radiation: RadiationBalance::new(),
            solver: SensibleHeatSolver::new(params.solver.clone()),
            extrapolator: EvapotranspirationExtrapolator::new(params.evapotranspiration.clone()),
            selector: Box::new(ClusteredAnchorSelector::new(params.anchor_selection.clone())),
            observer: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            satellite,
            params,
        })
    }

    /// Replace the default clustered anchor selection
    pub fn with_selector<S: AnchorSelector + 'static>(mut self, selector: S) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn with_observer<O: AnchorObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Raising this flag stops the scene at the next pixel
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    pub fn satellite(&self) -> &SatelliteConstants {
        &self.satellite
    }

    pub fn process(&self, pixels: Vec<Pixel>) -> SebalResult<SceneResult> {
        let start = Instant::now();
        log::info!("Processing SEBAL scene with {} pixels", pixels.len());

        for pixel in &pixels {
            pixel.validate()?;
        }
        let mut pixels: Vec<ProcessedPixel> = pixels.into_iter().map(ProcessedPixel::new).collect();

        self.for_each_pixel(&mut pixels, |p| self.radiative_stage(p))?;
        let radiative_valid = pixels.iter().filter(|p| p.output.status.is_valid()).count();
        log::info!(
            "Radiation balance computed for {}/{} pixels",
            radiative_valid,
            pixels.len()
        );

        self.check_cancelled()?;
        let anchors = self.selector.select(&pixels)?;
        if let Some(observer) = &self.observer {
            observer.anchors_selected(&anchors);
        }

        let calibration = self.solver.calibrate(&anchors.hot, &anchors.cold)?;

        self.for_each_pixel(&mut pixels, |p| self.flux_stage(&calibration, p))?;

        let report = SceneReport::from_pixels(&pixels, calibration.series.len());
        log::info!(
            "Scene completed in {:.2?}: {} valid, {} invalid, {} not converged",
            start.elapsed(),
            report.valid,
            report.invalid,
            report.non_converged
        );

        Ok(SceneResult { pixels, anchors, calibration, report })
    }

    fn check_cancelled(&self) -> SebalResult<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            log::warn!("Scene processing cancelled");
            return Err(SebalError::Cancelled);
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn for_each_pixel<F>(&self, pixels: &mut [ProcessedPixel], stage: F) -> SebalResult<()>
    where
        F: Fn(&mut ProcessedPixel) + Send + Sync,
    {
        use rayon::prelude::*;

        pixels.par_iter_mut().try_for_each(|pixel| {
            self.check_cancelled()?;
            stage(pixel);
            Ok(())
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn for_each_pixel<F>(&self, pixels: &mut [ProcessedPixel], stage: F) -> SebalResult<()>
    where
        F: Fn(&mut ProcessedPixel),
    {
        pixels.iter_mut().try_for_each(|pixel| {
            self.check_cancelled()?;
            stage(pixel);
            Ok(())
        })
    }

    fn radiative_stage(&self, processed: &mut ProcessedPixel) {
        let ProcessedPixel { pixel, output } = processed;
        let pixel: &Pixel = pixel;
        let result = self.retrieval.retrieve(pixel, &self.satellite).and_then(|radiometry| {
            let d = self.retrieval.distance_for(pixel);
            let radiation = self.radiation.compute(pixel, &radiometry, d)?;
            Ok((radiometry, radiation))
        });
        match result {
            Ok((radiometry, radiation)) => {
                output.radiometry = Some(radiometry);
                output.radiation = Some(radiation);
                output.status = PixelStatus::Valid;
            }
            Err(e) => output.fail(&e),
        }
    }

    fn flux_stage(&self, calibration: &AnchorCalibration, processed: &mut ProcessedPixel) {
        if !processed.output.status.is_valid() {
            return;
        }
        let ProcessedPixel { pixel, output } = processed;
        if let Err(e) = self.solve_fluxes(calibration, pixel, output) {
            output.fail(&e);
        }
    }

    fn solve_fluxes(&self, calibration: &AnchorCalibration, pixel: &Pixel, output: &mut PixelOutput) -> SebalResult<()> {
        let (savi, ts) = output
            .radiometry
            .as_ref()
            .map(|r| (r.savi, r.ts))
            .ok_or_else(|| SebalError::Processing("radiometry missing for a valid pixel".to_string()))?;

        let flux = self.solver.solve_pixel(calibration, &pixel.weather, savi, ts)?;
        output.z0mxy = Some(flux.z0mxy);
        output.set_h_outputs(flux.records)?;
        output.compute_lambda_e()?;
        output.daily = Some(self.extrapolator.extrapolate(output)?);
        Ok(())
    }
}
