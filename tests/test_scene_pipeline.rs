mod common;

use approx::assert_relative_eq;
use common::{find, four_pixel_scene, init_logging, satellite, scene_params, synthetic_scene, weather};
use sebal::core::anchor_selection::AnchorSelection;
use sebal::{assemble_raster, OutputField, PixelStatus, SceneProcessor, SebalError};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

fn processor() -> SceneProcessor {
    SceneProcessor::new(satellite(), scene_params()).unwrap()
}

#[test]
fn test_scene_end_to_end() {
    init_logging();
    let result = processor().process(synthetic_scene()).unwrap();

    assert_eq!(result.report.total, 12);
    assert_eq!(result.report.valid, 8);
    assert_eq!(result.report.invalid, 1);
    assert_eq!(result.report.non_converged, 3);
    assert!(result.report.anchor_iterations <= 50);
    assert_eq!(result.report.anchor_iterations, result.calibration.series.len());

    let hot = &result.anchors.hot.geo_loc;
    let cold = &result.anchors.cold.geo_loc;
    assert_eq!((hot.i, hot.j), (0, 3));
    assert_eq!((cold.i, cold.j), (0, 0));
}

#[test]
fn test_four_pixel_scene() {
    init_logging();
    let result = processor().process(four_pixel_scene()).unwrap();

    assert_eq!(result.report.valid, 4);
    assert!(result.report.anchor_iterations <= 50);
    assert_eq!((result.anchors.hot.geo_loc.j, result.anchors.cold.geo_loc.j), (3, 0));
    assert_relative_eq!(result.anchors.cold.ndvi, 0.8, max_relative = 0.01);
    assert_relative_eq!(result.anchors.hot.ndvi, 0.1, max_relative = 0.05);

    let hot = &find(&result.pixels, 0, 3).output;
    let cold = &find(&result.pixels, 0, 0).output;
    assert_relative_eq!(hot.h.unwrap(), hot.rn().unwrap() - hot.g().unwrap(), max_relative = 0.01);
    assert!(cold.h.unwrap().abs() < 0.01 * hot.h.unwrap());
}

#[test]
fn test_collapsed_resistance_is_not_converged() {
    let mut scene = four_pixel_scene();
    scene[1].weather = weather(1e3);
    let result = processor().process(scene).unwrap();

    assert_eq!(result.report.valid, 3);
    assert_eq!(result.report.non_converged, 1);
    let windy = &find(&result.pixels, 0, 1).output;
    assert!(matches!(windy.status, PixelStatus::NonConverged { .. }));
    assert!(windy.h.is_none() && windy.daily.is_none());

    let hot = &find(&result.pixels, 0, 3).output;
    assert_relative_eq!(hot.h.unwrap(), 415.648, max_relative = 1e-4);
}

#[test]
fn test_anchor_fluxes() {
    let result = processor().process(synthetic_scene()).unwrap();

    let hot = &find(&result.pixels, 0, 3).output;
    let available = hot.rn().unwrap() - hot.g().unwrap();
    assert_relative_eq!(hot.h.unwrap(), available, max_relative = 1e-6);
    assert_relative_eq!(hot.h.unwrap(), 415.648, max_relative = 1e-4);
    assert!(hot.lambda_e.unwrap().abs() < 1e-6);

    let cold = &find(&result.pixels, 0, 0).output;
    assert!(cold.h.unwrap().abs() < 1e-6);
    assert_relative_eq!(
        cold.lambda_e.unwrap(),
        cold.rn().unwrap() - cold.g().unwrap(),
        max_relative = 1e-9
    );
}

#[test]
fn test_intermediate_pixels() {
    let result = processor().process(synthetic_scene()).unwrap();

    let cropland = &find(&result.pixels, 0, 1).output;
    let shrub = &find(&result.pixels, 0, 2).output;
    assert_relative_eq!(cropland.h.unwrap(), 158.55, max_relative = 1e-3);
    assert_relative_eq!(shrub.h.unwrap(), 282.44, max_relative = 1e-3);

    for p in result.pixels.iter().filter(|p| p.output.status.is_valid()) {
        let output = &p.output;
        let h = output.h.unwrap();
        assert_relative_eq!(
            output.lambda_e.unwrap(),
            output.rn().unwrap() - output.g().unwrap() - h,
            epsilon = 1e-9
        );
        assert_eq!(output.final_h().unwrap().h, h);
        assert!(output.initial_h().is_some());
        assert!(output.z0mxy.unwrap() > 0.0);

        let daily = output.daily.as_ref().unwrap();
        assert!(daily.et_24h.is_finite() && daily.et_24h > -1e-9);
        assert_eq!(daily.tau_24h, output.radiometry.as_ref().unwrap().tau_sw);
    }

    // wetter surfaces evaporate more
    let et = |i, j| find(&result.pixels, i, j).output.daily.as_ref().unwrap().et_24h;
    assert!(et(0, 0) > et(0, 1));
    assert!(et(0, 1) > et(0, 2));
    assert!(et(0, 2) > et(0, 3));
    assert_relative_eq!(et(0, 0), 26.96, max_relative = 1e-3);
}

#[test]
fn test_failed_pixels_do_not_abort_the_scene() {
    let result = processor().process(synthetic_scene()).unwrap();

    let calm = &find(&result.pixels, 2, 2).output;
    assert!(matches!(calm.status, PixelStatus::NonConverged { iterations: 0, .. }));
    assert!(calm.h.is_none() && calm.daily.is_none());
    assert!(calm.rn().is_some());

    let invalid = &find(&result.pixels, 2, 3).output;
    match &invalid.status {
        PixelStatus::Invalid { reason } => assert!(reason.contains("Ts")),
        other => panic!("unexpected status {:?}", other),
    }
    assert!(invalid.radiometry.is_none());

    // colder than the cold anchor: the stable correction runs away
    let water = &find(&result.pixels, 2, 0).output;
    assert!(matches!(water.status, PixelStatus::NonConverged { .. }));
    assert!(water.ndvi().unwrap() < 0.0);
    assert_relative_eq!(water.g().unwrap(), 0.5 * water.rn().unwrap());
}

#[test]
fn test_anchor_calibration_failure_is_fatal() {
    let mut params = scene_params();
    params.solver.max_iterations = 3;
    let processor = SceneProcessor::new(satellite(), params).unwrap();

    let err = processor.process(synthetic_scene()).unwrap_err();
    assert!(matches!(err, SebalError::NonConvergence { iterations: 3, .. }));
}

#[test]
fn test_malformed_pixel_aborts_before_processing() {
    let mut scene = synthetic_scene();
    scene[5].weather.ux = f64::NAN;

    let err = processor().process(scene).unwrap_err();
    assert!(matches!(err, SebalError::InvalidConfiguration(_)));
}

#[test]
fn test_cancellation() {
    let processor = processor();
    processor.cancellation_flag().store(true, Ordering::Relaxed);

    let err = processor.process(synthetic_scene()).unwrap_err();
    assert!(matches!(err, SebalError::Cancelled));
}

#[test]
fn test_observer_receives_anchors() {
    let seen: Arc<Mutex<Vec<AnchorSelection>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let processor = processor().with_observer(move |selection: &AnchorSelection| {
        sink.lock().unwrap().push(selection.clone());
    });

    let result = processor.process(synthetic_scene()).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], result.anchors);
}

#[test]
fn test_rasters_follow_pixel_positions() {
    let result = processor().process(synthetic_scene()).unwrap();
    let et = assemble_raster(&result.pixels, OutputField::Et24h);

    assert_eq!(et.dim(), (3, 4));
    let cold = find(&result.pixels, 0, 0).output.daily.as_ref().unwrap().et_24h;
    assert_eq!(et[[0, 0]], cold);
    assert!(et[[2, 2]].is_nan());
    assert!(et[[2, 3]].is_nan());

    let ts = assemble_raster(&result.pixels, OutputField::Ts);
    assert_relative_eq!(ts[[0, 3]], 315.0, max_relative = 1e-9);
}
