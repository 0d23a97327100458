//! Core SEBAL processing modules

pub mod radiometry;
pub mod radiation_balance;
pub mod anchor_selection;
pub mod sensible_heat;
pub mod evapotranspiration;
pub mod scene;

// Re-export main types
pub use radiometry::{RadiometricRetrieval, RadiometryParams, RadianceInput};
pub use radiation_balance::RadiationBalance;
pub use anchor_selection::{
    AnchorObserver, AnchorPixel, AnchorSelection, AnchorSelectionParams, AnchorSelector,
    ClusteredAnchorSelector, ManualAnchorSelector,
};
pub use sensible_heat::{AnchorCalibration, PixelHeatFlux, SensibleHeatSolver, SolverParams, WindProfile};
pub use evapotranspiration::{EvapotranspirationExtrapolator, EvapotranspirationParams};
pub use scene::{SceneParams, SceneProcessor, SceneReport, SceneResult};
