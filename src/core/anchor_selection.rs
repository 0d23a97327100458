//! Hot and cold anchor pixel selection.
//!
//! The selection policy is pluggable through [`AnchorSelector`]. The default
//! [`ClusteredAnchorSelector`] groups candidate pixels with k-means over
//! normalised (Ts, NDVI, albedo), drops clusters combining dense vegetation
//! with unusually high temperature, and takes extrema inside the best ranked
//! clusters: the coldest well-vegetated pixel and the hottest bare, bright one.

use crate::types::{
    AnchorRole, GeoLoc, ProcessedPixel, SebalError, SebalResult, WeatherObservables,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A pixel chosen as calibration anchor, with the values the solver needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPixel {
    pub role: AnchorRole,
    /// Position in the scene's pixel collection
    pub index: usize,
    pub geo_loc: GeoLoc,
    pub ts: f64,
    pub ndvi: f64,
    pub savi: f64,
    pub alpha: f64,
    pub rn: f64,
    pub g: f64,
    pub weather: WeatherObservables,
}

impl AnchorPixel {
    pub fn from_processed(role: AnchorRole, index: usize, pixel: &ProcessedPixel) -> SebalResult<Self> {
        let output = &pixel.output;
        match (&output.radiometry, &output.radiation) {
            (Some(radiometry), Some(radiation)) if output.status.is_valid() => Ok(Self {
                role,
                index,
                geo_loc: pixel.pixel.geo_loc,
                ts: radiometry.ts,
                ndvi: radiometry.ndvi,
                savi: radiometry.savi,
                alpha: radiometry.alpha,
                rn: radiation.rn,
                g: radiation.g,
                weather: pixel.pixel.weather,
            }),
            _ => Err(SebalError::AnchorSelection(format!(
                "pixel ({}, {}) has no valid radiation balance for the {} anchor",
                pixel.pixel.geo_loc.i, pixel.pixel.geo_loc.j, role
            ))),
        }
    }
}

/// The hot/cold pair selected for a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorSelection {
    pub hot: AnchorPixel,
    pub cold: AnchorPixel,
}

impl AnchorSelection {
    /// JSON form used for diagnostic broadcast
    pub fn to_json(&self) -> SebalResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Anchor selection policy
pub trait AnchorSelector: Send + Sync {
    fn select(&self, pixels: &[ProcessedPixel]) -> SebalResult<AnchorSelection>;
}

/// Receives the anchors once they are fixed for the scene
pub trait AnchorObserver: Send + Sync {
    fn anchors_selected(&self, selection: &AnchorSelection);
}

impl<F> AnchorObserver for F
where
    F: Fn(&AnchorSelection) + Send + Sync,
{
    fn anchors_selected(&self, selection: &AnchorSelection) {
        self(selection)
    }
}

/// Thresholds for the clustered selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSelectionParams {
    /// Number of k-means clusters (reduced for small populations)
    pub cluster_count: usize,
    /// Cap on k-means refinement passes
    pub max_cluster_iterations: usize,
    /// Minimum NDVI for a cold candidate
    pub cold_min_ndvi: f64,
    /// Maximum NDVI for a hot candidate (water, NDVI < 0, is never hot)
    pub hot_max_ndvi: f64,
    /// Albedo window for a hot candidate
    pub hot_min_albedo: f64,
    pub hot_max_albedo: f64,
    /// Clusters at or above this mean NDVI are implausible when also hotter
    /// than one standard deviation above the scene mean
    pub implausible_ndvi: f64,
    /// Exclude pixels flagged by the upstream cloud/shadow mask
    pub cloud_detection: bool,
}

impl Default for AnchorSelectionParams {
    fn default() -> Self {
        Self {
            cluster_count: 5,
            max_cluster_iterations: 50,
            cold_min_ndvi: 0.6,
            hot_max_ndvi: 0.2,
            hot_min_albedo: 0.1,
            hot_max_albedo: 0.4,
            implausible_ndvi: 0.5,
            cloud_detection: true,
        }
    }
}

impl AnchorSelectionParams {
    pub fn validate(&self) -> SebalResult<()> {
        if self.cluster_count == 0 || self.max_cluster_iterations == 0 {
            return Err(SebalError::InvalidConfiguration(
                "cluster count and cluster iterations must be at least 1".to_string(),
            ));
        }
        if self.hot_min_albedo > self.hot_max_albedo {
            return Err(SebalError::InvalidConfiguration(format!(
                "hot albedo window is empty ({} > {})",
                self.hot_min_albedo, self.hot_max_albedo
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    ts: f64,
    ndvi: f64,
    alpha: f64,
}

#[derive(Debug, Clone)]
struct Cluster {
    members: Vec<usize>,     // positions in the candidate list
    mean_ts: f64,
    mean_ndvi: f64,
}

/// Valid, unmasked pixels with finite selection features
fn collect_candidates(pixels: &[ProcessedPixel], cloud_detection: bool) -> Vec<Candidate> {
    pixels
        .iter()
        .enumerate()
        .filter(|(_, p)| p.output.status.is_valid() && p.output.radiation.is_some())
        .filter(|(_, p)| !(cloud_detection && p.pixel.cloud_masked))
        .filter_map(|(index, p)| {
            let r = p.output.radiometry.as_ref()?;
            let finite = r.ts.is_finite() && r.ndvi.is_finite() && r.alpha.is_finite();
            finite.then_some(Candidate { index, ts: r.ts, ndvi: r.ndvi, alpha: r.alpha })
        })
        .collect()
}

/// Default clustering/extremum policy
#[derive(Debug, Clone, Default)]
pub struct ClusteredAnchorSelector {
    params: AnchorSelectionParams,
}

impl ClusteredAnchorSelector {
    pub fn new(params: AnchorSelectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AnchorSelectionParams {
        &self.params
    }

    fn features(candidates: &[Candidate]) -> Vec<[f64; 3]> {
        let range = |f: fn(&Candidate) -> f64| {
            let min = candidates.iter().map(f).fold(f64::INFINITY, f64::min);
            let max = candidates.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
            (min, max - min)
        };
        let scale = |value: f64, (min, span): (f64, f64)| if span > 0.0 { (value - min) / span } else { 0.0 };

        let ts_range = range(|c| c.ts);
        let ndvi_range = range(|c| c.ndvi);
        let alpha_range = range(|c| c.alpha);
        candidates
            .iter()
            .map(|c| [scale(c.ts, ts_range), scale(c.ndvi, ndvi_range), scale(c.alpha, alpha_range)])
            .collect()
    }

    /// Deterministic k-means: seeds are spread evenly over the candidates
    /// sorted by temperature
    fn cluster(&self, candidates: &[Candidate]) -> Vec<Cluster> {
        let n = candidates.len();
        let k = self.params.cluster_count.min(n);
        let points = Self::features(candidates);

        let mut by_ts: Vec<usize> = (0..n).collect();
        by_ts.sort_by(|&a, &b| {
            candidates[a]
                .ts
                .total_cmp(&candidates[b].ts)
                .then(candidates[a].index.cmp(&candidates[b].index))
        });
        let mut centroids: Vec<[f64; 3]> = (0..k)
            .map(|c| {
                let position = if k == 1 { 0 } else { c * (n - 1) / (k - 1) };
                points[by_ts[position]]
            })
            .collect();

        let distance = |p: &[f64; 3], c: &[f64; 3]| -> f64 {
            p.iter().zip(c.iter()).map(|(a, b)| (a - b).powi(2)).sum()
        };

        let mut assignment = vec![usize::MAX; n];
        for pass in 0..self.params.max_cluster_iterations {
            let mut changed = false;
            for (point_index, point) in points.iter().enumerate() {
                let mut best = 0;
                for (cluster_index, centroid) in centroids.iter().enumerate().skip(1) {
                    if distance(point, centroid) < distance(point, &centroids[best]) {
                        best = cluster_index;
                    }
                }
                if assignment[point_index] != best {
                    assignment[point_index] = best;
                    changed = true;
                }
            }
            if !changed {
                log::debug!("k-means settled after {} passes", pass);
                break;
            }
            for (cluster_index, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&[f64; 3]> = points
                    .iter()
                    .zip(assignment.iter())
                    .filter(|(_, a)| **a == cluster_index)
                    .map(|(p, _)| p)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                for (axis, value) in centroid.iter_mut().enumerate() {
                    *value = members.iter().map(|p| p[axis]).sum::<f64>() / members.len() as f64;
                }
            }
        }

        (0..k)
            .filter_map(|cluster_index| {
                let members: Vec<usize> = (0..n).filter(|&p| assignment[p] == cluster_index).collect();
                if members.is_empty() {
                    return None;
                }
                let count = members.len() as f64;
                let mean_ts = members.iter().map(|&m| candidates[m].ts).sum::<f64>() / count;
                let mean_ndvi = members.iter().map(|&m| candidates[m].ndvi).sum::<f64>() / count;
                Some(Cluster { members, mean_ts, mean_ndvi })
            })
            .collect()
    }

    fn plausible_clusters(&self, candidates: &[Candidate], clusters: Vec<Cluster>) -> Vec<Cluster> {
        let count = candidates.len() as f64;
        let mean_ts = candidates.iter().map(|c| c.ts).sum::<f64>() / count;
        let std_ts = (candidates.iter().map(|c| (c.ts - mean_ts).powi(2)).sum::<f64>() / count).sqrt();

        clusters
            .into_iter()
            .filter(|cluster| {
                let implausible = cluster.mean_ndvi >= self.params.implausible_ndvi
                    && cluster.mean_ts > mean_ts + std_ts;
                if implausible {
                    log::debug!(
                        "Rejecting cluster of {} pixels (mean NDVI {:.3}, mean Ts {:.2} K)",
                        cluster.members.len(), cluster.mean_ndvi, cluster.mean_ts
                    );
                }
                !implausible
            })
            .collect()
    }

    fn pick_cold(&self, candidates: &[Candidate], clusters: &[Cluster]) -> Option<Candidate> {
        let mut ranked: Vec<&Cluster> = clusters.iter().collect();
        ranked.sort_by(|a, b| {
            b.mean_ndvi
                .total_cmp(&a.mean_ndvi)
                .then(a.mean_ts.total_cmp(&b.mean_ts))
        });
        ranked.iter().find_map(|cluster| {
            cluster
                .members
                .iter()
                .map(|&m| candidates[m])
                .filter(|c| c.ndvi >= self.params.cold_min_ndvi)
                .min_by(|a, b| {
                    a.ts.total_cmp(&b.ts)
                        .then(b.ndvi.total_cmp(&a.ndvi))
                        .then(a.index.cmp(&b.index))
                })
        })
    }

    fn pick_hot(&self, candidates: &[Candidate], clusters: &[Cluster]) -> Option<Candidate> {
        let p = &self.params;
        let mut ranked: Vec<&Cluster> = clusters.iter().collect();
        ranked.sort_by(|a, b| {
            b.mean_ts
                .total_cmp(&a.mean_ts)
                .then(a.mean_ndvi.total_cmp(&b.mean_ndvi))
        });
        ranked.iter().find_map(|cluster| {
            cluster
                .members
                .iter()
                .map(|&m| candidates[m])
                .filter(|c| c.ndvi >= 0.0 && c.ndvi <= p.hot_max_ndvi)
                .filter(|c| c.alpha >= p.hot_min_albedo && c.alpha <= p.hot_max_albedo)
                .min_by(|a, b| {
                    b.ts.total_cmp(&a.ts)
                        .then(a.ndvi.total_cmp(&b.ndvi))
                        .then(a.index.cmp(&b.index))
                })
        })
    }
}

impl AnchorSelector for ClusteredAnchorSelector {
    fn select(&self, pixels: &[ProcessedPixel]) -> SebalResult<AnchorSelection> {
        let candidates = collect_candidates(pixels, self.params.cloud_detection);
        log::info!(
            "Selecting anchors among {} candidates ({} pixels in scene)",
            candidates.len(),
            pixels.len()
        );
        if candidates.len() < 2 {
            return Err(SebalError::AnchorSelection(format!(
                "{} usable candidate pixels, at least 2 are needed",
                candidates.len()
            )));
        }

        let clusters = self.cluster(&candidates);
        let clusters = self.plausible_clusters(&candidates, clusters);

        let cold = self
            .pick_cold(&candidates, &clusters)
            .ok_or_else(|| SebalError::AnchorSelection("no cold pixel candidate".to_string()))?;
        let hot = self
            .pick_hot(&candidates, &clusters)
            .ok_or_else(|| SebalError::AnchorSelection("no hot pixel candidate".to_string()))?;

        if hot.index == cold.index || hot.ts.partial_cmp(&cold.ts) != Some(Ordering::Greater) {
            return Err(SebalError::AnchorSelection(format!(
                "degenerate anchors: hot {:.2} K vs cold {:.2} K",
                hot.ts, cold.ts
            )));
        }

        let selection = AnchorSelection {
            hot: AnchorPixel::from_processed(AnchorRole::Hot, hot.index, &pixels[hot.index])?,
            cold: AnchorPixel::from_processed(AnchorRole::Cold, cold.index, &pixels[cold.index])?,
        };
        log::info!(
            "Hot pixel ({}, {}) Ts = {:.2} K; cold pixel ({}, {}) Ts = {:.2} K",
            selection.hot.geo_loc.i,
            selection.hot.geo_loc.j,
            selection.hot.ts,
            selection.cold.geo_loc.i,
            selection.cold.geo_loc.j,
            selection.cold.ts
        );
        Ok(selection)
    }
}

/// Anchors fixed by image position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAnchorSelector {
    pub hot: (usize, usize),
    pub cold: (usize, usize),
}

impl ManualAnchorSelector {
    pub fn new(hot: (usize, usize), cold: (usize, usize)) -> Self {
        Self { hot, cold }
    }

    fn locate(pixels: &[ProcessedPixel], (i, j): (usize, usize), role: AnchorRole) -> SebalResult<AnchorPixel> {
        let index = pixels
            .iter()
            .position(|p| p.pixel.geo_loc.i == i && p.pixel.geo_loc.j == j)
            .ok_or_else(|| SebalError::AnchorSelection(format!("{} pixel ({}, {}) is not in the scene", role, i, j)))?;
        AnchorPixel::from_processed(role, index, &pixels[index])
    }
}

impl AnchorSelector for ManualAnchorSelector {
    fn select(&self, pixels: &[ProcessedPixel]) -> SebalResult<AnchorSelection> {
        let hot = Self::locate(pixels, self.hot, AnchorRole::Hot)?;
        let cold = Self::locate(pixels, self.cold, AnchorRole::Cold)?;
        if hot.index == cold.index {
            return Err(SebalError::AnchorSelection(
                "hot and cold anchors are the same pixel".to_string(),
            ));
        }
        Ok(AnchorSelection { hot, cold })
    }
}
