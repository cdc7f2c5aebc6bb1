//! Signed deviation of a track from its genre reference, folded into a 0..1 ratio.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::payload::{BandEnergy, FeaturePayload};
use crate::reference::ReferenceModel;

/// Scalar metrics the match calculator compares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchMetrics {
    pub bpm: Option<f64>,
    pub integrated_lufs: Option<f64>,
    pub stereo_width: Option<f64>,
    pub spectral_centroid_hz: Option<f64>,
    pub band_energy_norm: BandEnergy,
}

impl From<&FeaturePayload> for MatchMetrics {
    fn from(f: &FeaturePayload) -> Self {
        Self {
            bpm: f.tempo_bpm(),
            integrated_lufs: f.integrated_lufs(),
            stereo_width: f.stereo_width(),
            spectral_centroid_hz: f.spectral_centroid_hz(),
            band_energy_norm: f.band_energy_norm.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_ratio: f64,
    pub mean_abs_error: f64,
    /// `measured - target` per compared key; bands are prefixed `band_`.
    pub deltas: BTreeMap<String, f64>,
}

impl MatchResult {
    /// Match ratio on the 0-100 scale used by readiness thresholds.
    pub fn match_percent(&self) -> f64 {
        self.match_ratio * 100.0
    }
}

/// Bounded, strictly decreasing transform of the mean absolute error.
pub fn match_ratio_from_error(mean_abs_error: f64) -> f64 {
    (1.0 / (1.0 + mean_abs_error)).clamp(0.0, 1.0)
}

/// Compare a track against a reference model.
///
/// Returns `None` when no key is comparable: "no match data" is not a perfect match.
pub fn compute_model_match(metrics: &MatchMetrics, model: &ReferenceModel) -> Option<MatchResult> {
    let mut deltas = BTreeMap::new();

    let scalars = [
        ("bpm", metrics.bpm),
        ("integrated_lufs", metrics.integrated_lufs),
        ("stereo_width", metrics.stereo_width),
        ("spectral_centroid_hz", metrics.spectral_centroid_hz),
    ];
    for (key, value) in scalars {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            continue;
        };
        if let Some(target) = model.feature_target(key) {
            deltas.insert(key.to_string(), v - target);
        }
    }

    for name in model.band_names() {
        if let (Some(v), Some(target)) = (metrics.band_energy_norm.get_named(name), model.band_target(name)) {
            deltas.insert(format!("band_{name}"), v - target);
        }
    }

    if deltas.is_empty() {
        return None;
    }

    let mean_abs_error = deltas.values().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64;
    Some(MatchResult {
        match_ratio: match_ratio_from_error(mean_abs_error),
        mean_abs_error,
        deltas,
    })
}
