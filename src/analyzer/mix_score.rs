use serde::{Deserialize, Serialize};

use crate::payload::{BandEnergy, BandKey, FeaturePayload};
use crate::thresholds::*;

/// Five mix sub-scores (0-100) and their weighted overall. `None` = not enough input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MixScoreResult {
    pub overall_score: Option<f64>,
    pub sub_clarity: Option<f64>,
    pub hi_end: Option<f64>,
    pub dynamics: Option<f64>,
    pub stereo_image: Option<f64>,
    pub tonality: Option<f64>,
}

impl MixScoreResult {
    /// Sub-scores paired with their weight in the overall mean, in fixed order.
    pub fn weighted_parts(&self) -> [(&'static str, Option<f64>, f64); 5] {
        [
            ("sub_clarity", self.sub_clarity, WEIGHT_SUB_CLARITY),
            ("hi_end", self.hi_end, WEIGHT_HI_END),
            ("dynamics", self.dynamics, WEIGHT_DYNAMICS),
            ("stereo_image", self.stereo_image, WEIGHT_STEREO_IMAGE),
            ("tonality", self.tonality, WEIGHT_TONALITY),
        ]
    }
}

/// Compute all mix sub-scores and the overall score.
///
/// `model_match_percent` (0-100) pulls the overall a quarter of the way toward the
/// reference match when known.
pub fn compute_mix_scores(
    features: &FeaturePayload,
    bands: &BandEnergy,
    model_match_percent: Option<f64>,
) -> MixScoreResult {
    let has_any = features.integrated_lufs().is_some()
        || features.loudness_range().is_some()
        || features.sample_peak_db().is_some()
        || features.spectral_centroid_hz().is_some()
        || features.spectral_rolloff_hz().is_some()
        || features.spectral_flatness().is_some()
        || features.stereo_width().is_some()
        || !bands.is_empty();
    if !has_any {
        return MixScoreResult::default();
    }

    let mut result = MixScoreResult {
        overall_score: None,
        sub_clarity: sub_clarity_score(features, bands),
        hi_end: hi_end_score(features, bands),
        dynamics: dynamics_score(features),
        stereo_image: stereo_image_score(features),
        tonality: tonality_score(features),
    };
    result.overall_score = overall_score(&result, model_match_percent);
    result
}

/// Linear interpolation between `a` and `b`.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Map a 0..1 distance (0 = on target) to a 0..100 score.
pub fn score_from_distance(distance: f64) -> f64 {
    let d = distance.clamp(0.0, 1.0);
    lerp(100.0, 0.0, d).round().clamp(0.0, 100.0)
}

/// Soft penalty for a scalar outside `range`: 0 inside, growing linearly with the
/// distance relative to the violated edge's magnitude, capped at 1.
pub fn penalty_outside(value: f64, range: Interval) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scale = |edge: f64| if edge == 0.0 { 1.0 } else { edge.abs() };
    if value < range.min {
        ((range.min - value) / scale(range.min)).clamp(0.0, 1.0)
    } else if value > range.max {
        ((value - range.max) / scale(range.max)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn penalty_or_zero(value: Option<f64>, range: Interval) -> f64 {
    value.map_or(0.0, |v| penalty_outside(v, range))
}

// ── Sub clarity ───────────────────────────────────────────────────────
// Is the sub centered relative to the low band, without low-mid mud?
// Needs sub, low and lowmid; flatness only adds a penalty when present.
fn sub_clarity_score(f: &FeaturePayload, bands: &BandEnergy) -> Option<f64> {
    let sub = bands.get(BandKey::Sub)?;
    let low = bands.get(BandKey::Low)?;
    let lowmid = bands.get(BandKey::Lowmid)?;

    let delta_dev = ((sub - low) - SUB_MINUS_LOW_TARGET).abs();
    let lowmid_excess = (lowmid - LOWMID_CEILING).max(0.0);
    let flat_pen = penalty_or_zero(f.spectral_flatness(), SUB_FLATNESS_RANGE);

    let dist = delta_dev * SUB_DELTA_WEIGHT
        + lowmid_excess * SUB_LOWMID_WEIGHT
        + flat_pen * SUB_FLATNESS_WEIGHT;
    Some(score_from_distance(dist))
}

// ── High end ──────────────────────────────────────────────────────────
// Presence → high → air should roll off gently; centroid should not be extreme.
fn hi_end_score(f: &FeaturePayload, bands: &BandEnergy) -> Option<f64> {
    let presence = bands.get(BandKey::Presence);
    let high = bands.get(BandKey::High);
    let air = bands.get(BandKey::Air);
    let centroid = f.spectral_centroid_hz();

    let all_bands = presence.is_some() && high.is_some() && air.is_some();
    if !all_bands && centroid.is_none() {
        return None;
    }

    let mut band_dist = 0.0;
    let mut band_count = 0;
    if let (Some(p), Some(h)) = (presence, high) {
        band_dist += ((h - p) - HIGH_MINUS_PRESENCE_TARGET).abs();
        band_count += 1;
    }
    if let (Some(a), Some(h)) = (air, high) {
        band_dist += ((a - h) - AIR_MINUS_HIGH_TARGET).abs();
        band_count += 1;
    }
    let avg_band_dist = if band_count > 0 {
        band_dist / band_count as f64
    } else {
        HI_END_DEFAULT_BAND_DISTANCE
    };

    let centroid_pen = penalty_or_zero(centroid, CENTROID_RANGE_HZ);
    let dist = avg_band_dist * HI_END_BAND_WEIGHT + centroid_pen * HI_END_CENTROID_WEIGHT;
    Some(score_from_distance(dist))
}

// ── Dynamics ──────────────────────────────────────────────────────────
// LRA, sample peak and integrated loudness each inside a generic master window.
fn dynamics_score(f: &FeaturePayload) -> Option<f64> {
    let lra = f.loudness_range();
    let peak = f.sample_peak_db();
    let lufs = f.integrated_lufs();
    if lra.is_none() && peak.is_none() && lufs.is_none() {
        return None;
    }

    let dist = penalty_or_zero(lra, LRA_RANGE_LU) * DYNAMICS_LRA_WEIGHT
        + penalty_or_zero(peak, SAMPLE_PEAK_RANGE_DB) * DYNAMICS_PEAK_WEIGHT
        + penalty_or_zero(lufs, MASTER_LUFS_RANGE) * DYNAMICS_LUFS_WEIGHT;
    Some(score_from_distance(dist))
}

// ── Stereo image ──────────────────────────────────────────────────────
// Not collapsed to mono, not phase-wide.
fn stereo_image_score(f: &FeaturePayload) -> Option<f64> {
    let width = f.stereo_width()?;
    let pen = penalty_outside(width, STEREO_WIDTH_RANGE);
    Some(score_from_distance(pen * STEREO_WIDTH_WEIGHT))
}

// ── Tonality ──────────────────────────────────────────────────────────
fn tonality_score(f: &FeaturePayload) -> Option<f64> {
    let flatness = f.spectral_flatness();
    let rolloff = f.spectral_rolloff_hz();
    if flatness.is_none() && rolloff.is_none() {
        return None;
    }

    let dist = penalty_or_zero(flatness, TONAL_FLATNESS_RANGE) * TONAL_FLATNESS_WEIGHT
        + penalty_or_zero(rolloff, ROLLOFF_RANGE_HZ) * TONAL_ROLLOFF_WEIGHT;
    Some(score_from_distance(dist))
}

// ── Overall ───────────────────────────────────────────────────────────
fn overall_score(parts: &MixScoreResult, model_match_percent: Option<f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut sum_w = 0.0;
    for (_, value, weight) in parts.weighted_parts() {
        if let Some(v) = value {
            sum += v * weight;
            sum_w += weight;
        }
    }
    if sum_w <= 0.0 {
        return None;
    }

    let mut overall = (sum / sum_w).round();
    if let Some(m) = model_match_percent.filter(|m| m.is_finite()) {
        overall = lerp(overall, m.clamp(0.0, 100.0), MATCH_BLEND).round();
    }
    Some(overall.clamp(0.0, 100.0))
}
