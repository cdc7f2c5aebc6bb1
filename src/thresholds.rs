//! Numeric thresholds shared by the scoring modules.
//!
//! Target deltas, penalty intervals, weights and z-score cutoffs all live here so the
//! scoring curves can be audited in one place.

/// A closed acceptable interval `[min, max]` for a scalar feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

// ── Sub clarity ───────────────────────────────────────────────────────
/// Target for `sub - low`: the sub band sits slightly below the low band.
pub const SUB_MINUS_LOW_TARGET: f64 = -0.15;
/// Low-mid energy above this starts to mask the sub.
pub const LOWMID_CEILING: f64 = 0.55;
pub const SUB_FLATNESS_RANGE: Interval = Interval::new(0.03, 0.18);
pub const SUB_DELTA_WEIGHT: f64 = 1.2;
pub const SUB_LOWMID_WEIGHT: f64 = 1.0;
pub const SUB_FLATNESS_WEIGHT: f64 = 0.6;

// ── High end ──────────────────────────────────────────────────────────
/// Target for `high - presence`.
pub const HIGH_MINUS_PRESENCE_TARGET: f64 = -0.05;
/// Target for `air - high`.
pub const AIR_MINUS_HIGH_TARGET: f64 = -0.08;
/// Band distance assumed when only the centroid is known.
pub const HI_END_DEFAULT_BAND_DISTANCE: f64 = 0.25;
pub const CENTROID_RANGE_HZ: Interval = Interval::new(1800.0, 4200.0);
pub const HI_END_BAND_WEIGHT: f64 = 1.4;
pub const HI_END_CENTROID_WEIGHT: f64 = 0.8;

// ── Dynamics ──────────────────────────────────────────────────────────
pub const LRA_RANGE_LU: Interval = Interval::new(4.0, 14.0);
pub const SAMPLE_PEAK_RANGE_DB: Interval = Interval::new(-9.0, -0.2);
pub const MASTER_LUFS_RANGE: Interval = Interval::new(-14.5, -7.0);
pub const DYNAMICS_LRA_WEIGHT: f64 = 0.9;
pub const DYNAMICS_PEAK_WEIGHT: f64 = 0.6;
pub const DYNAMICS_LUFS_WEIGHT: f64 = 0.8;

// ── Stereo image ──────────────────────────────────────────────────────
pub const STEREO_WIDTH_RANGE: Interval = Interval::new(0.02, 0.35);
pub const STEREO_WIDTH_WEIGHT: f64 = 1.2;

// ── Tonality ──────────────────────────────────────────────────────────
pub const TONAL_FLATNESS_RANGE: Interval = Interval::new(0.03, 0.20);
pub const ROLLOFF_RANGE_HZ: Interval = Interval::new(1500.0, 8000.0);
pub const TONAL_FLATNESS_WEIGHT: f64 = 1.0;
pub const TONAL_ROLLOFF_WEIGHT: f64 = 0.6;

// ── Overall score ─────────────────────────────────────────────────────
pub const WEIGHT_SUB_CLARITY: f64 = 1.1;
pub const WEIGHT_HI_END: f64 = 1.0;
pub const WEIGHT_DYNAMICS: f64 = 1.0;
pub const WEIGHT_STEREO_IMAGE: f64 = 0.8;
pub const WEIGHT_TONALITY: f64 = 0.9;
/// How far the overall score is pulled toward the model match percentage.
pub const MATCH_BLEND: f64 = 0.25;

// ── Deviation severity ────────────────────────────────────────────────
pub const Z_HIGH: f64 = 2.2;
pub const Z_MED: f64 = 1.2;

/// Upper bound on emitted issues (one per checklist dimension at most).
pub const MAX_ISSUES: usize = 5;

/// Fraction of the p10..p90 range treated as "close to the edge" in band comparisons.
pub const BAND_EDGE_GUARD: f64 = 0.06;

// ── Readiness ─────────────────────────────────────────────────────────
/// Below `ok_match` by at most this many points still counts as "work".
pub const WORK_MATCH_MARGIN: f64 = 15.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_contains_is_closed() {
        assert!(STEREO_WIDTH_RANGE.contains(0.02));
        assert!(STEREO_WIDTH_RANGE.contains(0.35));
        assert!(!STEREO_WIDTH_RANGE.contains(0.019));
        assert!(!STEREO_WIDTH_RANGE.contains(0.36));
    }

    #[test]
    fn test_severity_cutoffs_ordered() {
        assert!(Z_HIGH > Z_MED);
        assert!(Z_MED > 0.0);
    }
}
