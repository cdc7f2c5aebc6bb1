//! Feature payload produced by the upstream analyzer for one track version.
//!
//! Every field is optional. Accessors filter non-finite values so that a missing or
//! broken measurement is always `None`, never a zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named frequency bands of the normalized band-energy map, in ascending frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandKey {
    Sub,
    Low,
    Lowmid,
    Mid,
    Presence,
    High,
    Air,
}

impl BandKey {
    pub const ALL: [BandKey; 7] = [
        BandKey::Sub,
        BandKey::Low,
        BandKey::Lowmid,
        BandKey::Mid,
        BandKey::Presence,
        BandKey::High,
        BandKey::Air,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sub => "sub",
            Self::Low => "low",
            Self::Lowmid => "lowmid",
            Self::Mid => "mid",
            Self::Presence => "presence",
            Self::High => "high",
            Self::Air => "air",
        }
    }
}

impl fmt::Display for BandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized (0..1) band energies keyed by band name.
///
/// Kept as an open map: reference models may describe bands this crate has no enum
/// variant for, and the match calculator compares whatever both sides share.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandEnergy(BTreeMap<String, Option<f64>>);

impl BandEnergy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, band: BandKey, value: f64) -> Self {
        self.0.insert(band.as_str().to_string(), Some(value));
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), Some(value));
    }

    pub fn get(&self, band: BandKey) -> Option<f64> {
        self.get_named(band.as_str())
    }

    pub fn get_named(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied().flatten().filter(|v| v.is_finite())
    }

    /// True when no band carries a usable value.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| !v.is_some_and(f64::is_finite))
    }

    /// Iterate over bands with a finite value, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.filter(|x| x.is_finite()).map(|x| (k.as_str(), x)))
    }
}

/// Nested loudness block some analyzer versions emit instead of top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessStats {
    pub integrated_lufs: Option<f64>,
    #[serde(alias = "lra")]
    pub loudness_range: Option<f64>,
    pub sample_peak_db: Option<f64>,
}

/// One analyzer payload. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturePayload {
    /// Genre profile the track version was analyzed against, if the analyzer recorded it.
    pub profile_key: Option<String>,

    #[serde(alias = "lufs")]
    pub integrated_lufs: Option<f64>,
    #[serde(alias = "lra")]
    pub loudness_range: Option<f64>,
    pub sample_peak_db: Option<f64>,
    pub loudness_stats: Option<LoudnessStats>,

    #[serde(alias = "band_norm")]
    pub band_energy_norm: BandEnergy,

    pub spectral_centroid_hz: Option<f64>,
    pub spectral_rolloff_hz: Option<f64>,
    pub spectral_flatness: Option<f64>,

    pub stereo_width: Option<f64>,

    #[serde(alias = "bpm")]
    pub tempo_bpm: Option<f64>,
    pub key: Option<String>,
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

impl FeaturePayload {
    /// Integrated loudness, falling back to the nested loudness block.
    pub fn integrated_lufs(&self) -> Option<f64> {
        finite(self.integrated_lufs)
            .or_else(|| self.loudness_stats.as_ref().and_then(|s| finite(s.integrated_lufs)))
    }

    pub fn loudness_range(&self) -> Option<f64> {
        finite(self.loudness_range)
            .or_else(|| self.loudness_stats.as_ref().and_then(|s| finite(s.loudness_range)))
    }

    pub fn sample_peak_db(&self) -> Option<f64> {
        finite(self.sample_peak_db)
            .or_else(|| self.loudness_stats.as_ref().and_then(|s| finite(s.sample_peak_db)))
    }

    pub fn spectral_centroid_hz(&self) -> Option<f64> {
        finite(self.spectral_centroid_hz)
    }

    pub fn spectral_rolloff_hz(&self) -> Option<f64> {
        finite(self.spectral_rolloff_hz)
    }

    pub fn spectral_flatness(&self) -> Option<f64> {
        finite(self.spectral_flatness)
    }

    pub fn stereo_width(&self) -> Option<f64> {
        finite(self.stereo_width)
    }

    pub fn tempo_bpm(&self) -> Option<f64> {
        finite(self.tempo_bpm)
    }

    pub fn bands(&self) -> &BandEnergy {
        &self.band_energy_norm
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
