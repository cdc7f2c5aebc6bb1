//! Genre reference models: per-feature distribution statistics built offline from a
//! corpus of reference tracks.
//!
//! A model is loaded once and never mutated. Lookups return `Option` so a missing
//! statistic simply excludes the feature from matching and classification.

pub mod compare;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::payload::BandKey;

/// Mean / standard deviation pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatPair {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// p10 / p50 / p90 cut points. `p10 <= p50 <= p90` is assumed, not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Percentiles {
    pub p10: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

impl StatPair {
    pub fn mean(&self) -> Option<f64> {
        finite(self.mean)
    }

    pub fn std(&self) -> Option<f64> {
        finite(self.std)
    }
}

impl Percentiles {
    pub fn p10(&self) -> Option<f64> {
        finite(self.p10)
    }

    pub fn p50(&self) -> Option<f64> {
        finite(self.p50)
    }

    pub fn p90(&self) -> Option<f64> {
        finite(self.p90)
    }

    /// `(p10, p90)` when both edges are known.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.p10()?, self.p90()?))
    }
}

/// Frequency limits of one band as used when the model was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub key: String,
    pub fmin: f64,
    pub fmax: f64,
}

/// Explicit `null` reads as the empty default. Builders write `null` for tables they
/// had no data for.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

/// A statistics table. A `null` table is empty and `null` entries are dropped.
fn stat_table<'de, D, T>(d: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let table: Option<BTreeMap<String, Option<T>>> = Option::deserialize(d)?;
    Ok(table
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect())
}

/// A genre reference model.
///
/// Field names follow the JSON files written by the reference builder; the shorter
/// `feature_stats` / `band_stats` spellings are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceModel {
    pub profile_key: Option<String>,
    pub samples_count: Option<u64>,
    pub built_at: Option<DateTime<Utc>>,
    pub engine: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub bands_schema: Vec<BandRange>,

    #[serde(alias = "feature_stats", deserialize_with = "stat_table")]
    pub features_stats: BTreeMap<String, StatPair>,
    #[serde(alias = "feature_percentiles", deserialize_with = "stat_table")]
    pub features_percentiles: BTreeMap<String, Percentiles>,

    #[serde(alias = "band_stats", deserialize_with = "stat_table")]
    pub bands_norm_stats: BTreeMap<String, StatPair>,
    #[serde(alias = "band_percentiles", deserialize_with = "stat_table")]
    pub bands_norm_percentiles: BTreeMap<String, Percentiles>,

    #[serde(deserialize_with = "stat_table")]
    pub loudness_percentiles: BTreeMap<String, Percentiles>,
    #[serde(deserialize_with = "stat_table")]
    pub spectral_percentiles: BTreeMap<String, Percentiles>,
    #[serde(deserialize_with = "stat_table")]
    pub rhythm_percentiles: BTreeMap<String, Percentiles>,
    #[serde(deserialize_with = "stat_table")]
    pub stereo_percentiles: BTreeMap<String, Percentiles>,

    /// Explicit target overrides, preferred over any distribution statistic.
    #[serde(deserialize_with = "null_as_default")]
    pub targets: BTreeMap<String, Option<f64>>,
}

/// Feature names that are stored under more than one spelling across model versions.
fn feature_aliases(key: &str) -> &[&str] {
    match key {
        "integrated_lufs" => &["integrated_lufs", "lufs"],
        "lufs" => &["lufs", "integrated_lufs"],
        "bpm" => &["bpm", "tempo_bpm"],
        _ => &[],
    }
}

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, key: &str) -> Option<&'a T> {
    let aliases = feature_aliases(key);
    if aliases.is_empty() {
        return map.get(key);
    }
    aliases.iter().find_map(|k| map.get(*k))
}

impl ReferenceModel {
    pub fn feature_stats(&self, key: &str) -> Option<&StatPair> {
        lookup(&self.features_stats, key)
    }

    pub fn feature_percentiles(&self, key: &str) -> Option<&Percentiles> {
        lookup(&self.features_percentiles, key)
    }

    pub fn band_stats(&self, band: BandKey) -> Option<&StatPair> {
        self.bands_norm_stats.get(band.as_str())
    }

    pub fn band_percentiles(&self, band: BandKey) -> Option<&Percentiles> {
        self.bands_norm_percentiles.get(band.as_str())
    }

    /// Explicit override for `key`, if any.
    pub fn target_override(&self, key: &str) -> Option<f64> {
        lookup(&self.targets, key).copied().flatten().filter(|v| v.is_finite())
    }

    /// Central target for a scalar feature.
    ///
    /// Order: `targets`, `features_percentiles` p50, the grouped percentile tables
    /// (loudness, spectral, rhythm for bpm, stereo for stereo_width), then the
    /// `features_stats` mean.
    pub fn feature_target(&self, key: &str) -> Option<f64> {
        if let Some(t) = self.target_override(key) {
            return Some(t);
        }
        if let Some(p50) = self.feature_percentiles(key).and_then(Percentiles::p50) {
            return Some(p50);
        }
        if let Some(p50) = lookup(&self.loudness_percentiles, key).and_then(Percentiles::p50) {
            return Some(p50);
        }
        if let Some(p50) = self.spectral_percentiles.get(key).and_then(Percentiles::p50) {
            return Some(p50);
        }
        if key == "bpm" {
            if let Some(p50) = lookup(&self.rhythm_percentiles, key).and_then(Percentiles::p50) {
                return Some(p50);
            }
        }
        if key == "stereo_width" {
            if let Some(p50) = self.stereo_percentiles.get(key).and_then(Percentiles::p50) {
                return Some(p50);
            }
        }
        self.feature_stats(key).and_then(StatPair::mean)
    }

    /// Central target for a band: `band_<name>` override, p50, then mean.
    pub fn band_target(&self, name: &str) -> Option<f64> {
        if let Some(t) = self.targets.get(&format!("band_{name}")).copied().flatten() {
            if t.is_finite() {
                return Some(t);
            }
        }
        self.bands_norm_percentiles
            .get(name)
            .and_then(Percentiles::p50)
            .or_else(|| self.bands_norm_stats.get(name).and_then(StatPair::mean))
    }

    /// Every band name the model has any central statistic for.
    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self
            .bands_norm_percentiles
            .keys()
            .chain(self.bands_norm_stats.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn stat(mean: f64, std: f64) -> StatPair {
        StatPair {
            mean: Some(mean),
            std: Some(std),
        }
    }

    pub fn pct(p10: f64, p50: f64, p90: f64) -> Percentiles {
        Percentiles {
            p10: Some(p10),
            p50: Some(p50),
            p90: Some(p90),
        }
    }

    /// A small tech-house style model with loudness, centroid and band stats.
    pub fn club_model() -> ReferenceModel {
        let mut m = ReferenceModel {
            profile_key: Some("tech_house".to_string()),
            ..Default::default()
        };
        m.features_stats.insert("lufs".into(), stat(-8.0, 1.0));
        m.features_percentiles.insert("lufs".into(), pct(-9.5, -8.0, -6.8));
        m.features_stats.insert("bpm".into(), stat(126.0, 2.0));
        m.features_percentiles.insert("bpm".into(), pct(124.0, 126.0, 128.0));
        m.features_stats.insert("spectral_centroid_hz".into(), stat(2800.0, 400.0));
        m.features_stats.insert("stereo_width".into(), stat(0.2, 0.05));

        for (band, mean, std, p10, p50, p90) in [
            ("sub", 0.45, 0.05, 0.38, 0.45, 0.52),
            ("low", 0.60, 0.05, 0.53, 0.60, 0.67),
            ("lowmid", 0.45, 0.05, 0.38, 0.45, 0.52),
            ("mid", 0.40, 0.05, 0.33, 0.40, 0.47),
            ("presence", 0.35, 0.05, 0.28, 0.35, 0.42),
            ("high", 0.30, 0.05, 0.23, 0.30, 0.37),
            ("air", 0.22, 0.04, 0.16, 0.22, 0.28),
        ] {
            m.bands_norm_stats.insert(band.into(), stat(mean, std));
            m.bands_norm_percentiles.insert(band.into(), pct(p10, p50, p90));
        }
        m
    }
}
