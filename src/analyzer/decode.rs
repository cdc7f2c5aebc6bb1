use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::payload::FeaturePayload;
use crate::rank::ArtistMetrics;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload files are plain JSON documents.
pub fn is_payload_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn read_json(path: &Path) -> Result<Value, DecodeError> {
    if !is_payload_file(path) {
        return Err(DecodeError::UnsupportedFormat(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| DecodeError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn from_value<T: DeserializeOwned>(path: &Path, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Json {
        path: path.display().to_string(),
        source,
    })
}

// ── Payload shape normalization ─────────────────────────────────────

/// `(canonical, alias)` spellings of the same measurement.
const ALIASES: [(&str, &str); 4] = [
    ("integrated_lufs", "lufs"),
    ("loudness_range", "lra"),
    ("tempo_bpm", "bpm"),
    ("band_energy_norm", "band_norm"),
];

/// Scalars the analyzer core nests under `spectral`.
const SPECTRAL_SCALARS: [&str; 3] = [
    "spectral_centroid_hz",
    "spectral_rolloff_hz",
    "spectral_flatness",
];

const NUMERIC_FIELDS: [&str; 8] = [
    "integrated_lufs",
    "loudness_range",
    "sample_peak_db",
    "spectral_centroid_hz",
    "spectral_rolloff_hz",
    "spectral_flatness",
    "stereo_width",
    "tempo_bpm",
];

type Object = serde_json::Map<String, Value>;

/// Move every alias onto its canonical key. A non-null canonical value wins.
fn canonicalize_aliases(obj: &mut Object) {
    for (canonical, alias) in ALIASES {
        let Some(value) = obj.remove(alias) else {
            continue;
        };
        if obj.get(canonical).is_none_or(Value::is_null) {
            obj.insert(canonical.to_string(), value);
        }
    }
}

/// Lift `spectral.band_norm` and the spectral scalars to the top level when the
/// top-level keys are absent.
fn lift_spectral(obj: &mut Object) {
    let Some(spectral) = obj.get("spectral").and_then(Value::as_object).cloned() else {
        return;
    };
    if obj.get("band_energy_norm").is_none_or(Value::is_null) {
        if let Some(bands) = spectral.get("band_norm").filter(|b| b.is_object()) {
            obj.insert("band_energy_norm".to_string(), bands.clone());
        }
    }
    for key in SPECTRAL_SCALARS {
        if obj.get(key).is_none_or(Value::is_null) {
            if let Some(v) = spectral.get(key) {
                obj.insert(key.to_string(), v.clone());
            }
        }
    }
}

/// Replace anything that is not a number with `null`, so a malformed field reads as
/// missing instead of failing the whole payload.
fn null_non_numbers(obj: &mut Object, fields: &[&str]) {
    for key in fields {
        if let Some(v) = obj.get_mut(*key) {
            if !v.is_number() && !v.is_null() {
                log::debug!("Ignoring non-numeric '{}': {}", key, v);
                *v = Value::Null;
            }
        }
    }
}

/// Bring loosely shaped analyzer output into the shape `FeaturePayload` reads.
fn normalize_payload(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    canonicalize_aliases(obj);
    lift_spectral(obj);

    // Aggregated width comes as {"mean": ..} or {"value": ..}
    if let Some(width) = obj.get_mut("stereo_width") {
        let flat = width
            .as_object()
            .map(|w| w.get("mean").or_else(|| w.get("value")).cloned().unwrap_or(Value::Null));
        if let Some(flat) = flat {
            *width = flat;
        }
    }
    null_non_numbers(obj, &NUMERIC_FIELDS);
    for key in ["profile_key", "key"] {
        if obj.get(key).is_some_and(|v| !v.is_string() && !v.is_null()) {
            obj.insert(key.to_string(), Value::Null);
        }
    }

    let bands_malformed = match obj.get_mut("band_energy_norm") {
        Some(Value::Object(bands)) => {
            for v in bands.values_mut().filter(|v| !v.is_number()) {
                *v = Value::Null;
            }
            false
        }
        Some(_) => true,
        None => false,
    };
    if bands_malformed {
        obj.remove("band_energy_norm");
    }

    let stats_malformed = match obj.get_mut("loudness_stats") {
        Some(Value::Object(stats)) => {
            canonicalize_aliases(stats);
            null_non_numbers(stats, &["integrated_lufs", "loudness_range", "sample_peak_db"]);
            false
        }
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    if stats_malformed {
        obj.remove("loudness_stats");
    }
}

/// Parse an analyzer payload from a JSON value.
pub fn payload_from_value(mut value: Value) -> Result<FeaturePayload, DecodeError> {
    normalize_payload(&mut value);
    serde_json::from_value(value).map_err(|source| DecodeError::Json {
        path: "<inline>".to_string(),
        source,
    })
}

/// Load an analyzer payload from a JSON file.
pub fn load_payload(path: &Path) -> Result<FeaturePayload, DecodeError> {
    let mut value = read_json(path)?;
    normalize_payload(&mut value);
    let payload = from_value(path, value)?;
    log::debug!(
        "Loaded payload: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );
    Ok(payload)
}

/// Load artist metrics from a JSON file.
pub fn load_metrics(path: &Path) -> Result<ArtistMetrics, DecodeError> {
    let value = read_json(path)?;
    from_value(path, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::BandKey;
    use tempfile::TempDir;

    #[test]
    fn test_load_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.json");
        std::fs::write(&path, r#"{"lufs": -8.0, "band_norm": {"sub": 0.4}}"#).unwrap();
        let p = load_payload(&path).unwrap();
        assert_eq!(p.integrated_lufs(), Some(-8.0));
        assert_eq!(p.bands().get(BandKey::Sub), Some(0.4));
    }

    #[test]
    fn test_nested_spectral_bands_lifted() {
        let value = serde_json::json!({
            "bpm": 126.0,
            "spectral": {"band_norm": {"air": 0.2, "sub": 0.45}}
        });
        let p = payload_from_value(value).unwrap();
        assert_eq!(p.bands().get(BandKey::Air), Some(0.2));
        assert_eq!(p.tempo_bpm(), Some(126.0));
    }

    #[test]
    fn test_top_level_bands_win() {
        let value = serde_json::json!({
            "band_energy_norm": {"sub": 0.3},
            "spectral": {"band_norm": {"sub": 0.9}}
        });
        let p = payload_from_value(value).unwrap();
        assert_eq!(p.bands().get(BandKey::Sub), Some(0.3));
    }

    #[test]
    fn test_alias_and_canonical_together() {
        let value = serde_json::json!({
            "lufs": -9.0, "integrated_lufs": -8.0,
            "bpm": 124.0, "tempo_bpm": 126.0,
            "lra": 6.0, "loudness_range": null
        });
        let p = payload_from_value(value).unwrap();
        assert_eq!(p.integrated_lufs(), Some(-8.0));
        assert_eq!(p.tempo_bpm(), Some(126.0));
        assert_eq!(p.loudness_range(), Some(6.0));
    }

    #[test]
    fn test_stereo_width_object() {
        let p = payload_from_value(serde_json::json!({"stereo_width": {"mean": 0.2}, "bpm": 126})).unwrap();
        assert_eq!(p.stereo_width(), Some(0.2));
        assert_eq!(p.tempo_bpm(), Some(126.0));

        let p = payload_from_value(serde_json::json!({"stereo_width": {"value": 0.15}})).unwrap();
        assert_eq!(p.stereo_width(), Some(0.15));

        let p = payload_from_value(serde_json::json!({"stereo_width": {"median": 0.1}})).unwrap();
        assert_eq!(p.stereo_width(), None);
    }

    #[test]
    fn test_analyzer_core_shape() {
        let value = serde_json::json!({
            "bpm": 125.0,
            "key": "F minor",
            "loudness_stats": {"integrated_lufs": -8.3, "lra": 5.8, "sample_peak_db": -0.6},
            "spectral": {
                "spectral_centroid_hz": 2750.0,
                "spectral_rolloff_hz": 5400.0,
                "spectral_flatness": 0.07,
                "band_norm": {"sub": 0.44, "air": 0.21}
            }
        });
        let p = payload_from_value(value).unwrap();
        assert_eq!(p.integrated_lufs(), Some(-8.3));
        assert_eq!(p.loudness_range(), Some(5.8));
        assert_eq!(p.spectral_centroid_hz(), Some(2750.0));
        assert_eq!(p.spectral_rolloff_hz(), Some(5400.0));
        assert_eq!(p.spectral_flatness(), Some(0.07));
        assert_eq!(p.bands().get(BandKey::Sub), Some(0.44));
    }

    #[test]
    fn test_top_level_spectral_scalars_win() {
        let value = serde_json::json!({
            "spectral_centroid_hz": 3000.0,
            "spectral": {"spectral_centroid_hz": 1000.0}
        });
        let p = payload_from_value(value).unwrap();
        assert_eq!(p.spectral_centroid_hz(), Some(3000.0));
    }

    #[test]
    fn test_malformed_fields_degrade_to_none() {
        let value = serde_json::json!({
            "integrated_lufs": "loud",
            "tempo_bpm": [126],
            "key": 7,
            "band_energy_norm": {"sub": "x", "low": 0.6},
            "loudness_stats": "n/a",
            "spectral_flatness": 0.05
        });
        let p = payload_from_value(value).unwrap();
        assert_eq!(p.integrated_lufs(), None);
        assert_eq!(p.tempo_bpm(), None);
        assert_eq!(p.key(), None);
        assert_eq!(p.bands().get(BandKey::Sub), None);
        assert_eq!(p.bands().get(BandKey::Low), Some(0.6));
        assert!(p.loudness_stats.is_none());
        assert_eq!(p.spectral_flatness(), Some(0.05));

        let p = payload_from_value(serde_json::json!({"band_energy_norm": null})).unwrap();
        assert!(p.bands().is_empty());
    }

    #[test]
    fn test_rejects_non_json_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.wav");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(load_payload(&path), Err(DecodeError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_bad_json_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_payload(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"), "{err}");
    }

    #[test]
    fn test_load_metrics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artist.json");
        std::fs::write(&path, r#"{"followers": 280, "analyzed_versions": 3}"#).unwrap();
        let m = load_metrics(&path).unwrap();
        assert_eq!(m.followers, Some(280.0));
        assert_eq!(m.analyzed_versions, Some(3.0));
    }

    #[test]
    fn test_load_metrics_float_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artist.json");
        std::fs::write(&path, r#"{"analyzed_versions": 4.0, "analysis_score_count": -1}"#).unwrap();
        let m = load_metrics(&path).unwrap();
        assert_eq!(m.analyzed_versions, Some(4.0));
        assert_eq!(m.analysis_score_count, Some(-1.0));
    }
}
