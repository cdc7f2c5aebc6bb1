//! Read-only store of reference models, loaded once from a directory of JSON files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::WalkDir;

use super::ReferenceModel;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Reference directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("Failed to walk reference directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid reference model {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("No reference model for profile '{0}'")]
    UnknownKey(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Normalize a profile key the way model files are named:
/// lowercase, `-` → `_`, anything outside `[a-z0-9_]` dropped.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Immutable map of profile key → reference model.
///
/// Models are shared through `Arc` so parallel scoring can hold them without copying.
#[derive(Debug, Default, Clone)]
pub struct ReferenceStore {
    models: HashMap<String, Arc<ReferenceModel>>,
}

impl ReferenceStore {
    /// Build a store from in-memory models (tests, embedding callers).
    pub fn from_models<I, K>(models: I) -> Self
    where
        I: IntoIterator<Item = (K, ReferenceModel)>,
        K: AsRef<str>,
    {
        let models = models
            .into_iter()
            .map(|(k, m)| (normalize_key(k.as_ref()), Arc::new(m)))
            .collect();
        Self { models }
    }

    /// Load every `*.json` file under `dir`, except the builder's `index.json`.
    ///
    /// The key is the file's own `profile_key` when present, otherwise the file stem.
    /// A malformed file fails the whole load: a half-loaded store would silently
    /// score tracks against the default profile.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(StoreError::MissingDir(dir.to_path_buf()));
        }

        let mut models = HashMap::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            if is_index_file(path) {
                log::debug!("Skipping model index {}", path.display());
                continue;
            }

            let model = load_file(path)?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let key = normalize_key(model.profile_key.as_deref().unwrap_or(stem));
            if key.is_empty() {
                log::warn!("Skipping reference model with empty key: {}", path.display());
                continue;
            }

            log::debug!("Loaded reference model '{}' from {}", key, path.display());
            if models.insert(key.clone(), Arc::new(model)).is_some() {
                log::warn!("Duplicate reference model for '{}', keeping {}", key, path.display());
            }
        }

        log::info!("Loaded {} reference models from {}", models.len(), dir.display());
        Ok(Self { models })
    }

    pub fn get(&self, key: &str) -> Option<Arc<ReferenceModel>> {
        self.models.get(&normalize_key(key)).cloned()
    }

    /// Like [`get`](Self::get), but an unknown key is an error.
    pub fn require(&self, key: &str) -> Result<Arc<ReferenceModel>> {
        self.get(key)
            .ok_or_else(|| StoreError::UnknownKey(normalize_key(key)))
    }

    /// Profile keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.models.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// The reference builder writes a genre index next to the models.
fn is_index_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|f| f.to_str())
        .is_some_and(|f| f.eq_ignore_ascii_case("index.json"))
}

/// Read and parse a single reference model file.
pub fn load_file(path: &Path) -> Result<ReferenceModel> {
    let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::fixtures::club_model;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Tech-House"), "tech_house");
        assert_eq!(normalize_key("  minimal_deep_tech "), "minimal_deep_tech");
        assert_eq!(normalize_key("micro/house!"), "microhouse");
        assert_eq!(normalize_key("../etc"), "etc");
    }

    #[test]
    fn test_load_dir_keys_by_profile_or_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tech_house.json"),
            serde_json::to_string(&club_model()).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Minimal-House.json"),
            r#"{"features_stats": {"lufs": {"mean": -9.0, "std": 1.0}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a model").unwrap();

        let store = ReferenceStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.keys(), vec!["minimal_house", "tech_house"]);
        assert!(store.get("tech-house").is_some());
        let mh = store.get("minimal_house").unwrap();
        assert_eq!(mh.feature_target("integrated_lufs"), Some(-9.0));
    }

    #[test]
    fn test_load_dir_tolerates_null_tables() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tech_house.json"),
            r#"{
                "profile_key": "tech_house",
                "bands_norm_stats": null,
                "bands_norm_percentiles": {"sub": {"p10": 0.38, "p50": 0.45, "p90": 0.52}},
                "features_stats": {"lufs": {"mean": -8.0, "std": 1.0}},
                "features_percentiles": null,
                "loudness_percentiles": null,
                "rhythm_percentiles": null,
                "stereo_percentiles": null
            }"#,
        )
        .unwrap();
        let mut sibling = club_model();
        sibling.profile_key = None;
        std::fs::write(
            dir.path().join("minimal_house.json"),
            serde_json::to_string(&sibling).unwrap(),
        )
        .unwrap();

        let store = ReferenceStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.keys(), vec!["minimal_house", "tech_house"]);
        let th = store.require("tech_house").unwrap();
        assert_eq!(th.band_target("sub"), Some(0.45));
        assert_eq!(th.feature_target("integrated_lufs"), Some(-8.0));
        assert!(th.bands_norm_stats.is_empty());
    }

    #[test]
    fn test_load_dir_skips_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("index.json"),
            r#"{"analyzer_version": "v3", "genres": ["tech_house"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("tech_house.json"),
            serde_json::to_string(&club_model()).unwrap(),
        )
        .unwrap();

        let store = ReferenceStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.keys(), vec!["tech_house"]);
        assert!(store.get("index").is_none());
    }

    #[test]
    fn test_load_dir_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let err = ReferenceStore::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "{err}");
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = ReferenceStore::load_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::MissingDir(_)));
    }

    #[test]
    fn test_unknown_key_is_none() {
        let store = ReferenceStore::from_models([("tech_house", club_model())]);
        assert!(store.get("xyz").is_none());
        assert!(matches!(store.require("XYZ"), Err(StoreError::UnknownKey(k)) if k == "xyz"));
        assert!(store.require("Tech-House").is_ok());
        assert!(!store.is_empty());
    }
}
