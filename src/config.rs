use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::profiles::{CustomProfileConfig, Mode};

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `<profile_key>.json` reference models (overrides XDG default).
    pub reference_dir: Option<PathBuf>,
    /// Profile used when neither the CLI nor the payload names one.
    pub default_profile: Option<String>,
    /// `master` or `premaster`.
    pub default_mode: Option<String>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Custom readiness profiles (merged with built-in registry).
    pub profiles: Vec<CustomProfileConfig>,
}

impl AppConfig {
    /// Load config from `~/.config/tekkin-engine/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    /// Logs a warning and returns defaults if the file can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    pub fn resolve_mode(&self) -> Mode {
        self.default_mode.as_deref().map(Mode::from_key).unwrap_or_default()
    }

    pub fn resolve_reference_dir(&self) -> PathBuf {
        self.reference_dir.clone().unwrap_or_else(default_reference_dir)
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default reference model directory using XDG data directory.
pub fn default_reference_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().join("reference_models")
    } else {
        // Fallback: current directory
        PathBuf::from("reference_models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            reference_dir = "/srv/tekkin/models"
            default_profile = "tech_house"
            default_mode = "premaster"
            workers = 3

            [[profiles]]
            key = "afro_house"
            label = "Afro House"
            [profiles.premaster]
            lufs_min = -15.0
            lufs_max = -12.0
            ready_match = 75.0
            ok_match = 60.0
            "#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path);
        assert_eq!(cfg.resolve_reference_dir(), PathBuf::from("/srv/tekkin/models"));
        assert_eq!(cfg.default_profile.as_deref(), Some("tech_house"));
        assert_eq!(cfg.resolve_mode(), Mode::Premaster);
        assert_eq!(cfg.resolve_workers(), 3);
        assert_eq!(cfg.profiles.len(), 1);
        assert!(cfg.profiles[0].master.is_none());
    }

    #[test]
    fn test_bad_config_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = \"many\"").unwrap();
        let cfg = AppConfig::load_from(&path);
        assert_eq!(cfg.workers, 0);
        assert!(cfg.profiles.is_empty());

        let missing = AppConfig::load_from(&dir.path().join("nope.toml"));
        assert!(missing.reference_dir.is_none());
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!(cfg.resolve_workers() >= 1);
        assert_eq!(cfg.resolve_mode(), Mode::Master);
        assert!(cfg.resolve_reference_dir().ends_with("reference_models"));
    }
}
