use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::reference::store::normalize_key;

/// Delivery stage a track is judged at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Master,
    Premaster,
}

impl Mode {
    /// `"premaster"` selects premaster; anything else, including empty, is master.
    pub fn from_key(key: &str) -> Self {
        if key.trim().eq_ignore_ascii_case("premaster") {
            Self::Premaster
        } else {
            Self::Master
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Premaster => "premaster",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_key(s))
    }
}

/// Loudness window and match gates for one profile in one mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeThresholds {
    pub lufs_min: f64,
    pub lufs_max: f64,
    pub ready_match: f64,
    pub ok_match: f64,
}

impl ModeThresholds {
    const fn new(lufs_min: f64, lufs_max: f64, ready_match: f64, ok_match: f64) -> Self {
        Self {
            lufs_min,
            lufs_max,
            ready_match,
            ok_match,
        }
    }

    pub fn lufs_in_range(&self, lufs: f64) -> bool {
        lufs >= self.lufs_min && lufs <= self.lufs_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessProfile {
    pub label: String,
    pub master: ModeThresholds,
    pub premaster: ModeThresholds,
}

impl ReadinessProfile {
    pub fn thresholds(&self, mode: Mode) -> &ModeThresholds {
        match mode {
            Mode::Master => &self.master,
            Mode::Premaster => &self.premaster,
        }
    }
}

/// Config file profile definition (deserialized from TOML).
#[derive(Debug, Deserialize, Clone)]
pub struct CustomProfileConfig {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub master: Option<ModeThresholds>,
    #[serde(default)]
    pub premaster: Option<ModeThresholds>,
}

const MASTER_READY: f64 = 80.0;
const MASTER_OK: f64 = 65.0;
const PREMASTER_READY: f64 = 75.0;
const PREMASTER_OK: f64 = 60.0;

fn profile(label: &str, master: (f64, f64), premaster: (f64, f64)) -> ReadinessProfile {
    ReadinessProfile {
        label: label.to_string(),
        master: ModeThresholds::new(master.0, master.1, MASTER_READY, MASTER_OK),
        premaster: ModeThresholds::new(premaster.0, premaster.1, PREMASTER_READY, PREMASTER_OK),
    }
}

fn builtin_profiles() -> Vec<(&'static str, ReadinessProfile)> {
    vec![
        ("minimal_deep_tech", profile("Minimal / Deep Tech", (-9.0, -7.5), (-14.0, -11.0))),
        ("tech_house", profile("Tech House", (-8.5, -6.5), (-13.5, -10.5))),
        ("minimal_house", profile("Minimal House", (-10.0, -8.0), (-15.0, -12.0))),
        ("micro_house", profile("Micro House", (-11.0, -8.5), (-16.0, -13.0))),
    ]
}

fn default_profile() -> ReadinessProfile {
    profile("Generic Club", (-10.5, -7.5), (-16.0, -12.0))
}

/// Readiness thresholds per genre profile, plus the generic fallback.
///
/// Built once at startup and passed to the readiness evaluator by reference.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, ReadinessProfile>,
    default: ReadinessProfile,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl ProfileRegistry {
    /// Built-in profiles with `custom` merged on top.
    pub fn new(custom: &[CustomProfileConfig]) -> Self {
        let mut profiles: HashMap<String, ReadinessProfile> = builtin_profiles()
            .into_iter()
            .map(|(k, p)| (k.to_string(), p))
            .collect();
        let default = default_profile();

        for c in custom {
            let key = normalize_key(&c.key);
            if key.is_empty() {
                log::warn!("Ignoring custom profile with empty key '{}'", c.key);
                continue;
            }

            if let Some(entry) = profiles.get_mut(&key) {
                // Additive merge: override only what the config supplies
                if let Some(ref label) = c.label {
                    entry.label = label.clone();
                }
                if let Some(master) = c.master {
                    entry.master = master;
                }
                if let Some(premaster) = c.premaster {
                    entry.premaster = premaster;
                }
                log::debug!("Custom profile '{}' overrides built-in", key);
            } else {
                profiles.insert(
                    key.clone(),
                    ReadinessProfile {
                        label: c.label.clone().unwrap_or_else(|| c.key.clone()),
                        master: c.master.unwrap_or(default.master),
                        premaster: c.premaster.unwrap_or(default.premaster),
                    },
                );
                log::debug!("Added custom profile '{}'", key);
            }
        }

        Self { profiles, default }
    }

    /// Exact lookup; `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<&ReadinessProfile> {
        self.profiles.get(&normalize_key(key))
    }

    /// Lookup with fallback to the generic profile. Never fails.
    pub fn resolve(&self, key: Option<&str>) -> &ReadinessProfile {
        key.and_then(|k| self.get(k)).unwrap_or(&self.default)
    }

    pub fn default_profile(&self) -> &ReadinessProfile {
        &self.default
    }

    /// All profiles sorted by key.
    pub fn list(&self) -> Vec<(&str, &ReadinessProfile)> {
        let mut all: Vec<(&str, &ReadinessProfile)> =
            self.profiles.iter().map(|(k, p)| (k.as_str(), p)).collect();
        all.sort_by_key(|(k, _)| *k);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tech_house() {
        let reg = ProfileRegistry::default();
        let p = reg.get("tech_house").unwrap();
        assert_eq!(p.label, "Tech House");
        assert_eq!(p.master, ModeThresholds::new(-8.5, -6.5, 80.0, 65.0));
        assert_eq!(p.premaster, ModeThresholds::new(-13.5, -10.5, 75.0, 60.0));
        assert!(reg.get("Tech-House").is_some());
    }

    #[test]
    fn test_unknown_falls_back_to_default() {
        let reg = ProfileRegistry::default();
        assert!(reg.get("xyz").is_none());
        let p = reg.resolve(Some("xyz"));
        assert_eq!(p.label, "Generic Club");
        assert_eq!(p.master.lufs_min, -10.5);
        assert_eq!(reg.resolve(None).label, "Generic Club");
    }

    #[test]
    fn test_mode_from_key() {
        assert_eq!(Mode::from_key("premaster"), Mode::Premaster);
        assert_eq!(Mode::from_key("PREMASTER"), Mode::Premaster);
        assert_eq!(Mode::from_key("master"), Mode::Master);
        assert_eq!(Mode::from_key(""), Mode::Master);
        assert_eq!(Mode::from_key("stems"), Mode::Master);
        assert_eq!("premaster".parse::<Mode>().unwrap(), Mode::Premaster);
    }

    #[test]
    fn test_custom_merge() {
        let custom = vec![
            CustomProfileConfig {
                key: "tech_house".into(),
                label: Some("Tech House (club)".into()),
                master: Some(ModeThresholds::new(-8.0, -6.0, 85.0, 70.0)),
                premaster: None,
            },
            CustomProfileConfig {
                key: "Afro-House".into(),
                label: None,
                master: None,
                premaster: Some(ModeThresholds::new(-15.0, -12.0, 70.0, 55.0)),
            },
        ];
        let reg = ProfileRegistry::new(&custom);

        let th = reg.get("tech_house").unwrap();
        assert_eq!(th.label, "Tech House (club)");
        assert_eq!(th.master.ready_match, 85.0);
        assert_eq!(th.premaster.lufs_min, -13.5);

        let afro = reg.get("afro_house").unwrap();
        assert_eq!(afro.label, "Afro-House");
        assert_eq!(afro.master, reg.default_profile().master);
        assert_eq!(afro.premaster.ok_match, 55.0);
        assert_eq!(reg.list().len(), 5);
    }

    #[test]
    fn test_parse_custom_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            profiles: Vec<CustomProfileConfig>,
        }
        let w: Wrapper = toml::from_str(
            r#"
            [[profiles]]
            key = "deep_house"
            label = "Deep House"
            [profiles.master]
            lufs_min = -11.0
            lufs_max = -8.0
            ready_match = 80
            ok_match = 65
            "#,
        )
        .unwrap();
        assert_eq!(w.profiles[0].master.unwrap().lufs_max, -8.0);
        assert!(w.profiles[0].premaster.is_none());
    }

    #[test]
    fn test_lufs_in_range_inclusive() {
        let t = ModeThresholds::new(-10.0, -8.0, 80.0, 65.0);
        assert!(t.lufs_in_range(-10.0));
        assert!(t.lufs_in_range(-8.0));
        assert!(!t.lufs_in_range(-7.9));
    }
}
