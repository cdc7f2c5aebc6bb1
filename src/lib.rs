pub mod analyzer;
pub mod config;
pub mod payload;
pub mod profiles;
pub mod rank;
pub mod readiness;
pub mod reference;
pub mod thresholds;

/// Application name for XDG paths
pub const APP_NAME: &str = "tekkin-engine";
