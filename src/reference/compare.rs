//! Per-band placement of a track inside the reference p10..p90 window.

use serde::Serialize;

use super::ReferenceModel;
use crate::payload::{BandEnergy, BandKey};
use crate::thresholds::BAND_EDGE_GUARD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandStatus {
    Ok,
    /// Inside the window but within the edge guard of p10 or p90.
    Warn,
    /// Outside p10..p90.
    Off,
    NoReference,
    NoValue,
}

impl BandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Off => "off",
            Self::NoReference => "no_reference",
            Self::NoValue => "no_value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandComparison {
    pub key: BandKey,
    pub value: Option<f64>,
    pub p10: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub status: BandStatus,
}

/// Compare every band, in fixed sub → air order, against the reference percentiles.
pub fn compare_bands(bands: &BandEnergy, reference: &ReferenceModel) -> Vec<BandComparison> {
    BandKey::ALL
        .iter()
        .map(|&key| {
            let value = bands.get(key);
            let perc = reference.band_percentiles(key).copied().unwrap_or_default();
            let (p10, p50, p90) = (perc.p10(), perc.p50(), perc.p90());

            let status = match (value, p10, p50, p90) {
                (None, ..) => BandStatus::NoValue,
                (Some(v), Some(lo), Some(_), Some(hi)) => {
                    if v < lo || v > hi {
                        BandStatus::Off
                    } else {
                        let guard = (hi - lo) * BAND_EDGE_GUARD;
                        if v < lo + guard || v > hi - guard {
                            BandStatus::Warn
                        } else {
                            BandStatus::Ok
                        }
                    }
                }
                _ => BandStatus::NoReference,
            };

            BandComparison {
                key,
                value,
                p10,
                p50,
                p90,
                status,
            }
        })
        .collect()
}
