//! Deviation classifier and issue generator.
//!
//! Each checklist dimension is placed against the reference p10..p90 window, graded by
//! z-score magnitude, and turned into an actionable issue when it falls outside.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::payload::{BandKey, FeaturePayload};
use crate::reference::{Percentiles, ReferenceModel, StatPair};
use crate::thresholds::{MAX_ISSUES, Z_HIGH, Z_MED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Low,
    Ok,
    High,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Med,
    High,
}

impl Severity {
    /// Sort rank: high first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Med => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }
}

/// `(value - mean) / std`; `None` when any input is missing or `std` is zero.
pub fn z_score(value: Option<f64>, stats: Option<&StatPair>) -> Option<f64> {
    let value = value?;
    let stats = stats?;
    let (mean, std) = (stats.mean()?, stats.std()?);
    if std == 0.0 {
        return None;
    }
    Some((value - mean) / std)
}

pub fn severity_from_z(z: Option<f64>) -> Severity {
    match z.map(f64::abs) {
        Some(a) if a >= Z_HIGH => Severity::High,
        Some(a) if a >= Z_MED => Severity::Med,
        _ => Severity::Low,
    }
}

pub fn status_by_percentiles(value: Option<f64>, percentiles: Option<&Percentiles>) -> Status {
    let (Some(v), Some((p10, p90))) = (value, percentiles.and_then(Percentiles::range)) else {
        return Status::Unknown;
    };
    if v < p10 {
        Status::Low
    } else if v > p90 {
        Status::High
    } else {
        Status::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub rationale: String,
    pub fix_text: String,
    pub action_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
}

/// Where a checklist item reads its measurement and statistics from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Band(BandKey),
    Loudness,
}

/// One entry of the issue checklist.
#[derive(Debug, Clone, Copy)]
pub struct CheckItem {
    pub id: &'static str,
    pub dimension: Dimension,
    pub title_low: &'static str,
    pub title_high: &'static str,
    pub rationale: &'static str,
    pub fix_low: &'static str,
    pub fix_high: &'static str,
    pub action_label: &'static str,
    pub eta_minutes: u32,
}

/// Evaluated in this order; the output preserves it.
pub const CHECKLIST: [CheckItem; 3] = [
    CheckItem {
        id: "sub",
        dimension: Dimension::Band(BandKey::Sub),
        title_low: "Sub sotto target",
        title_high: "Sub sopra target",
        rationale: "Influenza pressione e pulizia su impianto. Se non è in range, kick e bass non respirano.",
        fix_low: "Aumenta energia 40-60 Hz sul basso o riduci competizione del kick in quella banda. Controlla sidechain.",
        fix_high: "Riduci 1-2 dB nella banda 40-60 Hz sul bass bus e controlla il limiter (meno pumping).",
        action_label: "Apri checklist low-end",
        eta_minutes: 10,
    },
    CheckItem {
        id: "lufs",
        dimension: Dimension::Loudness,
        title_low: "Loudness sotto target",
        title_high: "Loudness sopra target",
        rationale: "Se sei troppo fuori, o non competi o schiacci transiente e perdi groove.",
        fix_low: "Aumenta 0.5-1 dB di livello prima del limiter, controlla low-end e clip leggero sui drums.",
        fix_high: "Riduci input al limiter di 0.5-1 dB e recupera percezione con EQ/clip controllato sui drums.",
        action_label: "Guida loudness",
        eta_minutes: 8,
    },
    CheckItem {
        id: "air",
        dimension: Dimension::Band(BandKey::Air),
        title_low: "Poca aria sopra 10 kHz",
        title_high: "Air troppo aggressivo",
        rationale: "Impatta brillantezza e fatica d'ascolto. In cuffia cambia tantissimo.",
        fix_low: "Shelf +0.5 dB sopra 12 kHz su hats/fx, controlla harshness con de-esser leggero.",
        fix_high: "Riduci shelf e controlla 10-16 kHz su hats. Se serve, dynamic EQ sul picco.",
        action_label: "Apri EQ map",
        eta_minutes: 5,
    },
];

fn polish_issue() -> IssueRecord {
    IssueRecord {
        id: "polish".to_string(),
        title: "Rifinitura finale".to_string(),
        severity: Severity::Low,
        rationale: "Sei già in range sui punti principali. Ora vincono dettagli e automazioni.".to_string(),
        fix_text: "Rifinisci punch del kick e micro-contrasto nei drop. Poi bounce e recheck.".to_string(),
        action_label: "Apri piano".to_string(),
        eta_minutes: Some(7),
    }
}

impl Dimension {
    fn measure(&self, features: &FeaturePayload) -> Option<f64> {
        match self {
            Self::Band(band) => features.bands().get(*band),
            Self::Loudness => features.integrated_lufs(),
        }
    }

    fn stats<'a>(&self, reference: &'a ReferenceModel) -> Option<&'a StatPair> {
        match self {
            Self::Band(band) => reference.band_stats(*band),
            Self::Loudness => reference.feature_stats("lufs"),
        }
    }

    fn percentiles<'a>(&self, reference: &'a ReferenceModel) -> Option<&'a Percentiles> {
        match self {
            Self::Band(band) => reference.band_percentiles(*band),
            Self::Loudness => reference.feature_percentiles("lufs"),
        }
    }

    /// Placement and z-score of this dimension for one track.
    pub fn assess(&self, features: &FeaturePayload, reference: &ReferenceModel) -> (Status, Option<f64>) {
        let value = self.measure(features);
        (
            status_by_percentiles(value, self.percentiles(reference)),
            z_score(value, self.stats(reference)),
        )
    }
}

/// Run `checklist` against a track. Never returns an empty list.
pub fn build_issues(
    checklist: &[CheckItem],
    features: &FeaturePayload,
    reference: &ReferenceModel,
) -> Vec<IssueRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut issues = Vec::new();

    for item in checklist {
        if issues.len() >= MAX_ISSUES {
            break;
        }
        let (status, z) = item.dimension.assess(features, reference);
        let (title, fix) = match status {
            Status::Low => (item.title_low, item.fix_low),
            Status::High => (item.title_high, item.fix_high),
            Status::Ok | Status::Unknown => continue,
        };
        if !seen.insert(item.id) {
            continue;
        }
        issues.push(IssueRecord {
            id: item.id.to_string(),
            title: title.to_string(),
            severity: severity_from_z(z),
            rationale: item.rationale.to_string(),
            fix_text: fix.to_string(),
            action_label: item.action_label.to_string(),
            eta_minutes: Some(item.eta_minutes),
        });
    }

    if issues.is_empty() {
        issues.push(polish_issue());
    }
    issues
}

/// Classify the standard checklist and build issue records.
pub fn classify_and_build_issues(features: &FeaturePayload, reference: &ReferenceModel) -> Vec<IssueRecord> {
    build_issues(&CHECKLIST, features, reference)
}

/// Stable sort, high severity first.
pub fn sort_by_severity(issues: &mut [IssueRecord]) {
    issues.sort_by_key(|i| i.severity.rank());
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub count: usize,
    pub high_count: usize,
    pub eta_total: u32,
}

impl IssueSummary {
    pub fn from_issues(issues: &[IssueRecord]) -> Self {
        Self {
            count: issues.len(),
            high_count: issues.iter().filter(|i| i.severity == Severity::High).count(),
            eta_total: issues.iter().filter_map(|i| i.eta_minutes).sum(),
        }
    }
}

// ── Deviation indices ──────────────────────────────────────────────────

/// Headline 0-100 indices derived from the checklist z-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationIndices {
    pub dynamics: u8,
    pub low_end: u8,
    pub high_end: u8,
}

fn index(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}

impl DeviationIndices {
    pub fn compute(features: &FeaturePayload, reference: &ReferenceModel) -> Self {
        let (_, z_lufs) = Dimension::Loudness.assess(features, reference);
        let (_, z_sub) = Dimension::Band(BandKey::Sub).assess(features, reference);
        let (_, z_air) = Dimension::Band(BandKey::Air).assess(features, reference);
        Self {
            dynamics: index(60.0 - z_lufs.unwrap_or(0.0) * 8.0),
            low_end: index(70.0 - z_sub.unwrap_or(0.0) * 10.0),
            high_end: index(70.0 + z_air.unwrap_or(0.0) * 10.0),
        }
    }
}
