//! Publish-readiness verdict.
//!
//! Rules are evaluated top to bottom and the first that holds wins:
//! unknown match → `unknown`; high match with loudness and crest in target → `ready`;
//! decent match with either in target → `almost`; within the work margin → `work`;
//! otherwise `early`.

use serde::{Deserialize, Serialize};

use crate::profiles::{Mode, ProfileRegistry};
use crate::thresholds::WORK_MATCH_MARGIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    Ready,
    Almost,
    Work,
    Early,
    Unknown,
}

impl ReadinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Almost => "almost",
            Self::Work => "work",
            Self::Early => "early",
            Self::Unknown => "unknown",
        }
    }

    /// Badge text shown next to the track.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "TEKKIN READY",
            Self::Almost => "ALMOST",
            Self::Work => "WORK IN PROGRESS",
            Self::Early => "EARLY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadinessInput<'a> {
    pub profile_key: Option<&'a str>,
    pub mode: Mode,
    /// Reference match on the 0-100 scale.
    pub match_percent: Option<f64>,
    pub lufs: Option<f64>,
    /// Caller-supplied loudness verdict; overrides the profile window when set.
    pub lufs_in_target: Option<bool>,
    /// `None` counts as not in target.
    pub crest_in_target: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    pub status: ReadinessStatus,
    pub reasons: Vec<String>,
}

pub fn evaluate_readiness(profiles: &ProfileRegistry, input: &ReadinessInput<'_>) -> ReadinessVerdict {
    let profile = profiles.resolve(input.profile_key);
    let mode = input.mode;
    let cfg = profile.thresholds(mode);

    let Some(m) = input.match_percent.filter(|m| !m.is_nan()) else {
        return ReadinessVerdict {
            status: ReadinessStatus::Unknown,
            reasons: vec!["Match Tekkin non disponibile.".to_string()],
        };
    };

    let lufs_ok = input.lufs_in_target.unwrap_or_else(|| {
        input
            .lufs
            .filter(|l| l.is_finite())
            .is_some_and(|l| cfg.lufs_in_range(l))
    });
    let crest_ok = input.crest_in_target == Some(true);

    if m >= cfg.ready_match && lufs_ok && crest_ok {
        return ReadinessVerdict {
            status: ReadinessStatus::Ready,
            reasons: vec![
                format!("Match {m:.1}% sopra soglia READY ({}%).", cfg.ready_match),
                format!("LUFS in range per {} ({mode}).", profile.label),
                "Crest factor in target.".to_string(),
            ],
        };
    }

    if m >= cfg.ok_match && (lufs_ok || crest_ok) {
        let mut reasons = vec![
            format!("Match {m:.1}% sopra soglia ALMOST ({}%).", cfg.ok_match),
            if lufs_ok {
                "LUFS già in range, piccoli interventi su dinamica e tonal balance.".to_string()
            } else {
                "Match buono, ma LUFS fuori range consigliato per il genere.".to_string()
            },
        ];
        if !crest_ok {
            reasons.push("Crest fuori target, lavora su mix e limiting.".to_string());
        }
        return ReadinessVerdict {
            status: ReadinessStatus::Almost,
            reasons,
        };
    }

    if m >= cfg.ok_match - WORK_MATCH_MARGIN {
        return ReadinessVerdict {
            status: ReadinessStatus::Work,
            reasons: vec![
                format!("Match moderato ({m:.1}%), base buona ma non ancora coerente col profilo."),
                "Serve lavorare su tonal balance, loudness e dinamica.".to_string(),
            ],
        };
    }

    ReadinessVerdict {
        status: ReadinessStatus::Early,
        reasons: vec![
            format!(
                "Match basso ({m:.1}%), traccia ancora lontana dal profilo {}.",
                profile.label
            ),
            "Usa bande e fix mirati per ribilanciare il mix verso le reference.".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(profile: &str, mode: Mode, m: Option<f64>) -> ReadinessInput<'_> {
        ReadinessInput {
            profile_key: Some(profile),
            mode,
            match_percent: m,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_match_is_unknown() {
        let reg = ProfileRegistry::default();
        let mut i = input("tech_house", Mode::Master, None);
        i.lufs = Some(-7.0);
        i.lufs_in_target = Some(true);
        i.crest_in_target = Some(true);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Unknown);
        assert_eq!(v.reasons, ["Match Tekkin non disponibile."]);

        i.match_percent = Some(f64::NAN);
        assert_eq!(evaluate_readiness(&reg, &i).status, ReadinessStatus::Unknown);
    }

    #[test]
    fn test_tech_house_master_ready() {
        let reg = ProfileRegistry::default();
        let mut i = input("tech_house", Mode::Master, Some(85.0));
        i.lufs = Some(-7.0);
        i.lufs_in_target = Some(true);
        i.crest_in_target = Some(true);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Ready);
        assert_eq!(
            v.reasons,
            [
                "Match 85.0% sopra soglia READY (80%).",
                "LUFS in range per Tech House (master).",
                "Crest factor in target.",
            ]
        );
    }

    #[test]
    fn test_unknown_profile_uses_generic_thresholds() {
        let reg = ProfileRegistry::default();
        // generic master window -10.5..-7.5
        let mut i = input("xyz", Mode::Master, Some(85.0));
        i.lufs = Some(-10.0);
        i.crest_in_target = Some(true);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Ready);
        assert_eq!(v.reasons[1], "LUFS in range per Generic Club (master).");

        i.lufs = Some(-7.0);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Almost);
    }

    #[test]
    fn test_almost_reasons() {
        let reg = ProfileRegistry::default();
        let mut i = input("tech_house", Mode::Master, Some(70.0));
        i.lufs = Some(-7.0);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Almost);
        assert_eq!(
            v.reasons,
            [
                "Match 70.0% sopra soglia ALMOST (65%).",
                "LUFS già in range, piccoli interventi su dinamica e tonal balance.",
                "Crest fuori target, lavora su mix e limiting.",
            ]
        );

        i.lufs = Some(-4.0);
        i.crest_in_target = Some(true);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Almost);
        assert_eq!(v.reasons.len(), 2);
        assert_eq!(v.reasons[1], "Match buono, ma LUFS fuori range consigliato per il genere.");
    }

    #[test]
    fn test_ready_needs_crest() {
        let reg = ProfileRegistry::default();
        let mut i = input("tech_house", Mode::Master, Some(95.0));
        i.lufs_in_target = Some(true);
        assert_eq!(evaluate_readiness(&reg, &i).status, ReadinessStatus::Almost);
    }

    #[test]
    fn test_lufs_in_target_overrides_window() {
        let reg = ProfileRegistry::default();
        let mut i = input("tech_house", Mode::Master, Some(85.0));
        i.lufs = Some(-7.0);
        i.lufs_in_target = Some(false);
        i.crest_in_target = Some(true);
        assert_eq!(evaluate_readiness(&reg, &i).status, ReadinessStatus::Almost);
    }

    #[test]
    fn test_work_and_early() {
        let reg = ProfileRegistry::default();
        let v = evaluate_readiness(&reg, &input("tech_house", Mode::Master, Some(50.0)));
        assert_eq!(v.status, ReadinessStatus::Work);
        assert_eq!(
            v.reasons[0],
            "Match moderato (50.0%), base buona ma non ancora coerente col profilo."
        );

        let v = evaluate_readiness(&reg, &input("tech_house", Mode::Master, Some(49.9)));
        assert_eq!(v.status, ReadinessStatus::Early);
        assert_eq!(
            v.reasons[0],
            "Match basso (49.9%), traccia ancora lontana dal profilo Tech House."
        );
    }

    #[test]
    fn test_premaster_thresholds() {
        let reg = ProfileRegistry::default();
        // premaster ok_match 60 → work from 45
        let v = evaluate_readiness(&reg, &input("tech_house", Mode::Premaster, Some(46.0)));
        assert_eq!(v.status, ReadinessStatus::Work);
        let mut i = input("tech_house", Mode::Premaster, Some(76.0));
        i.lufs = Some(-12.0);
        i.crest_in_target = Some(true);
        let v = evaluate_readiness(&reg, &i);
        assert_eq!(v.status, ReadinessStatus::Ready);
        assert_eq!(v.reasons[1], "LUFS in range per Tech House (premaster).");
    }

    #[test]
    fn test_status_monotonic_in_match() {
        let reg = ProfileRegistry::default();
        let order = |s: ReadinessStatus| match s {
            ReadinessStatus::Early => 0,
            ReadinessStatus::Work => 1,
            ReadinessStatus::Almost => 2,
            ReadinessStatus::Ready => 3,
            ReadinessStatus::Unknown => unreachable!(),
        };
        for flags in [(None, None), (Some(true), Some(true)), (Some(true), None), (None, Some(true))] {
            let mut prev = 0;
            for m in 0..=100 {
                let mut i = input("minimal_house", Mode::Master, Some(m as f64));
                i.lufs_in_target = flags.0;
                i.crest_in_target = flags.1;
                let rank = order(evaluate_readiness(&reg, &i).status);
                assert!(rank >= prev, "regressed at match {m} with {flags:?}");
                prev = rank;
            }
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ReadinessStatus::Ready.label(), "TEKKIN READY");
        assert_eq!(ReadinessStatus::Work.label(), "WORK IN PROGRESS");
        assert_eq!(ReadinessStatus::Unknown.label(), "UNKNOWN");
    }
}
