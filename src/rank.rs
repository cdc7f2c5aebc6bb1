//! Artist rank: a 0-100 composite of growth, presence, catalog and analysis activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longitudinal artist metrics. Missing counters count as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistMetrics {
    #[serde(alias = "spotify_followers")]
    pub followers: Option<f64>,
    #[serde(alias = "spotify_followers_30d_ago")]
    pub followers_30d_ago: Option<f64>,
    #[serde(alias = "spotify_followers_diff_30d")]
    pub followers_diff_30d: Option<f64>,
    #[serde(alias = "spotify_popularity")]
    pub popularity: Option<f64>,
    pub total_releases: Option<f64>,
    pub releases_last_12m: Option<f64>,
    pub analyzed_versions: Option<f64>,
    pub analysis_score_average: Option<f64>,
    pub analysis_score_best: Option<f64>,
    pub analysis_score_latest: Option<f64>,
    pub analysis_score_count: Option<f64>,
    pub collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPhase {
    #[default]
    Building,
    Rising,
    Established,
    HighForm,
}

impl RankPhase {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..25 => Self::Building,
            25..50 => Self::Rising,
            50..75 => Self::Established,
            _ => Self::HighForm,
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            Self::Building => "Building phase",
            Self::Rising => "Rising",
            Self::Established => "Established",
            Self::HighForm => "High Form",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRankResult {
    pub tekkin_score: u32,
    pub phase: RankPhase,
    pub level: String,
    pub growth_score: u32,
    pub presence_score: u32,
    pub catalog_score: u32,
    pub activity_score: u32,
    pub analysis_score: f64,
}

impl Default for ArtistRankResult {
    fn default() -> Self {
        Self {
            tekkin_score: 0,
            phase: RankPhase::Building,
            level: RankPhase::Building.level().to_string(),
            growth_score: 0,
            presence_score: 0,
            catalog_score: 0,
            activity_score: 0,
            analysis_score: 0.0,
        }
    }
}

const PARTIAL_WEIGHT: f64 = 0.6;
const ANALYSIS_WEIGHT: f64 = 0.4;
const SIGNAL_BOOST: f64 = 4.0;

fn val(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

/// `round(raw)` clamped to `0..=max`; NaN maps to 0.
fn points(raw: f64, max: u32) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, max as f64) as u32
}

/// Counts may arrive float-encoded; anything at or below zero is no activity.
fn activity_points(analyzed_versions: f64) -> u32 {
    if analyzed_versions > 5.0 {
        15
    } else if analyzed_versions > 2.0 {
        10
    } else if analyzed_versions > 0.0 {
        5
    } else {
        0
    }
}

pub fn compute_artist_rank(metrics: Option<&ArtistMetrics>) -> ArtistRankResult {
    let Some(m) = metrics else {
        return ArtistRankResult::default();
    };

    let followers = val(m.followers);
    let followers_30d_ago = m.followers_30d_ago.filter(|x| x.is_finite()).unwrap_or(followers);
    let followers_diff = m
        .followers_diff_30d
        .filter(|x| x.is_finite())
        .unwrap_or_else(|| (followers - followers_30d_ago).max(0.0));
    let popularity = val(m.popularity);

    let growth_score = (points(followers_diff / 20.0, 20) + points(popularity / 3.0, 10)).min(30);
    let presence_score = (points(followers / 50.0, 20) + points(popularity / 10.0, 5)).min(25);
    let catalog_score =
        (points(val(m.releases_last_12m), 20) + points(val(m.total_releases) / 10.0, 10)).min(30);
    let activity_score = activity_points(val(m.analyzed_versions));

    let analysis_score = [m.analysis_score_average, m.analysis_score_best, m.analysis_score_latest]
        .into_iter()
        .flatten()
        .find(|x| x.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);

    let partial = (growth_score + presence_score + catalog_score + activity_score) as f64;
    let mut score = (partial * PARTIAL_WEIGHT + analysis_score * ANALYSIS_WEIGHT).round();
    if partial > 0.0 || analysis_score > 0.0 {
        score += SIGNAL_BOOST;
    }
    let tekkin_score = score.clamp(0.0, 100.0) as u32;
    let phase = RankPhase::from_score(tekkin_score);

    ArtistRankResult {
        tekkin_score,
        phase,
        level: phase.level().to_string(),
        growth_score,
        presence_score,
        catalog_score,
        activity_score,
        analysis_score,
    }
}
