pub mod decode;
pub mod issues;
pub mod mix_score;
pub mod model_match;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::payload::FeaturePayload;
use crate::profiles::{Mode, ProfileRegistry};
use crate::readiness::{ReadinessInput, ReadinessStatus, ReadinessVerdict, evaluate_readiness};
use crate::reference::compare::{BandComparison, compare_bands};
use crate::reference::store::{ReferenceStore, StoreError};
use crate::reference::ReferenceModel;
use issues::{DeviationIndices, IssueRecord, IssueSummary, classify_and_build_issues};
use mix_score::{MixScoreResult, compute_mix_scores};
use model_match::{MatchMetrics, MatchResult, compute_model_match};

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Reference store error: {0}")]
    Store(#[from] StoreError),
    #[error("Payload directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("Failed to walk payload directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Progress bar template error: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}

/// Caller-side inputs that do not come from the payload itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackContext<'a> {
    /// Overrides the payload's own `profile_key`.
    pub profile_key: Option<&'a str>,
    pub mode: Mode,
    pub lufs_in_target: Option<bool>,
    pub crest_in_target: Option<bool>,
}

/// Everything the engine says about one track version.
#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub profile_key: Option<String>,
    pub profile_label: String,
    pub mode: Mode,
    pub has_reference: bool,
    pub mix: MixScoreResult,
    pub model_match: Option<MatchResult>,
    pub issues: Vec<IssueRecord>,
    pub summary: IssueSummary,
    pub indices: DeviationIndices,
    pub bands: Vec<BandComparison>,
    pub readiness: ReadinessVerdict,
    pub readiness_label: &'static str,
}

impl TrackReport {
    pub fn match_percent(&self) -> Option<f64> {
        self.model_match.as_ref().map(MatchResult::match_percent)
    }
}

/// Score one payload: match, mix scores blended with the match, issues, readiness.
///
/// `reference` is the model for the resolved profile, if one is loaded. Without it the
/// match is absent, issues fall back to the polish item and readiness is `unknown`.
pub fn analyze_payload(
    payload: &FeaturePayload,
    reference: Option<&ReferenceModel>,
    profiles: &ProfileRegistry,
    ctx: &TrackContext<'_>,
) -> TrackReport {
    let profile_key = ctx.profile_key.or(payload.profile_key.as_deref());
    let empty = ReferenceModel::default();
    let model = reference.unwrap_or(&empty);

    let model_match = compute_model_match(&MatchMetrics::from(payload), model);
    let match_percent = model_match.as_ref().map(MatchResult::match_percent);

    let mix = compute_mix_scores(payload, payload.bands(), match_percent);
    let issues = classify_and_build_issues(payload, model);
    let summary = IssueSummary::from_issues(&issues);
    let indices = DeviationIndices::compute(payload, model);
    let bands = compare_bands(payload.bands(), model);

    let readiness = evaluate_readiness(
        profiles,
        &ReadinessInput {
            profile_key,
            mode: ctx.mode,
            match_percent,
            lufs: payload.integrated_lufs(),
            lufs_in_target: ctx.lufs_in_target,
            crest_in_target: ctx.crest_in_target,
        },
    );

    TrackReport {
        source: None,
        profile_key: profile_key.map(str::to_string),
        profile_label: profiles.resolve(profile_key).label.clone(),
        mode: ctx.mode,
        has_reference: reference.is_some(),
        mix,
        model_match,
        issues,
        summary,
        indices,
        bands,
        readiness_label: readiness.status.label(),
        readiness,
    }
}

/// Fetch the reference model for `profile_key`, logging when either the model or the
/// readiness profile falls back.
pub fn resolve_reference(
    store: &ReferenceStore,
    profiles: &ProfileRegistry,
    profile_key: Option<&str>,
) -> Option<Arc<ReferenceModel>> {
    let Some(key) = profile_key else {
        log::debug!("No profile key, using generic readiness profile");
        return None;
    };
    if profiles.get(key).is_none() {
        log::warn!("Unknown profile '{}', using generic readiness thresholds", key);
    }
    let model = store.get(key);
    if model.is_none() {
        log::warn!("No reference model for profile '{}'", key);
    }
    model
}

pub struct BatchOptions<'a> {
    pub jobs: usize,
    /// Forces this profile on every payload.
    pub profile_key: Option<&'a str>,
    /// Used for payloads that name no profile of their own.
    pub fallback_profile: Option<&'a str>,
    pub mode: Mode,
    pub crest_in_target: Option<bool>,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub analyzed: u64,
    pub failed: u64,
    pub reports: Vec<TrackReport>,
}

impl BatchResult {
    /// Number of tracks per readiness status, keyed by status name.
    pub fn status_counts(&self) -> BTreeMap<&'static str, u64> {
        let mut counts = BTreeMap::new();
        for r in &self.reports {
            *counts.entry(r.readiness.status.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn ready_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.readiness.status == ReadinessStatus::Ready)
            .count()
    }

    /// Mean overall score over tracks that have one.
    pub fn mean_overall(&self) -> Option<f64> {
        let scores: Vec<f64> = self.reports.iter().filter_map(|r| r.mix.overall_score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

/// Collect payload files under `dir`, sorted by path.
fn collect_payload_files(dir: &Path) -> Result<Vec<PathBuf>, AnalyzeError> {
    if !dir.is_dir() {
        return Err(AnalyzeError::MissingDir(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && decode::is_payload_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Score every payload under `dir` in parallel.
///
/// Files are processed in chunks of `jobs * 2` on a dedicated rayon pool. A file that
/// fails to decode is logged and counted, never fatal to the batch.
pub fn analyze_batch(
    dir: &Path,
    store: &ReferenceStore,
    profiles: &ProfileRegistry,
    opts: &BatchOptions<'_>,
) -> Result<BatchResult, AnalyzeError> {
    let files = collect_payload_files(dir)?;

    if files.is_empty() {
        log::info!("No payloads to analyze in {}", dir.display());
        return Ok(BatchResult::default());
    }

    let jobs = opts.jobs.max(1);
    log::info!("Analyzing {} payloads with {} workers", files.len(), jobs);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )?
        .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let mut result = BatchResult::default();
    let chunk_size = jobs * 2;

    for chunk in files.chunks(chunk_size) {
        let outcomes: Vec<_> = pool.install(|| {
            use rayon::prelude::*;
            chunk
                .par_iter()
                .map(|path| {
                    let outcome = analyze_file(path, store, profiles, opts);
                    pb.inc(1);
                    (path, outcome)
                })
                .collect()
        });

        for (path, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    result.analyzed += 1;
                    result.reports.push(report);
                }
                Err(e) => {
                    log::warn!("Failed to score {}: {}", path.display(), e);
                    result.failed += 1;
                }
            }
        }

        pb.set_message(format!("{} scored, {} failed", result.analyzed, result.failed));
    }

    pb.finish_with_message(format!(
        "Done: {} scored, {} failed",
        result.analyzed, result.failed
    ));

    Ok(result)
}

fn analyze_file(
    path: &Path,
    store: &ReferenceStore,
    profiles: &ProfileRegistry,
    opts: &BatchOptions<'_>,
) -> Result<TrackReport, AnalyzeError> {
    let payload = decode::load_payload(path)?;
    let profile_key = opts
        .profile_key
        .or(payload.profile_key.as_deref())
        .or(opts.fallback_profile);
    let reference = resolve_reference(store, profiles, profile_key);

    let ctx = TrackContext {
        profile_key,
        mode: opts.mode,
        lufs_in_target: None,
        crest_in_target: opts.crest_in_target,
    };
    let mut report = analyze_payload(&payload, reference.as_deref(), profiles, &ctx);
    report.source = Some(path.to_path_buf());
    Ok(report)
}
