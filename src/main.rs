use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use tekkin_engine::analyzer::{self, BatchOptions, TrackContext, TrackReport};
use tekkin_engine::profiles::{Mode, ProfileRegistry};
use tekkin_engine::readiness::{ReadinessInput, evaluate_readiness};
use tekkin_engine::reference::compare::compare_bands;
use tekkin_engine::reference::store::{ReferenceStore, StoreError};

#[derive(Parser)]
#[command(name = "tekkin", version, about = "Mix analysis scoring and readiness engine")]
struct Cli {
    /// Directory of reference model JSON files
    #[arg(long, global = true)]
    reference_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Master,
    Premaster,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Master => Mode::Master,
            ModeArg::Premaster => Mode::Premaster,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score one analyzer payload: mix scores, reference match, issues and readiness
    Score {
        /// Payload JSON file
        payload: PathBuf,

        /// Genre profile key (defaults to the payload's own, then the config)
        #[arg(short, long)]
        profile: Option<String>,

        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Override the loudness window check
        #[arg(long)]
        lufs_in_target: Option<bool>,

        /// Whether the crest factor is in target
        #[arg(long)]
        crest_in_target: Option<bool>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score every payload under a directory in parallel
    Batch {
        /// Directory of payload JSON files (searched recursively)
        dir: PathBuf,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Force this profile on every payload
        #[arg(short, long)]
        profile: Option<String>,

        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        #[arg(long)]
        crest_in_target: Option<bool>,
    },

    /// Evaluate readiness directly from a match percentage
    Readiness {
        /// Reference match, 0-100
        #[arg(long = "match")]
        match_percent: f64,

        #[arg(short, long)]
        profile: Option<String>,

        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Integrated loudness in LUFS
        #[arg(long, allow_hyphen_values = true)]
        lufs: Option<f64>,

        #[arg(long)]
        lufs_in_target: Option<bool>,

        #[arg(long)]
        crest_in_target: Option<bool>,
    },

    /// Compute an artist rank from a metrics JSON file
    Rank {
        metrics: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Compare a payload's band energies against the reference percentiles
    Bands {
        payload: PathBuf,

        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List readiness profiles
    Profiles,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = tekkin_engine::config::AppConfig::load();
    let profiles = ProfileRegistry::new(&config.profiles);

    // Resolve reference directory: CLI > config > XDG default
    let reference_dir = cli
        .reference_dir
        .clone()
        .unwrap_or_else(|| config.resolve_reference_dir());
    log::info!("Reference models: {}", reference_dir.display());

    match cli.command {
        Commands::Score {
            payload,
            profile,
            mode,
            lufs_in_target,
            crest_in_target,
            json,
        } => {
            let store = open_store(&reference_dir)?;
            let features = analyzer::decode::load_payload(&payload)
                .with_context(|| format!("Failed to load payload {}", payload.display()))?;

            let profile_key = profile
                .or_else(|| features.profile_key.clone())
                .or_else(|| config.default_profile.clone());
            let reference = analyzer::resolve_reference(&store, &profiles, profile_key.as_deref());

            let ctx = TrackContext {
                profile_key: profile_key.as_deref(),
                mode: mode.map(Mode::from).unwrap_or_else(|| config.resolve_mode()),
                lufs_in_target,
                crest_in_target,
            };
            let report = analyzer::analyze_payload(&features, reference.as_deref(), &profiles, &ctx);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialize report")?
                );
            } else {
                print_report(&report);
            }
        }

        Commands::Batch {
            dir,
            jobs,
            profile,
            mode,
            crest_in_target,
        } => {
            let store = open_store(&reference_dir)?;
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let opts = BatchOptions {
                jobs: workers,
                profile_key: profile.as_deref(),
                fallback_profile: config.default_profile.as_deref(),
                mode: mode.map(Mode::from).unwrap_or_else(|| config.resolve_mode()),
                crest_in_target,
            };
            let result = analyzer::analyze_batch(&dir, &store, &profiles, &opts)
                .context("Batch analysis failed")?;

            println!(
                "Batch complete: {} scored, {} failed, {} ready",
                result.analyzed,
                result.failed,
                result.ready_count()
            );
            if let Some(mean) = result.mean_overall() {
                println!("Mean overall score: {:.1}", mean);
            }
            for (status, count) in result.status_counts() {
                println!("  {:<8} {:>5}", status, count);
            }
        }

        Commands::Readiness {
            match_percent,
            profile,
            mode,
            lufs,
            lufs_in_target,
            crest_in_target,
        } => {
            let profile_key = profile.or_else(|| config.default_profile.clone());
            if let Some(key) = profile_key.as_deref() {
                if profiles.get(key).is_none() {
                    log::warn!("Unknown profile '{}', using generic readiness thresholds", key);
                }
            }
            let verdict = evaluate_readiness(
                &profiles,
                &ReadinessInput {
                    profile_key: profile_key.as_deref(),
                    mode: mode.map(Mode::from).unwrap_or_else(|| config.resolve_mode()),
                    match_percent: Some(match_percent),
                    lufs,
                    lufs_in_target,
                    crest_in_target,
                },
            );
            println!("{}", verdict.status.label());
            for reason in &verdict.reasons {
                println!("  - {}", reason);
            }
        }

        Commands::Rank { metrics, json } => {
            let m = analyzer::decode::load_metrics(&metrics)
                .with_context(|| format!("Failed to load metrics {}", metrics.display()))?;
            let rank = tekkin_engine::rank::compute_artist_rank(Some(&m));
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&rank).context("Failed to serialize rank")?
                );
            } else {
                println!("Tekkin score: {} ({})", rank.tekkin_score, rank.level);
                println!(
                    "  growth {:>2}/30  presence {:>2}/25  catalog {:>2}/30  activity {:>2}/15  analysis {:.0}/100",
                    rank.growth_score,
                    rank.presence_score,
                    rank.catalog_score,
                    rank.activity_score,
                    rank.analysis_score
                );
            }
        }

        Commands::Bands { payload, profile } => {
            let store = open_store(&reference_dir)?;
            let features = analyzer::decode::load_payload(&payload)
                .with_context(|| format!("Failed to load payload {}", payload.display()))?;
            let profile_key = profile
                .or_else(|| features.profile_key.clone())
                .or_else(|| config.default_profile.clone())
                .context("No profile given. Pass --profile or set default_profile in config.")?;
            let reference = store
                .require(&profile_key)
                .with_context(|| format!("Reference models in {}", reference_dir.display()))?;

            println!("{:<9} {:>7} {:>7} {:>7} {:>7}  {}", "Band", "Value", "p10", "p50", "p90", "Status");
            println!("{}", "-".repeat(52));
            for row in compare_bands(features.bands(), &reference) {
                println!(
                    "{:<9} {:>7} {:>7} {:>7} {:>7}  {}",
                    row.key.as_str(),
                    fmt_opt(row.value, 3),
                    fmt_opt(row.p10, 3),
                    fmt_opt(row.p50, 3),
                    fmt_opt(row.p90, 3),
                    row.status.as_str()
                );
            }
        }

        Commands::Profiles => {
            println!(
                "{:<20} {:<22} {:>15} {:>15}",
                "Key", "Label", "Master LUFS", "Premaster LUFS"
            );
            println!("{}", "-".repeat(75));
            let rows = profiles
                .list()
                .into_iter()
                .chain(std::iter::once(("(default)", profiles.default_profile())));
            for (key, p) in rows {
                println!(
                    "{:<20} {:<22} {:>7.1}..{:<6.1} {:>7.1}..{:<6.1}",
                    key,
                    p.label,
                    p.master.lufs_min,
                    p.master.lufs_max,
                    p.premaster.lufs_min,
                    p.premaster.lufs_max
                );
            }
        }
    }

    Ok(())
}

/// Load the reference store. A missing directory is not fatal: scoring still runs,
/// just without a reference match.
fn open_store(dir: &Path) -> Result<ReferenceStore> {
    match ReferenceStore::load_dir(dir) {
        Ok(store) => Ok(store),
        Err(StoreError::MissingDir(path)) => {
            log::warn!(
                "Reference directory {} not found, scoring without reference models",
                path.display()
            );
            Ok(ReferenceStore::default())
        }
        Err(e) => Err(e).context("Failed to load reference models"),
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{:.*}", decimals, x),
        None => "-".to_string(),
    }
}

/// Print a human-readable track report.
fn print_report(r: &TrackReport) {
    println!(
        "Profile: {} ({}){}",
        r.profile_label,
        r.mode,
        if r.has_reference { "" } else { "  [no reference model]" }
    );
    println!();

    println!("{:<14} {:>5}", "Score", "Value");
    println!("{}", "-".repeat(20));
    for (name, value, _) in r.mix.weighted_parts() {
        println!("{:<14} {:>5}", name, fmt_opt(value, 0));
    }
    println!("{:<14} {:>5}", "overall", fmt_opt(r.mix.overall_score, 0));
    println!();

    match &r.model_match {
        Some(m) => println!(
            "Reference match: {:.1}% (mean abs error {:.3}, {} features)",
            m.match_percent(),
            m.mean_abs_error,
            m.deltas.len()
        ),
        None => println!("Reference match: -"),
    }
    println!(
        "Indices: dynamics {}  low end {}  high end {}",
        r.indices.dynamics, r.indices.low_end, r.indices.high_end
    );
    println!();

    println!(
        "Issues ({}, {} high, ~{} min):",
        r.summary.count, r.summary.high_count, r.summary.eta_total
    );
    for issue in &r.issues {
        println!("  [{:<4}] {}", issue.severity.as_str(), issue.title);
        println!("         {}", issue.fix_text);
    }
    println!();

    println!("Readiness: {}", r.readiness_label);
    for reason in &r.readiness.reasons {
        println!("  - {}", reason);
    }
}
