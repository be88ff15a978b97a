//! fraudlens-runner: headless analysis runner.
//!
//! Usage:
//!   fraudlens-runner --file ledger.csv --threshold 70 --seed 42
//!   fraudlens-runner --file ledger.xlsx --mode remote --json
//!   fraudlens-runner --register-model model.pkl --register-scaler scaler.pkl --model-type XGBoost
//!   fraudlens-runner --history

use anyhow::{bail, Context, Result};
use fraudlens_core::{
    config::{ModelArtifact, PipelineSettings, ScoringConfig},
    insights::format_amount,
    pipeline::{AnalysisPipeline, AnalysisReport},
    progress::LogProgress,
    remote::RemoteClient,
    rng::ScoreRng,
    store::SettingsStore,
    strategy::{LocalHeuristicStrategy, RemoteOracleStrategy, ScoringStrategy},
    types::RiskLevel,
    upload::Upload,
};
use std::env;
use std::path::Path;

const DEFAULT_MODEL_TYPE: &str = "XGBoost";
const HISTORY_LIMIT: usize = 10;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or("fraudlens.db");
    let store = SettingsStore::open_migrated(db).with_context(|| format!("opening {db}"))?;

    let settings = match arg_value(&args, "--settings") {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::default(),
    };

    let mut did_maintenance = false;

    if has_flag(&args, "--clear-config") {
        ScoringConfig::clear(&store)?;
        println!("Cleared stored threshold and model artifacts.");
        did_maintenance = true;
    }

    let mut config = ScoringConfig::load(&store)?;
    if let Some(update) = maintain_config(&args, &mut config)? {
        config.save(&store)?;
        println!("{update}");
        did_maintenance = true;
    }

    if has_flag(&args, "--history") {
        print_history(&store)?;
        did_maintenance = true;
    }

    let Some(file) = arg_value(&args, "--file") else {
        if !did_maintenance {
            print_usage();
        }
        return Ok(());
    };

    // Run-only overrides are applied after saving, so they never persist.
    settings.apply_scoring(&mut config);
    if let Some(t) = arg_value(&args, "--threshold") {
        config.set_threshold(t.parse().with_context(|| format!("bad --threshold {t}"))?);
    }

    let mode = arg_value(&args, "--mode").unwrap_or("local");
    log::info!("runner: file={file} mode={mode} db={db}");
    let strategy: Box<dyn ScoringStrategy> = match mode {
        "local" => {
            let seed = arg_value(&args, "--seed")
                .map(str::parse::<u64>)
                .transpose()
                .context("bad --seed")?
                .or(settings.seed);
            Box::new(match seed {
                Some(seed) => LocalHeuristicStrategy::with_jitter(config, Box::new(ScoreRng::seeded(seed))),
                None => LocalHeuristicStrategy::new(config),
            })
        }
        "remote" => {
            let mut remote = settings.remote();
            if let Some(endpoint) = arg_value(&args, "--endpoint") {
                remote.endpoint = endpoint.to_string();
            }
            Box::new(RemoteOracleStrategy::new(RemoteClient::with_reqwest(remote)?))
        }
        other => bail!("unknown --mode {other} (expected local or remote)"),
    };

    let upload = Upload::from_path(file).with_context(|| format!("reading {file}"))?;
    let mut pipeline = AnalysisPipeline::new(strategy).with_store(&store);
    let report = pipeline.run_with_progress(&upload, &mut LogProgress)?;

    if has_flag(&args, "--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

/// Apply `--save-threshold` and artifact registration. Returns a
/// message when anything changed.
fn maintain_config(args: &[String], config: &mut ScoringConfig) -> Result<Option<String>> {
    let mut changes = Vec::new();
    let model_type = arg_value(args, "--model-type").unwrap_or(DEFAULT_MODEL_TYPE);

    if let Some(t) = arg_value(args, "--save-threshold") {
        config.set_threshold(t.parse().with_context(|| format!("bad --save-threshold {t}"))?);
        changes.push(format!("threshold={}", config.threshold()));
    }
    if let Some(path) = arg_value(args, "--register-model") {
        let artifact = read_artifact(path, model_type)?;
        changes.push(format!("model={} ({})", artifact.name, artifact.size_label()));
        config.model = Some(artifact);
    }
    if let Some(path) = arg_value(args, "--register-scaler") {
        let artifact = read_artifact(path, model_type)?;
        changes.push(format!("scaler={} ({})", artifact.name, artifact.size_label()));
        config.scaler = Some(artifact);
    }

    if changes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!("Saved configuration: {}", changes.join(", "))))
    }
}

fn read_artifact(path: &str, model_type: &str) -> Result<ModelArtifact> {
    let payload = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    Ok(ModelArtifact::new(name, model_type, payload))
}

fn print_history(store: &SettingsStore) -> Result<()> {
    println!("=== RECENT ANALYSES ===");
    let runs = store.recent_runs(HISTORY_LIMIT)?;
    if runs.is_empty() {
        println!("  (none yet)");
    }
    for run in runs {
        println!(
            "  {} | {} | {} | {} records | {} anomalies ({:.1}%)",
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.source,
            run.file_name,
            run.total_records,
            run.anomalies_detected,
            run.anomaly_rate
        );
    }
    println!();
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let results = &report.results;
    println!("=== ANALYSIS SUMMARY ===");
    println!("  run_id:      {}", report.run_id);
    println!("  file:        {}", report.file_name);
    println!("  source:      {}", report.source);
    if let Some(t) = report.batch.threshold {
        println!("  threshold:   {t}");
    }
    println!("  records:     {}", results.total_records);
    println!("  anomalies:   {}", results.anomalies_detected);
    println!("  rate:        {:.1}%", results.anomaly_rate);
    println!("  at risk:     ₹{}", format_amount(results.total_fraud_risk_amount));

    println!();
    println!("=== RISK SPLIT ===");
    for level in RiskLevel::FLAGGED {
        println!("  {:<9} {}", level.label(), results.risk_count(level));
    }

    println!();
    println!("=== FINDINGS ===");
    for line in &results.insights.critical_findings {
        println!("  - {line}");
    }
    for line in &results.insights.trend_analysis {
        println!("  - {line}");
    }

    println!();
    println!("=== RECOMMENDATIONS ===");
    for line in &results.insights.recommendations {
        println!("  - {line}");
    }
}

fn print_usage() {
    println!("fraudlens-runner --file <path> [--mode local|remote] [--threshold N] [--seed N]");
    println!("                 [--db path] [--endpoint URL] [--settings path] [--json]");
    println!("fraudlens-runner [--save-threshold N] [--register-model path] [--register-scaler path]");
    println!("                 [--model-type label] [--clear-config] [--history]");
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
