use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Args;

use crate::config::RuntimePaths;
use crate::engine::{BatchReport, SkipReason};
use crate::models::{ExtractMode, ManualOverrides};

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Log file to read; stdin when absent or `-`.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    #[arg(long, default_value_t = ExtractMode::Fos)]
    pub mode: ExtractMode,

    /// Override one record field for every emitted record.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override_pair)]
    pub set: Vec<(String, String)>,

    /// JSON object of override strings, applied before `--set`.
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Print the batch report as JSON on stderr.
    #[arg(long, default_value_t = false)]
    pub report: bool,

    /// Fail with exit code 2 when no line produced a record.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Debug)]
pub struct StrictModeFailure {
    pub mode: ExtractMode,
    pub lines_total: usize,
}

impl std::fmt::Display for StrictModeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no {} records found in {} line(s); output holds the placeholder record only.",
            self.mode, self.lines_total
        )
    }
}

impl std::error::Error for StrictModeFailure {}

pub fn run(args: &ExtractArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let (content, input_label) =
        super::read_input(args.input.as_deref(), runtime_paths).context("extract input")?;
    eprintln!(
        "extract: start mode={} input={} bytes={}",
        args.mode,
        input_label,
        content.len()
    );

    let overrides = collect_overrides(args, runtime_paths)?;
    let outcome = crate::engine::run_with_report(&content, args.mode, &overrides, None);
    let report = &outcome.report;
    eprintln!(
        "extract: scanned lines={} blank={} records={} skipped={} windows_missing={} unparseable_timestamps={}",
        report.lines_total,
        report.blank_lines,
        report.records_emitted,
        total_skipped(report),
        report.windows_missing,
        report.unparseable_timestamps
    );
    if args.report {
        eprintln!("{}", serde_json::to_string_pretty(report)?);
    }

    let rendered = if args.compact {
        serde_json::to_string(&outcome.envelope)?
    } else {
        serde_json::to_string_pretty(&outcome.envelope)?
    };
    let destination = match &args.out {
        Some(path) => {
            let resolved = runtime_paths.resolve(path)?;
            if let Some(parent) = resolved.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create output directory: {}", parent.display())
                })?;
            }
            std::fs::write(&resolved, format!("{rendered}\n"))
                .with_context(|| format!("failed to write output: {}", resolved.display()))?;
            resolved.display().to_string()
        }
        None => {
            println!("{rendered}");
            "<stdout>".to_string()
        }
    };

    if args.strict && report.records_emitted == 0 {
        eprintln!(
            "extract: failed records=0 placeholder={} next=check_mode",
            report.placeholder_substituted
        );
        return Err(StrictModeFailure {
            mode: args.mode,
            lines_total: report.lines_total,
        }
        .into());
    }

    eprintln!(
        "extract: complete records={} placeholder={} cancelled={} out={}",
        outcome.envelope.data.len(),
        report.placeholder_substituted,
        report.cancelled,
        destination
    );
    Ok(())
}

fn collect_overrides(args: &ExtractArgs, runtime_paths: &RuntimePaths) -> Result<ManualOverrides> {
    let mut ignored = Vec::new();
    let mut overrides = match &args.overrides {
        Some(path) => {
            let resolved = runtime_paths.resolve(path)?;
            let (loaded, unknown) = crate::config::load_overrides_file(&resolved)?;
            ignored.extend(unknown);
            loaded
        }
        None => ManualOverrides::new(),
    };

    for (key, value) in &args.set {
        if !overrides.set(key, value.as_str()) {
            ignored.push(key.clone());
        }
    }

    for key in &ignored {
        eprintln!("extract: warning ignored_override key={key}");
    }
    Ok(overrides)
}

fn total_skipped(report: &BatchReport) -> usize {
    SkipReason::ALL
        .iter()
        .map(|reason| report.skipped_for(*reason))
        .sum()
}

fn parse_override_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("override key is empty in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
