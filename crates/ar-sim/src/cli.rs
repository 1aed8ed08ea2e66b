// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ar_app_core::{ActivationSettings, ConfigService, SettingsPort};
use ar_config_fs::FsConfigStore;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scenario::Scenario;
use crate::sim::{run_scenario, SimReport, TraceEntry};

#[derive(Parser)]
#[command(name = "ar-sim")]
#[command(about = "Deterministic AR activation scenario harness")]
pub struct Cli {
    /// Settings JSON overriding the stored settings
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario and optionally check against a golden trace
    Run {
        /// Path to scenario .json
        scenario: PathBuf,
        /// Optional path to golden trace .json
        #[arg(long)]
        golden: Option<PathBuf>,
    },
    /// Record a scenario and output a golden trace
    Record {
        /// Path to scenario .json
        scenario: PathBuf,
        /// Path to output golden trace
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a scenario repeatedly to detect non-determinism
    Torture {
        /// Path to scenario .json
        scenario: PathBuf,
        /// Number of runs
        #[arg(long, default_value = "20")]
        runs: u32,
    },
    /// Run every scenario listed in a manifest
    Suite {
        /// Path to MANIFEST.json
        manifest: PathBuf,
        /// Rewrite golden traces instead of comparing
        #[arg(long)]
        update_golden: bool,
        /// Only run entries carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
}

/// Recorded trace of one scenario.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Golden {
    pub scenario: String,
    pub trace: Vec<TraceEntry>,
}

impl From<&SimReport> for Golden {
    fn from(report: &SimReport) -> Self {
        Self {
            scenario: report.scenario.clone(),
            trace: report.trace.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ManifestEntry {
    pub path: String,
    #[serde(default)]
    pub golden: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub desc: String,
}

/// Settings from `--settings`, else the user's stored settings, else defaults.
pub fn resolve_settings(path: Option<&Path>) -> Result<ActivationSettings> {
    if let Some(path) = path {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings = ActivationSettings::from_json(&bytes)
            .with_context(|| format!("invalid settings {}", path.display()))?;
        return Ok(settings);
    }
    match FsConfigStore::new() {
        Ok(store) => {
            if let Some(settings) = ConfigService::new(store).load_settings() {
                info!("using stored activation settings");
                return Ok(settings);
            }
        }
        Err(err) => warn!(%err, "config directory unavailable"),
    }
    Ok(ActivationSettings::default())
}

pub fn load_golden(path: &Path) -> Result<Golden> {
    let f = File::open(path).with_context(|| format!("failed to open golden file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).context("failed to parse golden file")
}

pub fn write_golden(path: &Path, golden: &Golden) -> Result<()> {
    let f = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(f, golden)?;
    Ok(())
}

/// First divergence between a run and its golden trace.
pub fn compare_golden(actual: &Golden, expected: &Golden) -> Option<String> {
    for (i, (a, e)) in actual.trace.iter().zip(expected.trace.iter()).enumerate() {
        if a != e {
            return Some(format!(
                "Trace mismatch at step {i}.\nActual:   {a:?}\nExpected: {e:?}"
            ));
        }
    }
    if actual.trace.len() != expected.trace.len() {
        return Some(format!(
            "Length mismatch. Run has {} steps, golden has {}.",
            actual.trace.len(),
            expected.trace.len()
        ));
    }
    None
}

/// Expectation mismatches plus invariant violations.
pub fn verify(scenario: &Scenario, report: &SimReport) -> Vec<String> {
    let mut problems = scenario.expect.mismatches(report);
    problems.extend(report.invariant_violations());
    problems
}

/// Outcome of one manifest entry.
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub path: String,
    pub desc: String,
    pub tags: Vec<String>,
    pub steps: usize,
    pub problems: Vec<String>,
}

/// Run the entries of `manifest`, or only those tagged `tag`. Paths resolve
/// relative to the manifest.
pub fn run_suite(
    manifest: &Path,
    settings: &ActivationSettings,
    update_golden: bool,
    tag: Option<&str>,
) -> Result<Vec<SuiteResult>> {
    let f = File::open(manifest).with_context(|| format!("failed to open manifest {}", manifest.display()))?;
    let entries: Vec<ManifestEntry> =
        serde_json::from_reader(BufReader::new(f)).context("failed to parse manifest")?;
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        if tag.is_some_and(|tag| !entry.tags.iter().any(|t| t == tag)) {
            continue;
        }
        let scenario = Scenario::load(&base.join(&entry.path))?;
        let report = run_scenario(&scenario, settings)
            .with_context(|| format!("scenario {} failed to run", entry.path))?;
        let mut problems = verify(&scenario, &report);
        let actual = Golden::from(&report);
        if let Some(golden) = &entry.golden {
            let golden_path = base.join(golden);
            if update_golden {
                write_golden(&golden_path, &actual)?;
            } else if let Some(msg) = compare_golden(&actual, &load_golden(&golden_path)?) {
                problems.push(msg);
            }
        }
        results.push(SuiteResult {
            path: entry.path,
            desc: entry.desc,
            tags: entry.tags,
            steps: report.trace.len(),
            problems,
        });
    }
    Ok(results)
}

fn run_checked(path: &Path, settings: &ActivationSettings) -> Result<(Scenario, SimReport)> {
    let scenario = Scenario::load(path)?;
    let report = run_scenario(&scenario, settings)?;
    let problems = verify(&scenario, &report);
    if !problems.is_empty() {
        bail!("AR-SIM: {} failed:\n{}", scenario.name, problems.join("\n"));
    }
    Ok((scenario, report))
}

pub fn entrypoint() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Run { scenario, golden } => {
            let (_, report) = run_checked(&scenario, &settings)?;
            if let Some(golden_path) = golden {
                let expected = load_golden(&golden_path)?;
                if let Some(msg) = compare_golden(&Golden::from(&report), &expected) {
                    bail!("{}", msg);
                }
                println!("AR-SIM: OK. {} steps verified.", report.trace.len());
            } else {
                println!(
                    "AR-SIM: Run complete. {} steps, final state {}.",
                    report.trace.len(),
                    report.final_state
                );
            }
        }
        Commands::Record { scenario, out } => {
            let (_, report) = run_checked(&scenario, &settings)?;
            let golden = Golden::from(&report);
            write_golden(&out, &golden)?;
            println!("AR-SIM: Recorded {} steps to {:?}", golden.trace.len(), out);
        }
        Commands::Torture { scenario, runs } => {
            println!("AR-SIM: Torture starting. {} runs on {:?}", runs, scenario);
            let (loaded, baseline) = run_checked(&scenario, &settings).context("Run 1 (Baseline) failed")?;
            for i in 2..=runs {
                let report = run_scenario(&loaded, &settings).with_context(|| format!("Run {i} failed"))?;
                if report != baseline {
                    let msg = compare_golden(&Golden::from(&report), &Golden::from(&baseline))
                        .unwrap_or_else(|| "final report differs".to_owned());
                    bail!("AR-SIM: DIVERGENCE DETECTED in Run {}.\n{}", i, msg);
                }
            }
            println!("AR-SIM: Torture complete. {} runs identical.", runs);
        }
        Commands::Suite {
            manifest,
            update_golden,
            tag,
        } => {
            let results = run_suite(&manifest, &settings, update_golden, tag.as_deref())?;
            if let (Some(tag), true) = (&tag, results.is_empty()) {
                bail!("AR-SIM: no scenarios tagged {tag:?}");
            }
            let mut failed = 0;
            for result in &results {
                if result.problems.is_empty() {
                    println!("ok   {} ({} steps) {}", result.path, result.steps, result.desc);
                } else {
                    failed += 1;
                    println!("FAIL {} {}", result.path, result.desc);
                    for problem in &result.problems {
                        println!("     {problem}");
                    }
                }
            }
            if failed > 0 {
                bail!("AR-SIM: {} of {} scenarios failed", failed, results.len());
            }
            println!("AR-SIM: Suite OK. {} scenarios.", results.len());
        }
    }

    Ok(())
}
