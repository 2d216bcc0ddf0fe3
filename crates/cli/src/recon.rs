//! `stampbook recon`: reconcile a catalog store file against a live snapshot.

use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};
use serde::Deserialize;
use stampbook_recon::compare::change_report;
use stampbook_recon::{
    reconcile_store, Bucket, CatalogStore, CommitAction, CommitMode, CommitReport, Committer,
    ReconConfig, ReconError, ReconReport, ReconciliationResult, SourceCategory,
};

use crate::exit_codes::{
    EXIT_ERROR, EXIT_RECON_COMMIT_FAILURES, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_PENDING,
    EXIT_RECON_RUNTIME, EXIT_RECON_SAVE, EXIT_USAGE,
};
use crate::store_file::JsonFileStore;
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Compare the store against the live snapshot, optionally committing
    #[command(after_help = "\
Examples:
  stampbook recon run nightly.toml
  stampbook recon run nightly.toml --json
  stampbook recon run nightly.toml --csv review.csv
  stampbook recon run nightly.toml --set 6003A6003B=add_and_remove --commit
  stampbook recon run nightly.toml --commit --mode live --bucket changed")]
    Run {
        /// Path to the run config (.toml)
        config: PathBuf,

        /// Output the JSON report to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write a review table (one row per actionable outcome) as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Override an action: KEY=ACTION (repeatable)
        #[arg(long = "set", value_name = "KEY=ACTION")]
        set: Vec<String>,

        /// Apply the outcome to the store file
        #[arg(long)]
        commit: bool,

        /// Commit mode, overriding [commit].mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Only commit these buckets (repeatable; default all)
        #[arg(long = "bucket", value_enum)]
        buckets: Vec<BucketArg>,

        /// Exit 5 when anything would change (ignored with --commit)
        #[arg(long)]
        check: bool,
    },

    /// Validate a run config without running
    #[command(after_help = "\
Examples:
  stampbook recon validate nightly.toml")]
    Validate {
        /// Path to the run config (.toml)
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            json,
            output,
            csv,
            set,
            commit,
            mode,
            buckets,
            check,
        } => cmd_recon_run(RunArgs {
            config,
            json,
            output,
            csv,
            set,
            commit,
            mode,
            buckets,
            check,
        }),
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError {
        code,
        message: msg.into(),
        hint: None,
    }
}

// ---------------------------------------------------------------------------
// Run config
// ---------------------------------------------------------------------------

/// Engine config plus the files a CLI run reads and writes.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// JSON store file, relative to the config file.
    pub store: PathBuf,
    /// JSON live snapshot (list of categories), relative to the config file.
    pub live: PathBuf,
    /// Internal category numbers to reconcile; empty means all.
    #[serde(default)]
    pub categories: Vec<i32>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(flatten)]
    pub recon: ReconConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.recon.validate()?;
        Ok(config)
    }
}

fn load_run_config(path: &Path) -> Result<RunConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot read config {}: {e}", path.display()))
    })?;
    RunConfig::from_toml(&text).map_err(|e| recon_err(EXIT_RECON_INVALID_CONFIG, e.to_string()))
}

fn load_live(path: &Path, categories: &[i32]) -> Result<Vec<SourceCategory>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", path.display()))
    })?;
    let mut live: Vec<SourceCategory> = serde_json::from_str(&text).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("{}: invalid live snapshot: {e}", path.display()))
    })?;
    if !categories.is_empty() {
        live.retain(|c| c.internal_number().is_some_and(|n| categories.contains(&n)));
    }
    tracing::info!(
        "loaded {} live categories ({} items) from {}",
        live.len(),
        live.iter().map(|c| c.items.len()).sum::<usize>(),
        path.display()
    );
    Ok(live)
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Report what would change, write nothing
    Review,
    /// Write, but never hard-delete
    Live,
    /// Apply every action
    Full,
}

impl From<ModeArg> for CommitMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Review => CommitMode::Review,
            ModeArg::Live => CommitMode::Live,
            ModeArg::Full => CommitMode::Full,
        }
    }
}

/// Buckets a commit can act on. `same` is never committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BucketArg {
    Removed,
    Renamed,
    Added,
    Ambiguous,
    Changed,
}

impl From<BucketArg> for Bucket {
    fn from(bucket: BucketArg) -> Self {
        match bucket {
            BucketArg::Removed => Bucket::Removed,
            BucketArg::Renamed => Bucket::Renamed,
            BucketArg::Added => Bucket::Added,
            BucketArg::Ambiguous => Bucket::Ambiguous,
            BucketArg::Changed => Bucket::Changed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    None,
    Add,
    Remove,
    Retire,
    Update,
    #[value(name = "add_and_remove")]
    AddAndRemove,
}

impl From<ActionArg> for CommitAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::None => CommitAction::None,
            ActionArg::Add => CommitAction::Add,
            ActionArg::Remove => CommitAction::Remove,
            ActionArg::Retire => CommitAction::Retire,
            ActionArg::Update => CommitAction::Update,
            ActionArg::AddAndRemove => CommitAction::AddAndRemove,
        }
    }
}

fn action_names() -> String {
    ActionArg::value_variants()
        .iter()
        .filter_map(|a| a.to_possible_value())
        .map(|v| v.get_name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse `KEY=ACTION`. The key may itself contain `=`, so split on the last one.
fn parse_override(s: &str) -> Result<(String, CommitAction), CliError> {
    let (key, action) = s.rsplit_once('=').ok_or_else(|| {
        recon_err(EXIT_USAGE, format!("--set expects KEY=ACTION, got '{s}'"))
    })?;
    let action = ActionArg::from_str(action, false).map_err(|_| {
        recon_err(EXIT_USAGE, format!("--set {key}: unknown action '{action}'"))
            .with_hint(format!("actions: {}", action_names()))
    })?;
    if key.is_empty() {
        return Err(recon_err(EXIT_USAGE, "--set: empty action key"));
    }
    Ok((key.to_string(), action.into()))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunArgs {
    config: PathBuf,
    json: bool,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    set: Vec<String>,
    commit: bool,
    mode: Option<ModeArg>,
    buckets: Vec<BucketArg>,
    check: bool,
}

fn cmd_recon_run(args: RunArgs) -> Result<(), CliError> {
    let overrides = args
        .set
        .iter()
        .map(|s| parse_override(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut run = load_run_config(&args.config)?;
    if let Some(mode) = args.mode {
        run.recon.commit.mode = mode.into();
    }

    // Resolve file paths relative to the config file's directory
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let mut store = JsonFileStore::open(&base_dir.join(&run.store), &run.recon.fields)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, e.to_string()))?;
    let live = load_live(&base_dir.join(&run.live), &run.categories)?;

    let mut result = reconcile_store(&store, &live, &run.recon);
    for (key, action) in &overrides {
        result.set_action(key, *action).map_err(|e| {
            recon_err(EXIT_USAGE, e.to_string())
                .with_hint("keys are listed in the review table (--csv) or the JSON report")
        })?;
    }

    let csv_path = args.csv.or_else(|| run.output.csv.as_ref().map(|p| base_dir.join(p)));
    if let Some(path) = csv_path {
        write_review_csv(&path, &store, &result)?;
        eprintln!("wrote {}", path.display());
    }

    let commit_report = if args.commit {
        let buckets = if args.buckets.is_empty() {
            Bucket::COMMIT_ORDER.to_vec()
        } else {
            args.buckets.iter().map(|&b| Bucket::from(b)).collect()
        };
        Some(run_commit(&mut store, &run.recon, &result, &buckets)?)
    } else {
        None
    };

    let report = ReconReport::new(&run.recon, result);
    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    let output = args.output.or_else(|| run.output.json.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref path) = output {
        std::fs::write(path, &json_str).map_err(|e| {
            recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}"))
        })?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    print_summary(&report, commit_report.as_ref());

    if let Some(commit) = commit_report {
        if !commit.failures.is_empty() {
            return Err(recon_err(
                EXIT_RECON_COMMIT_FAILURES,
                format!("{} items failed to commit", commit.failures.len()),
            ));
        }
        return Ok(());
    }

    if args.check && report.summary.actionable > 0 {
        return Err(recon_err(
            EXIT_RECON_PENDING,
            format!("{} outcomes pending", report.summary.actionable),
        ));
    }
    Ok(())
}

fn run_commit(
    store: &mut JsonFileStore,
    config: &ReconConfig,
    result: &ReconciliationResult,
    buckets: &[Bucket],
) -> Result<CommitReport, CliError> {
    let path = store.path().to_path_buf();
    Committer::new(store, &config.fields, config.commit.mode)
        .commit(result, buckets)
        .map_err(|e| match e {
            ReconError::Save(_) => recon_err(EXIT_RECON_SAVE, e.to_string()).with_hint(format!(
                "items were applied in memory only; {} is unchanged, re-run to retry",
                path.display()
            )),
            other => recon_err(EXIT_RECON_RUNTIME, other.to_string()),
        })
}

fn print_summary(report: &ReconReport, commit: Option<&CommitReport>) {
    let s = &report.summary;
    eprintln!(
        "recon: {} persisted vs {} live in {} categories: {} same, {} changed, {} renamed, {} added, {} removed, {} ambiguous",
        s.total_old,
        s.total_new,
        report.meta.categories.len(),
        s.same,
        s.changed,
        s.renamed,
        s.added,
        s.removed,
        s.ambiguous,
    );
    if s.rejected > 0 {
        eprintln!(
            "rejected: {} addition candidates ({})",
            s.rejected,
            report.result.rejected.join(", ")
        );
    }

    match commit {
        Some(c) => {
            eprintln!(
                "commit ({}): {} updated, {} added, {} removed, {} retired, {} skipped",
                c.mode, c.updated, c.added, c.removed, c.retired, c.skipped,
            );
            for msg in c.refused.iter().chain(&c.anomalies).chain(&c.failures) {
                eprintln!("  {msg}");
            }
            if !c.changed {
                eprintln!("store unchanged");
            }
        }
        None => eprintln!("{} outcomes actionable (use --commit to apply)", s.actionable),
    }
}

// ---------------------------------------------------------------------------
// Review table
// ---------------------------------------------------------------------------

fn write_review_csv<S: CatalogStore>(
    path: &Path,
    store: &S,
    result: &ReconciliationResult,
) -> Result<(), CliError> {
    let io_err = |e: csv::Error| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot write {}: {e}", path.display()))
    };
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;
    writer
        .write_record(["bucket", "key", "old_id", "new_id", "action", "allowed", "changes"])
        .map_err(io_err)?;

    for (bucket, outcome) in result.actionable() {
        let old = outcome.old_id().and_then(|id| store.record(id));
        let changes = match (old, outcome.record(), outcome.diff()) {
            (Some(old), Some(new), Some(diff)) => change_report(&old, new, diff)
                .iter()
                .map(|c| {
                    format!(
                        "{}: {} -> {}",
                        c.field,
                        c.old.as_deref().unwrap_or("∅"),
                        c.new.as_deref().unwrap_or("∅")
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::new(),
        };
        let allowed = bucket
            .allowed_actions()
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("|");
        writer
            .write_record([
                bucket.to_string(),
                outcome.action_key(bucket),
                outcome.old_id().unwrap_or_default().to_string(),
                outcome.new_id().unwrap_or_default().to_string(),
                result.action_for(bucket, outcome).to_string(),
                allowed,
                changes,
            ])
            .map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let run = load_run_config(&config_path)?;
    let name = run.recon.name.as_deref().unwrap_or("(unnamed)");
    eprintln!(
        "config '{name}' is valid: store {}, live {}, rename policy {:?}, commit mode {}, {} overrides",
        run.store.display(),
        run.live.display(),
        run.recon.matching.rename_policy,
        run.recon.commit.mode,
        run.recon.overrides.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_flattens_engine_sections() {
        let run = RunConfig::from_toml(
            r#"
name = "Nightly"
store = "store.json"
live = "live.json"
categories = [1, 6]

[matching]
rename_policy = "unique"

[commit]
mode = "live"

[overrides]
"6004" = "remove"
"#,
        )
        .unwrap();
        assert_eq!(run.store, PathBuf::from("store.json"));
        assert_eq!(run.categories, vec![1, 6]);
        assert_eq!(run.recon.name.as_deref(), Some("Nightly"));
        assert_eq!(run.recon.commit.mode, CommitMode::Live);
        assert_eq!(run.recon.overrides["6004"], CommitAction::Remove);
        assert!(run.output.json.is_none());
    }

    #[test]
    fn run_config_requires_paths() {
        assert!(matches!(
            RunConfig::from_toml("name = \"x\""),
            Err(ReconError::ConfigParse(_))
        ));
    }

    #[test]
    fn run_config_validates_engine_config() {
        let err = RunConfig::from_toml(
            "store = \"s.json\"\nlive = \"l.json\"\n[fields]\nid = \"code\"\nkey = \"code\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::ConfigValidation(_)));
    }

    #[test]
    fn overrides_split_on_last_equals() {
        let (key, action) = parse_override("a=b=retire").unwrap();
        assert_eq!(key, "a=b");
        assert_eq!(action, CommitAction::Retire);
        assert!(parse_override("6004").is_err());
        assert!(parse_override("6004=explode").is_err());
        assert!(parse_override("=remove").is_err());
    }

    #[test]
    fn bucket_and_mode_names() {
        assert_eq!(BucketArg::from_str("renamed", false).map(Bucket::from), Ok(Bucket::Renamed));
        assert!(BucketArg::from_str("same", false).is_err());
        assert_eq!(
            ModeArg::from_str("review", false).map(CommitMode::from),
            Ok(CommitMode::Review)
        );
        assert!(ModeArg::from_str("dry", false).is_err());
    }

    #[test]
    fn action_names_match_engine_display() {
        for action in ActionArg::value_variants() {
            let name = action.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(name, CommitAction::from(*action).to_string());
        }
        assert!(action_names().ends_with("add_and_remove"));
    }
}
