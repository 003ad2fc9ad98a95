use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    classifier::{load_labeled_examples, train, ModelStore},
    config::AppConfig,
    domain::{Issue, Label, UnitKind},
    infrastructure::directories::ResolvedPaths,
    pipeline::{
        driver::{run_filter, score_units},
        PipelineDriver, StateStore,
    },
};

#[derive(Parser)]
#[command(
    name = "adfree-weekly",
    version,
    about = "Strips advertisement blocks from newsletter issues with a naive-Bayes filter"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Train the classifier from a labeled set and save the model artifact.
    Train {
        /// JSON-lines file, one {"text": ..., "label": "ad"|"editorial"} per line.
        #[arg(long)]
        labels: PathBuf,
    },
    /// Score one issue and print every unit's label and confidence.
    Check { issue: PathBuf },
    /// Filter a single document. "-" reads stdin; omitted output prints to stdout.
    Process {
        input: PathBuf,
        output: Option<PathBuf>,
    },
    /// Filter every new or changed issue in the input directory.
    Run,
}

pub async fn run(cli: Cli, config: AppConfig, paths: ResolvedPaths) -> Result<()> {
    let store = ModelStore::new(&paths.model_path);
    match cli.command {
        Command::Train { labels } => train_command(&store, &labels, &config),
        Command::Check { issue } => check_command(&store, &issue, &config),
        Command::Process { input, output } => process_command(&store, &input, output, &config),
        Command::Run => run_command(store, config, paths).await,
    }
}

fn train_command(store: &ModelStore, labels: &Path, config: &AppConfig) -> Result<()> {
    let examples = load_labeled_examples(labels)
        .with_context(|| format!("failed to load labeled set {}", labels.display()))?;
    let ads = examples.iter().filter(|e| e.label == Label::Ad).count();
    let model = train(&examples, config.classifier.smoothing_alpha)?;
    store.save(&model)?;
    tracing::info!(
        target: "train",
        examples = examples.len(),
        ads,
        editorials = examples.len() - ads,
        vocabulary = model.vocabulary.len(),
        alpha = model.alpha,
        path = %store.path().display(),
        "model trained and saved"
    );
    Ok(())
}

fn check_command(store: &ModelStore, issue_path: &Path, config: &AppConfig) -> Result<()> {
    let model = store.load()?;
    let raw = fs::read_to_string(issue_path)
        .with_context(|| format!("failed to read {}", issue_path.display()))?;
    let issue = Issue::new(issue_stem(issue_path), raw);

    let mut stdout = std::io::stdout().lock();
    for (unit, result) in score_units(&issue, &model, &config.classifier)? {
        let marker = if matches!(unit.kind, UnitKind::Heading { .. }) {
            "#"
        } else {
            " "
        };
        let mut preview = unit.text;
        if preview.chars().count() > 60 {
            preview = preview.chars().take(60).collect::<String>() + "…";
        }
        writeln!(
            stdout,
            "[{:>3}]{} {:<9} conf={:.3} odds={:+7.2}  {}",
            unit.ordinal, marker, result.label, result.confidence, result.log_odds, preview
        )?;
    }
    Ok(())
}

fn process_command(
    store: &ModelStore,
    input: &Path,
    output: Option<PathBuf>,
    config: &AppConfig,
) -> Result<()> {
    let model = store.load()?;
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?
    };

    let issue = Issue::new(issue_stem(input), raw);
    let filtered = run_filter(&issue, &model, &config.classifier)?;
    tracing::info!(
        target: "pipeline",
        issue = %issue.id,
        kept = filtered.kept_units,
        removed = filtered.dropped_units.len(),
        "document filtered"
    );

    match output {
        Some(path) if path.as_os_str() != "-" => fs::write(&path, filtered.content)
            .with_context(|| format!("failed to write {}", path.display()))?,
        _ => std::io::stdout().write_all(filtered.content.as_bytes())?,
    }
    Ok(())
}

async fn run_command(store: ModelStore, config: AppConfig, paths: ResolvedPaths) -> Result<()> {
    // No model, no run: classification is meaningless without it.
    let model = Arc::new(store.load()?);
    let state = Arc::new(StateStore::open(&paths.state_path)?);
    let driver = PipelineDriver::new(model, state, Arc::new(config), paths);
    let summary = driver.process_all().await?;
    if summary.failed > 0 {
        tracing::warn!(
            target: "pipeline",
            failed = summary.failed,
            "some issues failed and will be retried next run"
        );
    }
    Ok(())
}

fn issue_stem(path: &Path) -> String {
    if path.as_os_str() == "-" {
        return "stdin".to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
