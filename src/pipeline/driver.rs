use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    classifier::{classify, FeatureVector, Model},
    config::{AppConfig, ClassifierConfig},
    domain::{Classification, ContentUnit, FilteredIssue, Issue, RunSummary},
    filter::filter_issue,
    infrastructure::directories::ResolvedPaths,
    pipeline::state::StateStore,
    segment::{segment, SegmentError},
};

static ISSUE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^issue-(\d+)\.md$").expect("valid issue filename regex"));

/// Segments an issue and scores every unit against the model.
pub fn score_units(
    issue: &Issue,
    model: &Model,
    config: &ClassifierConfig,
) -> Result<Vec<(ContentUnit, Classification)>, SegmentError> {
    let units = segment(&issue.raw)?;
    Ok(units
        .into_iter()
        .map(|unit| {
            let vector = FeatureVector::from_unit(&unit, config.heading_boost);
            let result = classify(&vector, model);
            (unit, result)
        })
        .collect())
}

/// Full single-issue pipeline: segment, score, drop, reassemble.
pub fn run_filter(
    issue: &Issue,
    model: &Model,
    config: &ClassifierConfig,
) -> Result<FilteredIssue, SegmentError> {
    let scored = score_units(issue, model, config)?;
    let (units, results): (Vec<_>, Vec<_>) = scored.into_iter().unzip();
    Ok(filter_issue(issue, &units, &results, config.ad_threshold))
}

enum IssueOutcome {
    Processed { removed: usize },
    Skipped,
    Failed,
}

/// Walks every issue in the input directory, skipping the ones whose digest
/// matches the persisted state. Issues are independent, so the batch runs on
/// a bounded pool of concurrent tasks; one bad issue is logged and counted
/// without stopping the rest.
pub struct PipelineDriver {
    model: Arc<Model>,
    state: Arc<StateStore>,
    config: Arc<AppConfig>,
    paths: ResolvedPaths,
}

impl PipelineDriver {
    pub fn new(
        model: Arc<Model>,
        state: Arc<StateStore>,
        config: Arc<AppConfig>,
        paths: ResolvedPaths,
    ) -> Self {
        Self {
            model,
            state,
            config,
            paths,
        }
    }

    pub async fn process_all(&self) -> Result<RunSummary> {
        let issue_paths = discover_issues(&self.paths.input_dir)?;
        tracing::info!(
            target: "pipeline",
            issues = issue_paths.len(),
            input = %self.paths.input_dir.display(),
            "starting batch"
        );

        let outcomes: Vec<IssueOutcome> = stream::iter(issue_paths)
            .map(|path| self.process_issue(path))
            .buffer_unordered(self.config.pipeline.workers.max(1))
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for outcome in outcomes {
            match outcome {
                IssueOutcome::Processed { removed } => {
                    summary.processed += 1;
                    summary.removed_units += removed;
                }
                IssueOutcome::Skipped => summary.skipped += 1,
                IssueOutcome::Failed => summary.failed += 1,
            }
        }

        self.state
            .save()
            .context("failed to persist pipeline state")?;

        tracing::info!(
            target: "pipeline",
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            removed_units = summary.removed_units,
            "batch finished"
        );
        Ok(summary)
    }

    async fn process_issue(&self, path: PathBuf) -> IssueOutcome {
        let issue_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let issue = match read_issue(&path, &issue_id).await {
            Ok(issue) => issue,
            Err(err) => {
                tracing::error!(
                    target: "pipeline",
                    issue = %issue_id,
                    error = %err,
                    "failed to read issue"
                );
                return IssueOutcome::Failed;
            }
        };

        let digest = issue.digest();
        if self.state.is_unchanged(&issue.id, &digest) {
            tracing::debug!(target: "pipeline", issue = %issue.id, "unchanged, skipping");
            return IssueOutcome::Skipped;
        }

        let filtered = match run_filter(&issue, &self.model, &self.config.classifier) {
            Ok(filtered) => filtered,
            Err(err) => {
                tracing::error!(
                    target: "pipeline",
                    issue = %issue.id,
                    error = %err,
                    "segmentation failed"
                );
                return IssueOutcome::Failed;
            }
        };

        let out_path = self.paths.output_dir.join(format!("{}.md", issue.id));
        if let Err(err) = tokio::fs::write(&out_path, &filtered.content).await {
            // Digest stays unrecorded so the next run retries this issue.
            tracing::error!(
                target: "pipeline",
                issue = %issue.id,
                path = %out_path.display(),
                error = %err,
                "failed to write filtered issue"
            );
            return IssueOutcome::Failed;
        }

        self.state.record(&issue.id, &digest);
        tracing::info!(
            target: "pipeline",
            issue = %issue.id,
            kept = filtered.kept_units,
            removed = filtered.dropped_units.len(),
            "issue filtered"
        );
        IssueOutcome::Processed {
            removed: filtered.dropped_units.len(),
        }
    }
}

async fn read_issue(path: &std::path::Path, issue_id: &str) -> Result<Issue> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
    Ok(Issue::new(issue_id, raw))
}

/// Lists `issue-<n>.md` files in numeric order, the upstream repository's
/// naming convention. A missing input directory is an empty corpus, not an
/// error.
pub fn discover_issues(input_dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(input_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to list {}", input_dir.display()))
        }
    };

    let mut numbered: Vec<(u64, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = ISSUE_FILE.captures(name) {
            if let Ok(number) = caps[1].parse::<u64>() {
                numbered.push((number, entry.path()));
            }
        }
    }
    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::train;
    use crate::config::{DirectoryConfig, PipelineConfig};
    use crate::domain::{Label, LabeledExample};
    use crate::segment::normalize_whitespace;
    use std::fs;

    const ISSUE_ONE: &str = "\
# Issue 1

An interesting article on compilers.

## Sponsor

Buy now with this discount code, a sponsor deal.
";

    const ISSUE_TWO: &str = "\
# Issue 2

Databases are interesting too.
";

    fn labeled(text: &str, label: Label) -> LabeledExample {
        LabeledExample {
            text: text.to_string(),
            label,
        }
    }

    fn fixture_model() -> Model {
        train(
            &[
                labeled("buy now discount code sponsor deal", Label::Ad),
                labeled("an interesting article on compilers and databases", Label::Editorial),
            ],
            1.0,
        )
        .unwrap()
    }

    fn fixture_config(workers: usize) -> AppConfig {
        AppConfig {
            directories: DirectoryConfig {
                input_dir: String::new(),
                output_dir: String::new(),
                data_dir: String::new(),
                logs_dir: String::new(),
                model_filename: "model.json".into(),
                state_filename: "state.json".into(),
            },
            logging: crate::config::env::LoggingConfig {
                level: "info".into(),
            },
            classifier: ClassifierConfig {
                ad_threshold: 0.9,
                smoothing_alpha: 1.0,
                heading_boost: 5.0,
            },
            pipeline: PipelineConfig { workers },
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        driver: PipelineDriver,
        input_dir: PathBuf,
        output_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let input_dir = root.path().join("in");
        let output_dir = root.path().join("out");
        let data_dir = root.path().join("data");
        fs::create_dir_all(&input_dir).unwrap();
        fs::create_dir_all(&output_dir).unwrap();
        fs::create_dir_all(&data_dir).unwrap();

        let paths = ResolvedPaths {
            input_dir: input_dir.clone(),
            output_dir: output_dir.clone(),
            data_dir: data_dir.clone(),
            logs_dir: root.path().join("logs"),
            model_path: data_dir.join("model.json"),
            state_path: data_dir.join("state.json"),
        };
        let state = Arc::new(StateStore::open(&paths.state_path).unwrap());
        let driver = PipelineDriver::new(
            Arc::new(fixture_model()),
            state,
            Arc::new(fixture_config(2)),
            paths,
        );
        Fixture {
            _root: root,
            driver,
            input_dir,
            output_dir,
        }
    }

    #[test]
    fn discover_issues_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["issue-10.md", "issue-2.md", "issue-1.md", "notes.md"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let paths = discover_issues(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["issue-1.md", "issue-2.md", "issue-10.md"]);
    }

    #[test]
    fn discover_issues_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(discover_issues(&missing).unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_filters_ads_and_is_idempotent() {
        let fx = fixture();
        fs::write(fx.input_dir.join("issue-1.md"), ISSUE_ONE).unwrap();
        fs::write(fx.input_dir.join("issue-2.md"), ISSUE_TWO).unwrap();

        let summary = fx.driver.process_all().await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        assert!(summary.removed_units > 0);

        let filtered = fs::read_to_string(fx.output_dir.join("issue-1.md")).unwrap();
        assert!(!filtered.contains("discount code"));
        assert!(!filtered.contains("Sponsor"));
        assert!(filtered.contains("compilers"));

        // Clean issue passes through untouched.
        let clean = fs::read_to_string(fx.output_dir.join("issue-2.md")).unwrap();
        assert_eq!(
            normalize_whitespace(&clean),
            normalize_whitespace(ISSUE_TWO)
        );

        // Second run: nothing changed upstream, nothing is reprocessed and
        // the outputs stay byte-identical.
        let again = fx.driver.process_all().await.unwrap();
        assert_eq!(again.processed, 0);
        assert_eq!(again.skipped, 2);
        let filtered_again = fs::read_to_string(fx.output_dir.join("issue-1.md")).unwrap();
        assert_eq!(filtered_again, filtered);
    }

    #[tokio::test]
    async fn malformed_issue_does_not_block_the_batch() {
        let fx = fixture();
        fs::write(fx.input_dir.join("issue-1.md"), ISSUE_TWO).unwrap();
        fs::write(fx.input_dir.join("issue-2.md"), [0xff, 0xfe, 0x00]).unwrap();

        let summary = fx.driver.process_all().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert!(fx.output_dir.join("issue-1.md").exists());
        assert!(!fx.output_dir.join("issue-2.md").exists());

        // The failed issue was not recorded, so a later run retries it.
        fs::write(fx.input_dir.join("issue-2.md"), ISSUE_TWO).unwrap();
        let retry = fx.driver.process_all().await.unwrap();
        assert_eq!(retry.processed, 1);
        assert_eq!(retry.skipped, 1);
        assert_eq!(retry.failed, 0);
    }

    #[tokio::test]
    async fn changed_issue_is_reprocessed() {
        let fx = fixture();
        fs::write(fx.input_dir.join("issue-1.md"), ISSUE_TWO).unwrap();
        fx.driver.process_all().await.unwrap();

        fs::write(
            fx.input_dir.join("issue-1.md"),
            format!("{ISSUE_TWO}\nPostscript paragraph.\n"),
        )
        .unwrap();
        let summary = fx.driver.process_all().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 0);
        let out = fs::read_to_string(fx.output_dir.join("issue-1.md")).unwrap();
        assert!(out.contains("Postscript paragraph."));
    }
}
