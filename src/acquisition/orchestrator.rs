use super::codebase::{Checkout, LocalAnalyzer, Vcs};
use super::dataset::RepositoryDataset;
use super::hosting::{Client, MetadataFetcher};
use super::stage::{FailurePolicy, Stage};
use super::{AcquisitionError, LOG_TARGET, RepoSpec};
use crate::config::Config;
use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;

/// Upper bound on the contributors requested from the API
const MAX_CONTRIBUTORS: usize = 100;

/// Runs the acquisition stages in order and merges their results into one dataset.
///
/// Only a malformed reference or unavailable repository metadata abort a run. Every other
/// failure is logged and leaves the affected fields at their defaults; a failed clone skips
/// all local analysis. A clone created by the run is always removed before it returns.
#[derive(Debug)]
pub struct Orchestrator<V> {
    config: Config,
    fetcher: MetadataFetcher,
    analyzer: LocalAnalyzer<V>,
}

impl<V: Vcs> Orchestrator<V> {
    #[must_use]
    pub fn new(config: Config, client: Client, vcs: V) -> Self {
        let analyzer = LocalAnalyzer::new(vcs, &config);
        Self {
            config,
            fetcher: MetadataFetcher::new(client),
            analyzer,
        }
    }

    /// Acquire everything that can be learned about `reference`
    pub async fn acquire(&self, reference: &str) -> Result<RepositoryDataset, AcquisitionError> {
        self.acquire_at(reference, Utc::now()).await
    }

    /// Acquire everything that can be learned about `reference`, as of `now`
    pub async fn acquire_at(&self, reference: &str, now: DateTime<Utc>) -> Result<RepositoryDataset, AcquisitionError> {
        let spec = settle(Stage::ParseReference, RepoSpec::parse(reference))?.ok_or_else(|| AcquisitionError::Parse {
            input: reference.to_string(),
        })?;
        log::info!(target: LOG_TARGET, "Acquiring data for '{spec}'");

        let mut dataset = RepositoryDataset::new(&spec, spec.web_url(&self.config.web_base_url), now);

        begin(Stage::FetchMetadata);
        if let Some(metadata) = settle(Stage::FetchMetadata, self.fetcher.repository(&spec).await)? {
            dataset.apply_metadata(metadata);
        }

        begin(Stage::FetchCommitActivity);
        if let Some(history) = settle(Stage::FetchCommitActivity, self.fetcher.commit_activity(&spec).await)? {
            dataset.apply_commit_history(history);
        }

        begin(Stage::FetchContributors);
        if let Some(count) = settle(Stage::FetchContributors, self.fetcher.contributors(&spec, MAX_CONTRIBUTORS).await)? {
            dataset.apply_contributors(count);
        }

        begin(Stage::FetchLanguages);
        if let Some(languages) = settle(Stage::FetchLanguages, self.fetcher.languages(&spec).await)? {
            dataset.apply_languages(languages);
        }

        begin(Stage::FetchReadme);
        if let Some(readme) = settle(Stage::FetchReadme, self.fetcher.readme(&spec).await)? {
            dataset.apply_readme(readme);
        }

        begin(Stage::CheckSecurity);
        if let Some(security) = settle(Stage::CheckSecurity, self.fetcher.security(&spec).await)? {
            dataset.apply_security(security);
        }

        if self.config.enable_local_clone {
            begin(Stage::CloneRepository);
            let url = spec.clone_url(&self.config.web_base_url);
            match settle(Stage::CloneRepository, self.analyzer.clone_repository(&url).await)? {
                Some(checkout) => {
                    self.analyze_checkout(&mut dataset, &checkout, now).await?;

                    begin(Stage::Cleanup);
                    let _ = settle(Stage::Cleanup, checkout.close())?;
                }
                None => skip_local_stages("the repository could not be cloned"),
            }
        } else {
            skip_local_stages("local cloning is disabled");
        }

        log_summary(&dataset);
        Ok(dataset)
    }

    async fn analyze_checkout(
        &self,
        dataset: &mut RepositoryDataset,
        checkout: &Checkout,
        now: DateTime<Utc>,
    ) -> Result<(), AcquisitionError> {
        begin(Stage::AnalyzeHistory);
        if let Some(history) = settle(Stage::AnalyzeHistory, self.analyzer.history(checkout, now).await)? {
            if history.total_commits > 0 {
                dataset.apply_commit_history(history);
            } else {
                log::info!(target: LOG_TARGET, "Local history has no commits, keeping API-derived commit data");
            }
        }

        begin(Stage::CountExtensions);
        if let Some(counts) = settle(Stage::CountExtensions, self.analyzer.count_extensions(checkout).await)? {
            dataset.apply_extension_counts(counts);
        }

        begin(Stage::SampleFiles);
        if let Some(samples) = settle(Stage::SampleFiles, self.analyzer.sample_files(checkout).await)? {
            dataset.apply_samples(samples);
        }

        begin(Stage::ExtractDependencies);
        if let Some(dependencies) = settle(Stage::ExtractDependencies, self.analyzer.dependencies(checkout).await)? {
            dataset.apply_dependencies(dependencies);
        }

        Ok(())
    }
}

fn begin(stage: Stage) {
    log::info!(target: LOG_TARGET, "Stage {}: {stage}", stage.label());
}

fn skip_local_stages(reason: &str) {
    log::info!(target: LOG_TARGET, "Using API data only, {reason}");
    for stage in Stage::iter().filter(|s| s.needs_clone()) {
        log::debug!(target: LOG_TARGET, "Stage {}: {stage} skipped", stage.label());
    }
}

/// Apply the stage's failure policy to its outcome.
///
/// Returns the stage's value, `None` when the failure only degrades the dataset, or the
/// error itself when the failure ends the run.
fn settle<T, E: Into<AcquisitionError>>(stage: Stage, outcome: Result<T, E>) -> Result<Option<T>, AcquisitionError> {
    let e = match outcome {
        Ok(value) => return Ok(Some(value)),
        Err(e) => e.into(),
    };

    match stage.policy() {
        FailurePolicy::Abort => {
            log::error!(target: LOG_TARGET, "Stage {} ({stage}) failed [{}]: {e}", stage.label(), e.kind());
            Err(e)
        }
        FailurePolicy::Degrade | FailurePolicy::ApiOnly => {
            log::warn!(
                target: LOG_TARGET,
                "Stage {} ({stage}) failed [{}]: {e}; {}",
                stage.label(),
                e.kind(),
                stage.fallback()
            );
            Ok(None)
        }
    }
}

fn log_summary(dataset: &RepositoryDataset) {
    log::info!(
        target: LOG_TARGET,
        "Acquired '{}/{}': {} stars, {} forks, {} contributors, {} commits, {} extensions, {} samples, {} dependencies",
        dataset.owner,
        dataset.repo_name,
        dataset.stars,
        dataset.forks,
        dataset.contributors,
        dataset.total_commits,
        dataset.file_extension_counts.len(),
        dataset.analyzed_files.len(),
        dataset.core_dependencies.len()
    );
}
