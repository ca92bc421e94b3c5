use super::LOG_TARGET;
use super::client::Client;
use super::hosting_data::{ContributorStats, ReadmeResponse, RepositoryResponse, WeeklyActivity};
use crate::acquisition::dataset::{CommitHistory, LanguageBreakdown, RepoMetadata, SecurityStatus, YearMonth};
use crate::acquisition::{ApiError, RepoSpec};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// GitHub caps `per_page` at this value
const MAX_PER_PAGE: usize = 100;

const SECURITY_POLICY_PATHS: [&str; 3] = ["SECURITY.md", ".github/SECURITY.md", "docs/SECURITY.md"];
const DEPENDABOT_PATHS: [&str; 2] = [".github/dependabot.yml", ".github/dependabot.yaml"];

/// Repository-level queries against the GitHub API.
///
/// Each query is independent; one failing has no effect on the others.
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: Client,
}

impl MetadataFetcher {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Core repository metadata
    pub async fn repository(&self, spec: &RepoSpec) -> Result<RepoMetadata, ApiError> {
        let path = repo_path(spec, "");
        let repo: RepositoryResponse = decode(&path, self.client.get(&path, &[]).await?).await?;

        Ok(RepoMetadata {
            description: repo.description,
            created_date: repo.created_at,
            last_updated: repo.updated_at,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
            primary_language: repo.language,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            license: repo.license.and_then(|l| l.name),
        })
    }

    /// Commit totals and the weekly activity of the past year, bucketed by month.
    ///
    /// The total comes from contributor statistics and falls back to 0 when they are
    /// unavailable; it is never lower than the sum of the weekly series.
    pub async fn commit_activity(&self, spec: &RepoSpec) -> Result<CommitHistory, ApiError> {
        let total = match self.contributor_commit_total(spec).await {
            Ok(total) => total,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Contributor statistics unavailable for '{spec}': {e}");
                0
            }
        };

        let path = repo_path(spec, "/stats/commit_activity");
        let weeks: Vec<WeeklyActivity> = decode_stats(&path, self.client.get(&path, &[]).await?).await?;

        Ok(summarize_weekly_activity(total, &weeks))
    }

    /// Number of contributors, anonymous ones included, up to `max_contributors`
    pub async fn contributors(&self, spec: &RepoSpec, max_contributors: usize) -> Result<u64, ApiError> {
        let path = repo_path(spec, "/contributors");
        let per_page = max_contributors.clamp(1, MAX_PER_PAGE).to_string();
        let resp = self.client.get(&path, &[("per_page", &per_page), ("anon", "true")]).await?;

        // empty repositories answer with 204 and no body
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }

        let contributors: Vec<serde_json::Value> = decode(&path, resp).await?;
        Ok(contributors.len() as u64)
    }

    /// Language shares computed from the byte counts GitHub reports
    pub async fn languages(&self, spec: &RepoSpec) -> Result<LanguageBreakdown, ApiError> {
        let path = repo_path(spec, "/languages");
        let bytes: BTreeMap<String, u64> = decode(&path, self.client.get(&path, &[]).await?).await?;
        Ok(language_breakdown(&bytes))
    }

    /// Decoded README text, or an empty string when the repository has none
    pub async fn readme(&self, spec: &RepoSpec) -> Result<String, ApiError> {
        let path = repo_path(spec, "/readme");
        let resp = match self.client.get(&path, &[]).await {
            Ok(resp) => resp,
            Err(ApiError::NotFound { .. }) => return Ok(String::new()),
            Err(e) => return Err(e),
        };

        let readme: ReadmeResponse = decode(&path, resp).await?;
        if let Some(encoding) = readme.encoding.as_deref()
            && encoding != "base64"
        {
            log::debug!(target: LOG_TARGET, "README of '{spec}' uses '{encoding}' encoding, using it verbatim");
            return Ok(readme.content);
        }

        decode_base64_text(&readme.content).map_err(|e| ApiError::Decode {
            path,
            source: Box::new(e),
        })
    }

    /// Presence of a security policy, Dependabot configuration, and code scanning.
    ///
    /// Code scanning can only be observed with an authenticated client.
    pub async fn security(&self, spec: &RepoSpec) -> Result<SecurityStatus, ApiError> {
        let mut status = SecurityStatus::default();

        for file in SECURITY_POLICY_PATHS {
            if self.exists(spec, &format!("/contents/{file}"), &[]).await? {
                status.has_security_md = true;
                status.has_security_policy = true;
                break;
            }
        }

        for file in DEPENDABOT_PATHS {
            if self.exists(spec, &format!("/contents/{file}"), &[]).await? {
                status.has_dependabot = true;
                break;
            }
        }

        if self.client.is_authenticated() {
            status.has_code_scanning = self.exists(spec, "/code-scanning/alerts", &[("per_page", "1")]).await?;
        }

        Ok(status)
    }

    async fn contributor_commit_total(&self, spec: &RepoSpec) -> Result<u64, ApiError> {
        let path = repo_path(spec, "/stats/contributors");
        let stats: Vec<ContributorStats> = decode_stats(&path, self.client.get(&path, &[]).await?).await?;
        Ok(stats.iter().map(|s| s.total).sum())
    }

    /// Whether a repository sub-resource answers successfully.
    ///
    /// Only an exhausted rate limit is surfaced as an error; any other failure counts as absent.
    async fn exists(&self, spec: &RepoSpec, suffix: &str, params: &[(&str, &str)]) -> Result<bool, ApiError> {
        let path = repo_path(spec, suffix);
        match self.client.get(&path, params).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound { .. }) => Ok(false),
            Err(e @ ApiError::RateLimited { .. }) => Err(e),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Treating '{path}' as absent: {e}");
                Ok(false)
            }
        }
    }
}

fn repo_path(spec: &RepoSpec, suffix: &str) -> String {
    format!("/repos/{}/{}{suffix}", spec.owner(), spec.repo())
}

async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, ApiError> {
    resp.json::<T>().await.map_err(|e| ApiError::Decode {
        path: path.to_string(),
        source: Box::new(e),
    })
}

/// Statistics endpoints answer `202 Accepted` while GitHub is still computing them
async fn decode_stats<T: DeserializeOwned>(path: &str, resp: Response) -> Result<Vec<T>, ApiError> {
    if matches!(resp.status(), StatusCode::ACCEPTED | StatusCode::NO_CONTENT) {
        log::debug!(target: LOG_TARGET, "Statistics for '{path}' are not ready yet");
        return Ok(Vec::new());
    }

    decode(path, resp).await
}

fn decode_base64_text(content: &str) -> Result<String, base64::DecodeError> {
    let compact: String = content.split_whitespace().collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn summarize_weekly_activity(contributor_total: u64, weeks: &[WeeklyActivity]) -> CommitHistory {
    let mut monthly_commits: BTreeMap<YearMonth, u64> = BTreeMap::new();
    let mut last_commit = None;
    let mut weekly_sum = 0;

    for week in weeks {
        let Some(start) = DateTime::from_timestamp(week.week, 0) else {
            continue;
        };
        let Some(month) = YearMonth::of(start) else {
            continue;
        };

        *monthly_commits.entry(month).or_default() += week.total;
        weekly_sum += week.total;

        if week.total > 0 && last_commit.is_none_or(|last| start > last) {
            last_commit = Some(start);
        }
    }

    CommitHistory {
        total_commits: contributor_total.max(weekly_sum),
        last_commit,
        monthly_commits,
    }
}

#[expect(clippy::cast_precision_loss, reason = "byte counts stay far below 2^52")]
fn language_breakdown(bytes: &BTreeMap<String, u64>) -> LanguageBreakdown {
    let total: u64 = bytes.values().sum();
    if total == 0 {
        return LanguageBreakdown::default();
    }

    let mut ranked: Vec<(&String, u64)> = bytes.iter().map(|(lang, count)| (lang, *count)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let percentages = bytes
        .iter()
        .map(|(lang, count)| {
            let share = *count as f64 / total as f64 * 100.0;
            (lang.clone(), (share * 100.0).round() / 100.0)
        })
        .collect();

    LanguageBreakdown {
        detected: ranked.into_iter().map(|(lang, _)| lang.clone()).collect(),
        percentages,
    }
}
