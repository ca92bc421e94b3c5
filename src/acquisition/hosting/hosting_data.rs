//! Wire types for the GitHub REST responses the fetcher consumes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RepositoryResponse {
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub default_branch: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    pub license: Option<LicenseResponse>,
}

#[derive(Debug, Deserialize)]
pub struct LicenseResponse {
    pub name: Option<String>,
}

/// One entry of `/stats/contributors`
#[derive(Debug, Deserialize)]
pub struct ContributorStats {
    #[serde(default)]
    pub total: u64,
}

/// One entry of `/stats/commit_activity`
#[derive(Debug, Deserialize)]
pub struct WeeklyActivity {
    /// Unix timestamp of the start of the week
    pub week: i64,
    #[serde(default)]
    pub total: u64,
}

/// Response of `/readme`
#[derive(Debug, Deserialize)]
pub struct ReadmeResponse {
    #[serde(default)]
    pub content: String,
    pub encoding: Option<String>,
}
