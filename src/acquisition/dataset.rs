//! The dataset produced by the acquisition pipeline and the per-stage deltas merged into it.

use super::RepoSpec;
use chrono::{DateTime, Datelike, Utc};
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Everything the pipeline learned about one repository.
///
/// Every optional field tolerates being left at its default: a stage that fails leaves its
/// fields untouched, so consumers must treat zero and empty values as "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDataset {
    pub github_url: String,
    pub owner: String,
    pub repo_name: String,
    pub analysis_date: DateTime<Utc>,

    pub description: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub default_branch: String,
    pub primary_language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub contributors: u64,
    pub license: Option<String>,

    pub total_commits: u64,
    pub last_commit: Option<DateTime<Utc>>,
    pub monthly_commits: BTreeMap<YearMonth, u64>,

    pub file_extension_counts: BTreeMap<String, u64>,
    pub detected_languages: Vec<String>,
    pub language_breakdown: BTreeMap<String, f64>,
    pub core_dependencies: Vec<Dependency>,

    pub analyzed_files: Vec<String>,
    pub code_samples: BTreeMap<String, String>,

    pub security: SecurityStatus,
}

/// Key under which a fetched README is stored among the code samples
pub const README_SAMPLE_KEY: &str = "README.md";

impl RepositoryDataset {
    /// An empty dataset carrying only the repository identity
    #[must_use]
    pub fn new(spec: &RepoSpec, github_url: String, analysis_date: DateTime<Utc>) -> Self {
        Self {
            github_url,
            owner: spec.owner().to_string(),
            repo_name: spec.repo().to_string(),
            analysis_date,
            ..Self::default()
        }
    }

    pub(crate) fn apply_metadata(&mut self, metadata: RepoMetadata) {
        self.description = metadata.description;
        self.created_date = metadata.created_date;
        self.last_updated = metadata.last_updated;
        self.default_branch = metadata.default_branch;
        self.primary_language = metadata.primary_language;
        self.stars = metadata.stars;
        self.forks = metadata.forks;
        self.license = metadata.license;
    }

    /// Replace the commit history wholesale; sources are never merged
    pub(crate) fn apply_commit_history(&mut self, history: CommitHistory) {
        self.total_commits = history.total_commits;
        self.last_commit = history.last_commit;
        self.monthly_commits = history.monthly_commits;
    }

    pub(crate) const fn apply_contributors(&mut self, count: u64) {
        self.contributors = count;
    }

    pub(crate) fn apply_languages(&mut self, languages: LanguageBreakdown) {
        self.detected_languages = languages.detected;
        self.language_breakdown = languages.percentages;
    }

    pub(crate) fn apply_readme(&mut self, readme: String) {
        if !readme.is_empty() {
            let _ = self.code_samples.insert(README_SAMPLE_KEY.to_string(), readme);
        }
    }

    pub(crate) const fn apply_security(&mut self, security: SecurityStatus) {
        self.security = security;
    }

    pub(crate) fn apply_extension_counts(&mut self, counts: BTreeMap<String, u64>) {
        self.file_extension_counts = counts;
    }

    pub(crate) fn apply_samples(&mut self, samples: SampleSet) {
        self.analyzed_files = samples.files;
        self.code_samples.extend(samples.contents);
    }

    pub(crate) fn apply_dependencies(&mut self, dependencies: Vec<Dependency>) {
        self.core_dependencies = dependencies;
    }
}

/// Repository metadata returned by the hosted API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoMetadata {
    pub description: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub default_branch: String,
    pub primary_language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub license: Option<String>,
}

/// Commit statistics from either the hosted API or the local clone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitHistory {
    pub total_commits: u64,
    pub last_commit: Option<DateTime<Utc>>,
    pub monthly_commits: BTreeMap<YearMonth, u64>,
}

/// Language shares derived from the API's byte counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageBreakdown {
    /// Languages ordered by descending byte count
    pub detected: Vec<String>,
    pub percentages: BTreeMap<String, f64>,
}

/// Files selected from the clone along with their contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    pub files: Vec<String>,
    pub contents: BTreeMap<String, String>,
}

/// Presence of security-related repository files and features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityStatus {
    pub has_security_policy: bool,
    pub has_security_md: bool,
    pub has_dependabot: bool,
    pub has_code_scanning: bool,
}

/// A dependency declared in one of the supported manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
}

impl Dependency {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem,
        }
    }
}

/// Package ecosystems whose manifests are understood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Ecosystem {
    Python,
    #[serde(rename = "Node.js")]
    #[strum(to_string = "Node.js")]
    NodeJs,
    Go,
    Rust,
}

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is outside `1..=12` or `year` cannot be written with four digits
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        ((0..=9999).contains(&year) && (1..=12).contains(&month)).then_some(Self { year, month })
    }

    /// The month containing `timestamp`, in UTC, if its year has four digits
    #[must_use]
    pub fn of(timestamp: DateTime<Utc>) -> Option<Self> {
        Self::new(timestamp.year(), timestamp.month())
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{s}' is not a YYYY-MM month");

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year, 4) || !digits(month, 2) {
            return Err(invalid());
        }

        year.parse::<i32>()
            .ok()
            .zip(month.parse::<u32>().ok())
            .and_then(|(year, month)| Self::new(year, month))
            .ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
