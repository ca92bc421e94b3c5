use super::AcquisitionError;
use core::fmt::{Display, Formatter};
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Accepted reference shapes, tried in order; the first match wins.
static REFERENCE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^https?://[^/\s]+/([^/\s]+)/([^/\s]+)(?:/.*)?$").expect("valid URL pattern"),
        Regex::new(r"^[^/\s:]+\.[^/\s:]+/([^/\s]+)/([^/\s]+)(?:/.*)?$").expect("valid host pattern"),
        Regex::new(r"^([^/\s]+)/([^/\s]+)$").expect("valid owner/repo pattern"),
    ]
});

/// Identity of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSpec {
    owner: Arc<str>,
    repo: Arc<str>,
}

impl RepoSpec {
    /// Parse a repository reference.
    ///
    /// Accepts `https://host/owner/repo`, `host/owner/repo`, and `owner/repo`, each with
    /// an optional `.git` suffix and trailing slash.
    pub fn parse(reference: &str) -> Result<Self, AcquisitionError> {
        let trimmed = reference.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        REFERENCE_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(trimmed))
            .and_then(|caps| {
                let owner = caps.get(1)?.as_str();
                let repo = caps.get(2)?.as_str();
                let repo = repo.strip_suffix(".git").unwrap_or(repo);
                (!owner.is_empty() && !repo.is_empty()).then(|| Self::new(owner, repo))
            })
            .ok_or_else(|| AcquisitionError::Parse {
                input: reference.to_string(),
            })
    }

    #[must_use]
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: Arc::from(owner),
            repo: Arc::from(repo),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Browser URL of the repository under the given web base URL
    #[must_use]
    pub fn web_url(&self, web_base_url: &str) -> String {
        format!("{}/{}/{}", web_base_url.trim_end_matches('/'), self.owner, self.repo)
    }

    /// HTTPS clone URL of the repository under the given web base URL
    #[must_use]
    pub fn clone_url(&self, web_base_url: &str) -> String {
        format!("{}.git", self.web_url(web_base_url))
    }
}

impl Display for RepoSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_reference_shapes_agree() {
        let inputs = [
            "https://github.com/octocat/Hello-World",
            "https://github.com/octocat/Hello-World.git",
            "http://github.com/octocat/Hello-World/",
            "github.com/octocat/Hello-World",
            "github.com/octocat/Hello-World.git",
            "octocat/Hello-World",
            "octocat/Hello-World.git",
            "  octocat/Hello-World/  ",
        ];

        for input in inputs {
            let spec = RepoSpec::parse(input).unwrap();
            assert_eq!(spec.owner(), "octocat", "input: {input}");
            assert_eq!(spec.repo(), "Hello-World", "input: {input}");
        }
    }

    #[test]
    fn test_url_with_extra_segments() {
        let spec = RepoSpec::parse("https://github.com/tokio-rs/tokio/tree/master/tokio").unwrap();
        assert_eq!(spec.owner(), "tokio-rs");
        assert_eq!(spec.repo(), "tokio");
    }

    #[test]
    fn test_enterprise_host() {
        let spec = RepoSpec::parse("https://git.example.com/team/service.git").unwrap();
        assert_eq!(spec.owner(), "team");
        assert_eq!(spec.repo(), "service");
    }

    #[test]
    fn test_malformed_references() {
        for input in ["", "   ", "octocat", "/Hello-World", "octocat/", "a/b/c", "https://github.com/octocat", ".git"] {
            let err = RepoSpec::parse(input).unwrap_err();
            assert!(matches!(err, AcquisitionError::Parse { .. }), "input: {input}");
        }
    }

    #[test]
    fn test_urls() {
        let spec = RepoSpec::new("octocat", "Hello-World");
        assert_eq!(spec.web_url("https://github.com/"), "https://github.com/octocat/Hello-World");
        assert_eq!(spec.clone_url("https://github.com"), "https://github.com/octocat/Hello-World.git");
        assert_eq!(spec.to_string(), "octocat/Hello-World");
    }
}
