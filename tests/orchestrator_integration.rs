//! End-to-end tests of the acquisition pipeline against a mocked API and a scripted VCS

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use core::time::Duration;
use reporank::acquisition::codebase::{CloneOptions, Vcs};
use reporank::acquisition::hosting::Client;
use reporank::acquisition::{AcquisitionError, ApiError, Ecosystem, Orchestrator, YearMonth};
use reporank::config::Config;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "/repos/octocat/Hello-World";

/// VCS stand-in that materializes a fixed file tree and reports fixed commit times
#[derive(Debug, Clone, Default)]
struct ScriptedVcs {
    files: Vec<(&'static str, String)>,
    commit_times: Vec<DateTime<Utc>>,
    fail_clone: bool,
    fail_history: bool,
    clones: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedVcs {
    fn with_files(files: Vec<(&'static str, String)>, commit_times: Vec<DateTime<Utc>>) -> Self {
        Self {
            files,
            commit_times,
            ..Self::default()
        }
    }

    fn clone_dirs(&self) -> Vec<PathBuf> {
        self.clones.lock().unwrap().clone()
    }
}

impl Vcs for ScriptedVcs {
    async fn clone_repo(&self, url: &str, dest: &Path, _options: CloneOptions) -> Result<(), AcquisitionError> {
        self.clones.lock().unwrap().push(dest.to_path_buf());

        if self.fail_clone {
            return Err(AcquisitionError::Clone {
                url: url.to_string(),
                reason: "repository not found".to_string(),
            });
        }

        for (relative, contents) in &self.files {
            let target = dest.join(relative);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(target, contents).unwrap();
        }

        Ok(())
    }

    async fn commit_times(&self, _repo: &Path) -> Result<Vec<DateTime<Utc>>, AcquisitionError> {
        if self.fail_history {
            return Err(AcquisitionError::Vcs {
                command: "log".to_string(),
                reason: "not a git repository".to_string(),
            });
        }
        Ok(self.commit_times.clone())
    }
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn now() -> DateTime<Utc> {
    at("2024-06-15T12:00:00Z")
}

fn lines(n: usize) -> String {
    "x = 1\n".repeat(n)
}

fn sample_tree() -> Vec<(&'static str, String)> {
    vec![
        ("src/main.py", lines(10)),
        ("src/util.py", lines(5)),
        ("tests/test_main.py", lines(50)),
        ("README.md", "# Hello World\n".to_string()),
        ("requirements.txt", "flask==2.0.1\nrequests\n".to_string()),
        ("package.json", r#"{"dependencies": {"left-pad": "^1.3.0"}}"#.to_string()),
    ]
}

fn config(mock_server: &MockServer, temp_root: &TempDir) -> Config {
    Config {
        api_base_url: mock_server.uri(),
        temp_dir: Some(Utf8PathBuf::from_path_buf(temp_root.path().to_path_buf()).unwrap()),
        ..Config::default()
    }
}

fn orchestrator(mock_server: &MockServer, config: Config, vcs: ScriptedVcs) -> Orchestrator<ScriptedVcs> {
    let client = Client::new(None, mock_server.uri(), Duration::from_secs(5), 2)
        .unwrap()
        .with_retry_delays(Duration::from_millis(1), Duration::from_millis(1));
    Orchestrator::new(config, client, vcs)
}

async fn mount_json(mock_server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
}

async fn mount_repository(mock_server: &MockServer) {
    mount_json(
        mock_server,
        REPO,
        json!({
            "description": "My first repository on GitHub!",
            "created_at": "2011-01-26T19:01:12Z",
            "updated_at": "2024-05-01T10:00:00Z",
            "default_branch": "master",
            "language": "Python",
            "stargazers_count": 2500,
            "forks_count": 2000,
            "license": { "name": "MIT License" }
        }),
    )
    .await;
}

async fn mount_full_api(mock_server: &MockServer) {
    mount_repository(mock_server).await;
    mount_json(mock_server, &format!("{REPO}/stats/contributors"), json!([{ "total": 42 }])).await;
    // 2024-01-28, UTC
    mount_json(
        mock_server,
        &format!("{REPO}/stats/commit_activity"),
        json!([{ "week": 1_706_400_000_i64, "total": 4 }]),
    )
    .await;
    mount_json(mock_server, &format!("{REPO}/contributors"), json!([{ "login": "octocat" }, { "login": "hubot" }])).await;
    mount_json(mock_server, &format!("{REPO}/languages"), json!({ "Python": 900, "Shell": 100 })).await;
    mount_json(
        mock_server,
        &format!("{REPO}/readme"),
        json!({ "content": "SGVsbG8gV29ybGQh", "encoding": "base64" }),
    )
    .await;
    mount_json(mock_server, &format!("{REPO}/contents/SECURITY.md"), json!({})).await;
}

fn leftover_entries(temp_root: &TempDir) -> usize {
    fs::read_dir(temp_root.path()).map_or(0, Iterator::count)
}

#[tokio::test]
async fn test_full_acquisition() {
    let mock_server = MockServer::start().await;
    mount_full_api(&mock_server).await;

    let temp_root = tempfile::tempdir().unwrap();
    let commits = vec![at("2024-06-01T08:00:00Z"), at("2024-05-20T08:00:00Z"), at("2019-01-01T08:00:00Z")];
    let vcs = ScriptedVcs::with_files(sample_tree(), commits);

    let dataset = orchestrator(&mock_server, config(&mock_server, &temp_root), vcs.clone())
        .acquire_at("https://github.com/octocat/Hello-World", now())
        .await
        .unwrap();

    assert_eq!(dataset.owner, "octocat");
    assert_eq!(dataset.repo_name, "Hello-World");
    assert_eq!(dataset.github_url, "https://github.com/octocat/Hello-World");
    assert_eq!(dataset.analysis_date, now());
    assert_eq!(dataset.default_branch, "master");
    assert_eq!(dataset.stars, 2500);
    assert_eq!(dataset.forks, 2000);
    assert_eq!(dataset.contributors, 2);
    assert_eq!(dataset.license.as_deref(), Some("MIT License"));
    assert_eq!(dataset.detected_languages, vec!["Python", "Shell"]);
    assert!(dataset.security.has_security_md);
    assert!(!dataset.security.has_dependabot);

    // local history replaces the API-derived numbers
    assert_eq!(dataset.total_commits, 3);
    assert_eq!(dataset.last_commit, Some(at("2024-06-01T08:00:00Z")));
    assert_eq!(dataset.monthly_commits.len(), 2);
    assert_eq!(dataset.monthly_commits[&YearMonth::new(2024, 6).unwrap()], 1);
    assert!(dataset.monthly_commits.values().sum::<u64>() <= dataset.total_commits);

    assert_eq!(dataset.file_extension_counts.get(".py"), Some(&3));
    assert_eq!(dataset.file_extension_counts.get(".md"), Some(&1));
    assert_eq!(dataset.file_extension_counts.get(".json"), Some(&1));
    assert_eq!(dataset.file_extension_counts.get(".txt"), Some(&1));

    assert_eq!(dataset.analyzed_files, vec!["src/main.py", "src/util.py"]);
    assert_eq!(dataset.code_samples["README.md"], "Hello World!");
    assert_eq!(dataset.code_samples["src/main.py"], lines(10));
    assert_eq!(dataset.code_samples.len(), 3);

    let deps: Vec<_> = dataset.core_dependencies.iter().map(|d| (d.name.as_str(), d.ecosystem)).collect();
    assert_eq!(
        deps,
        vec![("flask", Ecosystem::Python), ("requests", Ecosystem::Python), ("left-pad", Ecosystem::NodeJs)]
    );

    let clones = vcs.clone_dirs();
    assert_eq!(clones.len(), 1);
    assert!(!clones[0].exists());
    assert_eq!(leftover_entries(&temp_root), 0);
}

#[tokio::test]
async fn test_clone_failure_switches_to_api_only() {
    let mock_server = MockServer::start().await;
    mount_full_api(&mock_server).await;

    let temp_root = tempfile::tempdir().unwrap();
    let vcs = ScriptedVcs {
        fail_clone: true,
        ..ScriptedVcs::with_files(sample_tree(), Vec::new())
    };

    let dataset = orchestrator(&mock_server, config(&mock_server, &temp_root), vcs.clone())
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap();

    assert_eq!(dataset.stars, 2500);
    assert_eq!(dataset.total_commits, 42);
    assert_eq!(dataset.last_commit.unwrap().timestamp(), 1_706_400_000);
    assert!(dataset.file_extension_counts.is_empty());
    assert!(dataset.analyzed_files.is_empty());
    assert!(dataset.core_dependencies.is_empty());
    assert_eq!(dataset.code_samples.keys().collect::<Vec<_>>(), vec!["README.md"]);

    assert_eq!(vcs.clone_dirs().len(), 1);
    assert_eq!(leftover_entries(&temp_root), 0);
}

#[tokio::test]
async fn test_empty_local_history_keeps_api_commits() {
    let mock_server = MockServer::start().await;
    mount_full_api(&mock_server).await;

    let temp_root = tempfile::tempdir().unwrap();
    let vcs = ScriptedVcs::with_files(sample_tree(), Vec::new());

    let dataset = orchestrator(&mock_server, config(&mock_server, &temp_root), vcs)
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap();

    assert_eq!(dataset.total_commits, 42);
    assert_eq!(dataset.analyzed_files.len(), 2);
}

#[tokio::test]
async fn test_failed_local_history_keeps_api_commits() {
    let mock_server = MockServer::start().await;
    mount_full_api(&mock_server).await;

    let temp_root = tempfile::tempdir().unwrap();
    let vcs = ScriptedVcs {
        fail_history: true,
        ..ScriptedVcs::with_files(sample_tree(), vec![now()])
    };

    let dataset = orchestrator(&mock_server, config(&mock_server, &temp_root), vcs)
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap();

    assert_eq!(dataset.total_commits, 42);
    assert_eq!(dataset.core_dependencies.len(), 3);
    assert_eq!(leftover_entries(&temp_root), 0);
}

#[tokio::test]
async fn test_missing_repository_aborts_before_cloning() {
    let mock_server = MockServer::start().await;

    let temp_root = tempfile::tempdir().unwrap();
    let vcs = ScriptedVcs::with_files(sample_tree(), Vec::new());

    let err = orchestrator(&mock_server, config(&mock_server, &temp_root), vcs.clone())
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::Api(ApiError::NotFound { .. })));
    assert!(vcs.clone_dirs().is_empty());
}

#[tokio::test]
async fn test_rate_limited_metadata_aborts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1718460000"),
        )
        .mount(&mock_server)
        .await;

    let temp_root = tempfile::tempdir().unwrap();
    let err = orchestrator(&mock_server, config(&mock_server, &temp_root), ScriptedVcs::default())
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap_err();

    assert_eq!(err.rate_limit_reset().unwrap().timestamp(), 1_718_460_000);
}

#[tokio::test]
async fn test_unparseable_reference_aborts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let temp_root = tempfile::tempdir().unwrap();
    let err = orchestrator(&mock_server, config(&mock_server, &temp_root), ScriptedVcs::default())
        .acquire_at("not a repository", now())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::Parse { ref input } if input == "not a repository"));
}

#[tokio::test]
async fn test_failing_optional_stages_degrade() {
    let mock_server = MockServer::start().await;
    mount_repository(&mock_server).await;

    // rate limit on the statistics, server errors everywhere else
    Mock::given(method("GET"))
        .and(path(format!("{REPO}/stats/commit_activity")))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let temp_root = tempfile::tempdir().unwrap();
    let mut config = config(&mock_server, &temp_root);
    config.enable_local_clone = false;

    let vcs = ScriptedVcs::with_files(sample_tree(), vec![now()]);
    let dataset = orchestrator(&mock_server, config, vcs.clone())
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap();

    assert_eq!(dataset.stars, 2500);
    assert_eq!(dataset.total_commits, 0);
    assert!(dataset.monthly_commits.is_empty());
    assert_eq!(dataset.contributors, 0);
    assert!(dataset.detected_languages.is_empty());
    assert!(dataset.code_samples.is_empty());
    assert!(!dataset.security.has_security_md);
    assert!(vcs.clone_dirs().is_empty());
}

#[tokio::test]
async fn test_dataset_serializes_month_keys() {
    let mock_server = MockServer::start().await;
    mount_full_api(&mock_server).await;

    let temp_root = tempfile::tempdir().unwrap();
    let vcs = ScriptedVcs::with_files(sample_tree(), vec![at("2024-03-02T00:00:00Z")]);

    let dataset = orchestrator(&mock_server, config(&mock_server, &temp_root), vcs)
        .acquire_at("octocat/Hello-World", now())
        .await
        .unwrap();

    let value = serde_json::to_value(&dataset).unwrap();
    assert_eq!(value["monthly_commits"]["2024-03"], 1);
    assert_eq!(value["core_dependencies"][2]["ecosystem"], "Node.js");
}
