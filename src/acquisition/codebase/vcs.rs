//! Access to the local version-control tool.
//!
//! Local git support is optional: [`SystemVcs::detect`] probes for a usable `git` binary at
//! startup and falls back to [`UnavailableVcs`], which fails every operation with
//! [`AcquisitionError::VcsUnavailable`] so the pipeline degrades to API-only mode.

use super::LOG_TARGET;
use crate::acquisition::AcquisitionError;
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Timeout for git operations other than cloning
const GIT_QUERY_TIMEOUT: Duration = Duration::from_mins(2);

/// How a repository is cloned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneOptions {
    /// Fetch only the most recent commit
    pub shallow: bool,

    /// Upper bound on the duration of the clone
    pub timeout: Duration,
}

/// The version-control operations the local analyzer needs.
pub trait Vcs: Send + Sync {
    /// Clone `url` into the existing, empty directory `dest`, fetching only the default branch
    fn clone_repo(&self, url: &str, dest: &Path, options: CloneOptions) -> impl Future<Output = Result<(), AcquisitionError>> + Send;

    /// Commit timestamps of every commit reachable from `HEAD` in the working copy at `repo`
    fn commit_times(&self, repo: &Path) -> impl Future<Output = Result<Vec<DateTime<Utc>>, AcquisitionError>> + Send;
}

/// Drives the `git` command-line tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    /// Whether a working `git` binary is on the path
    pub async fn is_available() -> bool {
        match run_git(&["--version"], GIT_QUERY_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                log::debug!(target: LOG_TARGET, "Found {}", String::from_utf8_lossy(&output.stdout).trim());
                true
            }
            _ => false,
        }
    }
}

impl Vcs for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path, options: CloneOptions) -> Result<(), AcquisitionError> {
        let dest_str = dest.to_str().ok_or_else(|| AcquisitionError::Clone {
            url: url.to_string(),
            reason: format!("invalid UTF-8 in clone path '{}'", dest.display()),
        })?;

        let mut args = vec!["clone", "--quiet", "--single-branch", "--no-tags"];
        if options.shallow {
            args.extend(["--depth", "1"]);
        }
        args.extend([url, dest_str]);

        let output = run_git(&args, options.timeout).await.map_err(|e| AcquisitionError::Clone {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        check_git_output(&output, "clone").map_err(|e| AcquisitionError::Clone {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn commit_times(&self, repo: &Path) -> Result<Vec<DateTime<Utc>>, AcquisitionError> {
        let path_str = repo.to_str().ok_or_else(|| AcquisitionError::Vcs {
            command: "log".to_string(),
            reason: format!("invalid UTF-8 in repository path '{}'", repo.display()),
        })?;

        // %ct = committer date, UNIX timestamp
        let output = run_git(&["-C", path_str, "log", "--format=%ct", "HEAD"], GIT_QUERY_TIMEOUT).await?;
        check_git_output(&output, "log")?;

        Ok(parse_commit_times(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Stand-in used when no local git support exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableVcs;

impl Vcs for UnavailableVcs {
    async fn clone_repo(&self, _url: &str, _dest: &Path, _options: CloneOptions) -> Result<(), AcquisitionError> {
        Err(AcquisitionError::VcsUnavailable)
    }

    async fn commit_times(&self, _repo: &Path) -> Result<Vec<DateTime<Utc>>, AcquisitionError> {
        Err(AcquisitionError::VcsUnavailable)
    }
}

/// The VCS implementation selected for this system.
#[derive(Debug, Clone, Copy)]
pub enum SystemVcs {
    Git(GitCli),
    Unavailable(UnavailableVcs),
}

impl SystemVcs {
    /// Probe for `git` and pick the matching implementation
    pub async fn detect() -> Self {
        if GitCli::is_available().await {
            Self::Git(GitCli)
        } else {
            log::warn!(target: LOG_TARGET, "git was not found; repositories will be analyzed through the API only");
            Self::Unavailable(UnavailableVcs)
        }
    }
}

impl Vcs for SystemVcs {
    async fn clone_repo(&self, url: &str, dest: &Path, options: CloneOptions) -> Result<(), AcquisitionError> {
        match self {
            Self::Git(git) => git.clone_repo(url, dest, options).await,
            Self::Unavailable(none) => none.clone_repo(url, dest, options).await,
        }
    }

    async fn commit_times(&self, repo: &Path) -> Result<Vec<DateTime<Utc>>, AcquisitionError> {
        match self {
            Self::Git(git) => git.commit_times(repo).await,
            Self::Unavailable(none) => none.commit_times(repo).await,
        }
    }
}

fn parse_commit_times(stdout: &str) -> Vec<DateTime<Utc>> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<i64>().ok())
        .filter_map(|ts| DateTime::from_timestamp(ts, 0))
        .collect()
}

fn check_git_output(output: &Output, command: &str) -> Result<(), AcquisitionError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AcquisitionError::Vcs {
            command: command.to_string(),
            reason: stderr.trim().to_string(),
        });
    }
    Ok(())
}

async fn run_git(args: &[&str], timeout: Duration) -> Result<Output, AcquisitionError> {
    let command = args.join(" ");
    let child = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AcquisitionError::Vcs {
            command: command.clone(),
            reason: format!("could not spawn git: {e}"),
        })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AcquisitionError::Vcs {
            command,
            reason: e.to_string(),
        }),
        Err(_) => Err(AcquisitionError::Vcs {
            command,
            reason: format!("timed out after {} seconds", timeout.as_secs()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitStatus;

    fn exit_status(code: i32) -> ExitStatus {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(code << 8)
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(code.cast_unsigned())
        }
    }

    #[test]
    fn test_check_git_output_success() {
        let output = Output {
            status: exit_status(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        check_git_output(&output, "log").unwrap();
    }

    #[test]
    fn test_check_git_output_failure() {
        let output = Output {
            status: exit_status(128),
            stdout: Vec::new(),
            stderr: b"fatal: repository not found\n".to_vec(),
        };

        let err = check_git_output(&output, "clone").unwrap_err();
        assert_eq!(err.to_string(), "'git clone' failed: fatal: repository not found");
    }

    #[test]
    fn test_parse_commit_times() {
        let times = parse_commit_times("1700000000\n1690000000\n\ngarbage\n");
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].timestamp(), 1_700_000_000);
        assert_eq!(times[1].timestamp(), 1_690_000_000);
    }

    #[tokio::test]
    async fn test_unavailable_vcs_fails_everything() {
        let vcs = UnavailableVcs;
        let options = CloneOptions {
            shallow: false,
            timeout: Duration::from_secs(1),
        };

        let err = vcs.clone_repo("https://github.com/o/r.git", Path::new("."), options).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::VcsUnavailable));

        let err = vcs.commit_times(Path::new(".")).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::VcsUnavailable));
    }
}
