use super::LOG_TARGET;
use super::history::summarize_commits;
use super::manifests::extract_dependencies;
use super::vcs::{CloneOptions, Vcs};
use crate::acquisition::AcquisitionError;
use crate::acquisition::dataset::{CommitHistory, Dependency, SampleSet};
use crate::config::{Config, ScanRules};
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tokio::task::spawn_blocking;
use walkdir::{DirEntry, WalkDir};

/// Prefix of the temporary directories clones are created in
const CLONE_DIR_PREFIX: &str = "repo_";

/// A cloned working copy.
///
/// The directory is removed exactly once: by [`Checkout::close`], or when the checkout is
/// dropped on any other path.
#[derive(Debug)]
pub struct Checkout {
    dir: TempDir,
}

impl Checkout {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the working copy, reporting failures instead of ignoring them
    pub fn close(self) -> Result<(), AcquisitionError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|source| AcquisitionError::FileAccess { path, source })
    }
}

/// Inspects a local clone of a repository.
#[derive(Debug, Clone)]
pub struct LocalAnalyzer<V> {
    vcs: V,
    rules: ScanRules,
    temp_root: PathBuf,
    shallow: bool,
    clone_timeout: Duration,
    max_files: usize,
}

impl<V: Vcs> LocalAnalyzer<V> {
    #[must_use]
    pub fn new(vcs: V, config: &Config) -> Self {
        Self {
            vcs,
            rules: config.scan.clone(),
            temp_root: config.temp_root(),
            shallow: config.shallow_clone,
            clone_timeout: config.clone_timeout,
            max_files: config.max_files,
        }
    }

    /// Clone `url` into a fresh directory under the temp root.
    ///
    /// A failed clone leaves nothing behind.
    pub async fn clone_repository(&self, url: &str) -> Result<Checkout, AcquisitionError> {
        let clone_error = |reason: String| AcquisitionError::Clone {
            url: url.to_string(),
            reason,
        };

        fs::create_dir_all(&self.temp_root)
            .map_err(|e| clone_error(format!("could not create '{}': {e}", self.temp_root.display())))?;

        let dir = tempfile::Builder::new()
            .prefix(CLONE_DIR_PREFIX)
            .tempdir_in(&self.temp_root)
            .map_err(|e| clone_error(format!("could not create a directory under '{}': {e}", self.temp_root.display())))?;

        let options = CloneOptions {
            shallow: self.shallow,
            timeout: self.clone_timeout,
        };

        log::info!(target: LOG_TARGET, "Cloning '{url}' into '{}'", dir.path().display());
        let start_time = std::time::Instant::now();

        // on failure `dir` is dropped here, which removes any partial clone
        self.vcs.clone_repo(url, dir.path(), options).await.map_err(|e| match e {
            AcquisitionError::Clone { .. } => e,
            other => clone_error(other.to_string()),
        })?;

        log::debug!(target: LOG_TARGET, "Cloned '{url}' in {:.3}s", start_time.elapsed().as_secs_f64());
        Ok(Checkout { dir })
    }

    /// Commit statistics computed from the clone's own history
    pub async fn history(&self, checkout: &Checkout, now: DateTime<Utc>) -> Result<CommitHistory, AcquisitionError> {
        let times = self.vcs.commit_times(checkout.path()).await?;
        Ok(summarize_commits(&times, now))
    }

    /// Number of files per lowercase extension
    pub async fn count_extensions(&self, checkout: &Checkout) -> Result<BTreeMap<String, u64>, AcquisitionError> {
        let root = checkout.path().to_path_buf();
        let rules = self.rules.clone();
        spawn_blocking(move || count_extensions(&root, &rules)).await?
    }

    /// The largest non-test source files and their contents
    pub async fn sample_files(&self, checkout: &Checkout) -> Result<SampleSet, AcquisitionError> {
        let root = checkout.path().to_path_buf();
        let rules = self.rules.clone();
        let max_files = self.max_files;

        spawn_blocking(move || {
            let files = select_files(&root, &rules, max_files)?;
            let contents = read_files(&root, &files);
            Ok(SampleSet { files, contents })
        })
        .await?
    }

    /// Dependencies declared by the manifests at the root of the clone
    pub async fn dependencies(&self, checkout: &Checkout) -> Result<Vec<Dependency>, AcquisitionError> {
        let root = checkout.path().to_path_buf();
        Ok(spawn_blocking(move || extract_dependencies(&root)).await?)
    }
}

fn ensure_dir(root: &Path) -> Result<(), AcquisitionError> {
    let metadata = fs::metadata(root).map_err(|source| AcquisitionError::FileAccess {
        path: root.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return Err(AcquisitionError::FileAccess {
            path: root.to_path_buf(),
            source: io::Error::other("not a directory"),
        });
    }

    Ok(())
}

/// Walk `root` in file-name order, pruning directories rejected by `skip_dir`
fn walk_files(root: &Path, skip_dir: impl Fn(&str) -> bool) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || !skip_dir(&entry.file_name().to_string_lossy())
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
}

/// Lowercase extension with its leading dot, if the file has one
fn dotted_extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// `/`-separated form of `path` relative to `root`
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

fn count_extensions(root: &Path, rules: &ScanRules) -> Result<BTreeMap<String, u64>, AcquisitionError> {
    ensure_dir(root)?;

    let mut counts = BTreeMap::new();
    for entry in walk_files(root, |name| rules.is_skipped_dir(name)) {
        if let Some(ext) = dotted_extension(entry.path()) {
            *counts.entry(ext).or_default() += 1;
        }
    }

    Ok(counts)
}

fn select_files(root: &Path, rules: &ScanRules, max_files: usize) -> Result<Vec<String>, AcquisitionError> {
    ensure_dir(root)?;

    let mut candidates: Vec<(String, usize)> = walk_files(root, |name| rules.is_excluded_from_sampling(name))
        .filter_map(|entry| {
            let ext = dotted_extension(entry.path())?;
            if !rules.is_code_extension(&ext) {
                return None;
            }

            let relative = relative_path(root, entry.path())?;
            if rules.matches_skip_pattern(&relative) {
                return None;
            }

            match count_lines(entry.path()) {
                Ok(lines) => Some((relative, lines)),
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Could not read '{}' while ranking files: {e}", entry.path().display());
                    None
                }
            }
        })
        .collect();

    // stable sort keeps walk order among files of equal length
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.truncate(max_files);

    Ok(candidates.into_iter().map(|(path, _)| path).collect())
}

fn read_files(root: &Path, files: &[String]) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|file| {
            let path = root.join(file);
            let content = match fs::read(&path) {
                Ok(bytes) => decode_lossy(&bytes),
                Err(source) => {
                    let err = AcquisitionError::FileAccess { path, source };
                    log::warn!(target: LOG_TARGET, "{err}");
                    format!("[Error reading file: {}]", err_chain(&err))
                }
            };
            (file.clone(), content)
        })
        .collect()
}

fn err_chain(err: &AcquisitionError) -> String {
    match core::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

/// Decode UTF-8, dropping invalid byte sequences
fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Number of lines in a file, counting a final line without a terminator
fn count_lines(path: &Path) -> io::Result<usize> {
    BufReader::new(File::open(path)?)
        .split(b'\n')
        .try_fold(0, |count, line| line.map(|_| count + 1))
}
