use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

/// Name of the configuration file looked up when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "reporank.toml";

/// Settings consumed by the acquisition pipeline.
///
/// A `Config` is an ordinary value: it is loaded once, validated, and then passed by
/// reference to the orchestrator, which hands the relevant parts to the API client and
/// the local analyzer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URL of the hosted REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL used to build repository links and clone URLs
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,

    /// Timeout applied to each individual API request attempt
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub api_timeout: Duration,

    /// Total number of attempts for a transiently failing request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on the time a single clone may take
    #[serde(default = "default_clone_timeout", with = "humantime_serde")]
    pub clone_timeout: Duration,

    /// Directory under which temporary clones are created
    #[serde(default)]
    pub temp_dir: Option<Utf8PathBuf>,

    /// Number of source files sampled from the clone
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Clone with a depth of one
    #[serde(default)]
    pub shallow_clone: bool,

    /// Whether the pipeline clones the repository at all
    #[serde(default = "default_true")]
    pub enable_local_clone: bool,

    /// Directory and file filters used while walking a clone
    #[serde(default)]
    pub scan: ScanRules,
}

/// Directory and file filters shared by the extension census and file sampling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRules {
    /// Directories never descended into
    pub skip_dirs: Vec<String>,

    /// Directories additionally excluded from file sampling
    pub test_dirs: Vec<String>,

    /// Extensions (with leading dot) eligible for file sampling
    pub code_extensions: Vec<String>,

    /// Substrings that exclude a file from sampling when found in its lowercased file name.
    ///
    /// Patterns ending in `/` are matched against the whole relative path instead.
    pub skip_patterns: Vec<String>,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_web_base_url() -> String {
    "https://github.com".to_string()
}

const fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_clone_timeout() -> Duration {
    Duration::from_mins(5)
}

const fn default_max_files() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// When `config_path` is `None`, `reporank.toml` in `base_dir` is used if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading reporank configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading reporank configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate().into_app_err_with(|| format!("validating configuration file '{final_path}'"))?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// The directory temporary clones are created under
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir
            .as_ref()
            .map_or_else(|| std::env::temp_dir().join("reporank"), |dir| dir.as_std_path().to_path_buf())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of bounds
    pub fn validate(&self) -> Result<()> {
        validate_base_url("api_base_url", &self.api_base_url)?;
        validate_base_url("web_base_url", &self.web_base_url)?;

        if self.api_timeout.is_zero() {
            return Err(app_err!("api_timeout must be greater than zero"));
        }

        if self.clone_timeout.is_zero() {
            return Err(app_err!("clone_timeout must be greater than zero"));
        }

        if self.max_retries == 0 {
            return Err(app_err!("max_retries must be at least 1"));
        }

        if self.max_files == 0 {
            return Err(app_err!("max_files must be at least 1"));
        }

        if let Some(dir) = &self.temp_dir
            && dir.as_str().trim().is_empty()
        {
            return Err(app_err!("temp_dir must not be empty when set"));
        }

        self.scan.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

fn validate_base_url(field: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value).into_app_err_with(|| format!("{field} '{value}' is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(app_err!("{field} must use http or https, got '{}'", url.scheme()));
    }

    Ok(())
}

impl ScanRules {
    /// Whether a directory is excluded from every walk
    #[must_use]
    pub fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == name)
    }

    /// Whether a directory is excluded from file sampling
    #[must_use]
    pub fn is_excluded_from_sampling(&self, name: &str) -> bool {
        self.is_skipped_dir(name) || self.test_dirs.iter().any(|d| d == name)
    }

    /// Whether an extension (lowercase, with leading dot) is eligible for sampling
    #[must_use]
    pub fn is_code_extension(&self, extension: &str) -> bool {
        self.code_extensions.iter().any(|e| e == extension)
    }

    /// Whether a relative path matches one of the sampling skip patterns
    #[must_use]
    pub fn matches_skip_pattern(&self, relative_path: &str) -> bool {
        let lowered = relative_path.to_lowercase();
        let name = lowered.rsplit_once('/').map_or(lowered.as_str(), |(_, name)| name);

        self.skip_patterns.iter().any(|p| {
            if p.ends_with('/') {
                lowered.contains(p.as_str())
            } else {
                name.contains(p.as_str())
            }
        })
    }

    fn validate(&self) -> Result<()> {
        if self.code_extensions.is_empty() {
            return Err(app_err!("scan.code_extensions must list at least one extension"));
        }

        if let Some(ext) = self.code_extensions.iter().find(|e| !e.starts_with('.') || e.to_lowercase() != **e) {
            return Err(app_err!("scan.code_extensions entries must be lowercase and start with '.', got '{ext}'"));
        }

        if self.skip_patterns.iter().any(String::is_empty) {
            return Err(app_err!("scan.skip_patterns must not contain empty patterns"));
        }

        Ok(())
    }
}

impl Default for ScanRules {
    fn default() -> Self {
        Config::default().scan
    }
}
