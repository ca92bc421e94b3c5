use super::Host;
use super::common::{LogLevel, init_logging};
use crate::Result;
use crate::acquisition::codebase::{SystemVcs, UnavailableVcs};
use crate::acquisition::hosting::Client;
use crate::acquisition::{Orchestrator, RepositoryDataset};
use crate::config::Config;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::IntoAppError;
use std::fs;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct AcquireArgs {
    /// Repository to analyze: `owner/repo`, `github.com/owner/repo`, or a full URL
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `reporank.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Write the dataset to a JSON file instead of to the terminal
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,

    /// Clone only the most recent commit
    #[arg(long)]
    pub shallow: bool,

    /// Skip the local clone and gather data through the API only
    #[arg(long)]
    pub no_clone: bool,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

pub async fn acquire_repository<H: Host>(host: &mut H, args: &AcquireArgs) -> Result<()> {
    init_logging(args.log_level);

    let mut config = Config::load(Utf8Path::new("."), args.config.as_ref())?;
    if args.shallow {
        config.shallow_clone = true;
    }
    if args.no_clone {
        config.enable_local_clone = false;
    }

    let client = Client::new(
        args.github_token.as_deref(),
        config.api_base_url.as_str(),
        config.api_timeout,
        config.max_retries,
    )?;

    if !client.is_authenticated() {
        log::warn!("No GitHub token provided, so API requests are limited to 60 per hour; set GITHUB_TOKEN or use --github-token");
    }

    let vcs = if config.enable_local_clone {
        SystemVcs::detect().await
    } else {
        SystemVcs::Unavailable(UnavailableVcs)
    };

    let orchestrator = Orchestrator::new(config, client, vcs);
    match orchestrator.acquire(&args.repository).await {
        Ok(dataset) => write_dataset(host, &dataset, args.json.as_deref()),
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Could not acquire '{}': {e}", args.repository);
            if e.rate_limit_reset().is_some() && args.github_token.is_none() {
                let _ = writeln!(host.error(), "Supplying a GitHub token raises the API rate limit");
            }
            host.exit(1);
            Err(e).into_app_err_with(|| format!("acquiring data for '{}'", args.repository))
        }
    }
}

fn write_dataset<H: Host>(host: &mut H, dataset: &RepositoryDataset, json: Option<&Utf8Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(dataset).into_app_err("serializing the repository dataset")?;

    if let Some(path) = json {
        fs::write(path, text).into_app_err_with(|| format!("writing dataset to '{path}'"))?;
        let _ = writeln!(host.output(), "Wrote dataset for '{}/{}' to {path}", dataset.owner, dataset.repo_name);
    } else {
        let _ = writeln!(host.output(), "{text}");
    }

    Ok(())
}
