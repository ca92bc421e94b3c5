//! Command dispatch logic for reporank

use super::{AcquireArgs, InitArgs, acquire_repository, init_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "reporank", version, author, long_about = None)]
#[command(about = "Gather structural and historical facts about a GitHub repository")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire the dataset of a repository and print it as JSON
    Acquire(Box<AcquireArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        Command::Acquire(acquire_args) => acquire_repository(host, acquire_args).await,
        Command::Init(init_args) => init_config(host, init_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_acquire_flags() {
        let cli = Cli::parse_from(["reporank", "acquire", "octocat/Hello-World", "--no-clone", "--shallow", "-c", "x.toml"]);
        let Command::Acquire(args) = cli.command else {
            panic!("expected the acquire subcommand");
        };

        assert_eq!(args.repository, "octocat/Hello-World");
        assert!(args.no_clone);
        assert!(args.shallow);
        assert_eq!(args.config.as_deref().map(camino::Utf8Path::as_str), Some("x.toml"));
        assert_eq!(args.log_level, crate::commands::common::LogLevel::None);
    }

    #[test]
    fn test_init_default_output() {
        let cli = Cli::parse_from(["reporank", "init"]);
        let Command::Init(args) = cli.command else {
            panic!("expected the init subcommand");
        };
        assert_eq!(args.output.as_str(), "reporank.toml");
    }
}
