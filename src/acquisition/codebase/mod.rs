//! Local inspection of a cloned working copy: extension census, file sampling,
//! dependency manifests, and commit history read straight from git.

mod analyzer;
mod history;
mod manifests;
mod vcs;

pub use analyzer::{Checkout, LocalAnalyzer};
pub use history::{MONTHLY_WINDOW, summarize_commits};
pub use manifests::{extract_dependencies, parse_cargo_toml, parse_go_mod, parse_package_json, parse_requirements};
pub use vcs::{CloneOptions, GitCli, SystemVcs, UnavailableVcs, Vcs};

pub(super) const LOG_TARGET: &str = "  codebase";
