//! Repository data acquisition.
//!
//! An acquisition run turns a repository reference into a [`RepositoryDataset`] by combining
//! the GitHub REST API ([`hosting`]) with inspection of a local clone ([`codebase`]). The
//! [`Orchestrator`] sequences the stages and decides, per [`Stage`], whether a failure ends
//! the run or merely leaves part of the dataset empty.

pub mod codebase;
pub mod hosting;

mod dataset;
mod error;
mod orchestrator;
mod repo_spec;
mod stage;

pub use dataset::{
    CommitHistory, Dependency, Ecosystem, LanguageBreakdown, README_SAMPLE_KEY, RepoMetadata, RepositoryDataset, SampleSet,
    SecurityStatus, YearMonth,
};
pub use error::{AcquisitionError, ApiError, ErrorKind};
pub use orchestrator::Orchestrator;
pub use repo_spec::RepoSpec;
pub use stage::{FailurePolicy, Stage};

const LOG_TARGET: &str = "  pipeline";
