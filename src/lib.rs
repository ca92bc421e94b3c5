#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for reporank
//!
//! This library gathers structural and historical facts about a GitHub repository by
//! combining calls to the rate-limited REST API with local inspection of a cloned
//! working copy. Partial failures degrade the result instead of aborting the run.
//!
//! # Module Organization
//!
//! - [`acquisition`]: The acquisition pipeline, its API client, and the local analyzer
//! - [`commands`]: Command-line interface
//! - [`config`]: Pipeline configuration

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod acquisition;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod config;

pub use crate::acquisition::{AcquisitionError, Orchestrator, RepositoryDataset};
pub use crate::commands::{Host, run};
