//! Command-line interface for reporank
//!
//! - **acquire**: run the acquisition pipeline against one repository and emit the
//!   resulting dataset as JSON, on the terminal or to a file
//! - **init**: write the default configuration file
//!
//! The `run` function parses the command line with clap and routes to the handler. All
//! output goes through a [`Host`] so the commands can be exercised in tests.

mod acquire;
mod common;
mod host;
mod init;
mod run;

pub use acquire::{AcquireArgs, acquire_repository};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use run::run;
