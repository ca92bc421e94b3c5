//! Hosted API access: a rate-limit aware HTTP client and the repository queries built on it.

mod client;
mod fetcher;
mod hosting_data;

pub use client::{Client, RateLimitInfo};
pub use fetcher::MetadataFetcher;

pub(super) const LOG_TARGET: &str = "   hosting";
