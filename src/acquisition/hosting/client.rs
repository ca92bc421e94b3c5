//! GitHub API client
//!
//! Executes REST requests through a [`seatbelt`] retry layer. Network failures back off exponentially,
//! `429 Too Many Requests` honors `Retry-After`, and every other failure is classified
//! into an [`ApiError`] so the caller can decide whether to skip or abort.

use super::LOG_TARGET;
use crate::acquisition::ApiError;
use chrono::{DateTime, Utc};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;

const USER_AGENT: &str = concat!("RepoRank/", env!("CARGO_PKG_VERSION"));
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Base delay for exponential backoff after a network failure
const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Wait applied to a 429 response that carries no `Retry-After` header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_mins(1);

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: u64,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Rate-limit aware GitHub API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    backoff_unit: Duration,
    default_retry_after: Duration,
    authenticated: bool,
}

impl Client {
    /// Create a new client with an optional authentication token.
    ///
    /// `timeout` bounds each individual attempt and `max_retries` is the total number of
    /// attempts made for a request that keeps failing transiently.
    pub fn new(token: Option<&str>, base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: max_retries.max(1),
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            default_retry_after: DEFAULT_RETRY_AFTER,
            authenticated: token.is_some(),
        })
    }

    /// Override the retry delays.
    ///
    /// `backoff_unit` is the base of the exponential backoff after a network failure and
    /// `default_retry_after` is used for 429 responses without a `Retry-After` header.
    #[must_use]
    pub fn with_retry_delays(mut self, backoff_unit: Duration, default_retry_after: Duration) -> Self {
        self.backoff_unit = backoff_unit;
        self.default_retry_after = default_retry_after;
        self
    }

    /// Get the base URL for this client
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests carry an authentication token
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Issue a GET request
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Response, ApiError> {
        self.request(Method::GET, path, params).await
    }

    /// Execute a request, retrying transient failures.
    ///
    /// A successful response is returned as-is; decoding the body is up to the caller.
    pub async fn request(&self, method: Method, path: &str, params: &[(&str, &str)]) -> Result<Response, ApiError> {
        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("github_api");

        let default_retry_after = self.default_retry_after;
        let max_retries = self.max_retries;
        let target = format!("{method} {path}");
        let client = self.client.clone();
        let query: Vec<(String, String)> = params.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(move |outcome: &Attempt, _| classify_attempt(outcome, default_retry_after))
                .max_retry_attempts(max_retries - 1)
                .base_delay(self.backoff_unit)
                .backoff(Backoff::Exponential)
                .on_retry(move |outcome: &Attempt, args| match outcome {
                    Ok(resp) => log::warn!(
                        target: LOG_TARGET,
                        "{target} returned {}, retrying in {}s (attempt {} of {max_retries})",
                        resp.status(),
                        args.retry_delay().as_secs(),
                        args.attempt().index() + 1
                    ),
                    Err(e) => log::debug!(
                        target: LOG_TARGET,
                        "{target} failed ({e}), retrying in {}ms (attempt {} of {max_retries})",
                        args.retry_delay().as_millis(),
                        args.attempt().index() + 1
                    ),
                }),
            Execute::new(move |url: String| {
                let client = client.clone();
                let method = method.clone();
                let query = query.clone();
                async move { client.request(method, &url).query(&query).send().await }
            }),
        )
            .into_service();

        match service.execute(format!("{}{path}", self.base_url)).await {
            Ok(resp) => classify_response(resp, path),
            Err(e) if is_transient(&e) => Err(ApiError::Transient {
                path: path.to_string(),
                attempts: max_retries,
                source: e,
            }),
            Err(e) => Err(ApiError::Request {
                path: path.to_string(),
                source: e,
            }),
        }
    }
}

/// Outcome of a single attempt
type Attempt = Result<Response, reqwest::Error>;

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// Decide whether an attempt is worth repeating.
fn classify_attempt(outcome: &Attempt, default_retry_after: Duration) -> RecoveryInfo {
    match outcome {
        Err(e) if is_transient(e) => RecoveryInfo::retry(),
        Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
            RecoveryInfo::retry().delay(parse_retry_after(resp.headers()).unwrap_or(default_retry_after))
        }
        _ => RecoveryInfo::never(),
    }
}

/// Map the final response onto the API error taxonomy.
fn classify_response(resp: Response, path: &str) -> Result<Response, ApiError> {
    let status = resp.status();
    let rate_limit = extract_rate_limit_from_headers(resp.headers());

    if !(status.is_client_error() || status.is_server_error()) {
        if let Some(info) = rate_limit {
            log::debug!(target: LOG_TARGET, "{path}: {} requests remaining", info.remaining);
        }
        return Ok(resp);
    }

    match status {
        StatusCode::NOT_FOUND => Err(ApiError::NotFound { path: path.to_string() }),
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized { path: path.to_string() }),
        StatusCode::FORBIDDEN if rate_limit.is_some_and(|info| info.remaining == 0) => Err(ApiError::RateLimited {
            reset_at: rate_limit.and_then(|info| info.reset_at),
        }),
        _ => Err(ApiError::Http {
            path: path.to_string(),
            status,
        }),
    }
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let s = headers.get(RETRY_AFTER)?.to_str().ok()?;
    s.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header = |name: &str| headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok();

    let remaining = header("x-ratelimit-remaining")?;
    let limit = header("x-ratelimit-limit");
    let reset_at = header("x-ratelimit-reset")
        .and_then(|ts| i64::try_from(ts).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0));

    Some(RateLimitInfo { limit, remaining, reset_at })
}
