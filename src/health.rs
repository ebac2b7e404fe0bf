//! URL health checks and pruning of unreachable platforms

use crate::config::HealthConfig;
use crate::platform::Platform;
use crate::store::DocumentStore;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, redirect};
use std::collections::BTreeMap;
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_EN: &str = "en-US,en;q=0.5";

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("invalid user agent: {0}")]
    UserAgent(#[from] reqwest::header::InvalidHeaderValue),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Add `https://` to URLs that have no scheme
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Err(url::ParseError::RelativeUrlWithoutBase) => format!("https://{}", raw),
        _ => raw.to_string(),
    }
}

/// How one request attempt ended
enum Attempt {
    Healthy,
    Unhealthy,
    /// Try the next method
    Retry,
}

pub struct HealthChecker {
    client: reqwest::Client,
}

impl HealthChecker {
    pub fn new(config: &HealthConfig) -> Result<Self, HealthError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_EN));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self { client })
    }

    /// True when the URL answers `HEAD` or `GET` with a status below 500
    pub async fn check_url(&self, raw: &str) -> bool {
        let url = normalize_url(raw);

        for method in [Method::HEAD, Method::GET] {
            match self.attempt(method, &url).await {
                Attempt::Healthy => return true,
                Attempt::Unhealthy => return false,
                Attempt::Retry => continue,
            }
        }

        warn!("All methods failed for {}", url);
        false
    }

    async fn attempt(&self, method: Method, url: &str) -> Attempt {
        match self.client.request(method.clone(), url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() < 500 {
                    debug!(%method, url, status = status.as_u16(), "url healthy");
                    Attempt::Healthy
                } else {
                    warn!("URL {} returned status code {}", url, status.as_u16());
                    Attempt::Unhealthy
                }
            }
            Err(e) if e.is_redirect() || is_tls_error(&e) => {
                warn!("Error for {}: {}", url, e);
                Attempt::Unhealthy
            }
            Err(e) => {
                debug!(%method, url, "request failed: {}", e);
                Attempt::Retry
            }
        }
    }
}

/// reqwest reports TLS failures as connect errors; look at the cause chain
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("tls") || message.contains("ssl") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Check every platform URL, delete unreachable platforms, and return the
/// catalog of platforms that passed
///
/// Platforms without a URL are dropped from the returned catalog but kept
/// in the store. Categories left empty are removed.
pub async fn prune_unreachable(
    checker: Arc<HealthChecker>,
    store: &dyn DocumentStore,
    collection: &str,
    catalog: BTreeMap<String, Vec<Platform>>,
    concurrency: usize,
) -> BTreeMap<String, Vec<Platform>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut checks = JoinSet::new();
    let mut entries: Vec<(String, Platform)> = Vec::new();

    for (category, platforms) in catalog {
        for platform in platforms {
            let Some(url) = platform.url.clone().filter(|u| !u.trim().is_empty()) else {
                warn!("Platform {} has no URL, skipping...", platform.display_name());
                continue;
            };

            let index = entries.len();
            entries.push((category.clone(), platform));

            let checker = Arc::clone(&checker);
            let semaphore = Arc::clone(&semaphore);
            checks.spawn(async move {
                let healthy = match semaphore.acquire_owned().await {
                    Ok(_permit) => checker.check_url(&url).await,
                    Err(_) => false,
                };
                (index, healthy)
            });
        }
    }

    let verdicts = collect_verdicts(checks, entries.len()).await;

    let mut kept: BTreeMap<String, Vec<Platform>> = BTreeMap::new();
    let mut removed = 0;
    for ((category, platform), verdict) in entries.into_iter().zip(verdicts) {
        match verdict {
            Some(false) => {}
            Some(true) => {
                kept.entry(category).or_default().push(platform);
                continue;
            }
            None => {
                warn!(
                    "URL check for {} did not finish, keeping it",
                    platform.display_name()
                );
                kept.entry(category).or_default().push(platform);
                continue;
            }
        }

        let Some(id) = platform.id.as_deref() else {
            continue;
        };
        let url = platform.url.as_deref().unwrap_or_default();
        match store.delete(collection, id).await {
            Ok(()) => {
                removed += 1;
                info!("Removed invalid platform: {} ({})", platform.display_name(), url);
            }
            Err(e) => error!("Error removing platform {}: {}", platform.display_name(), e),
        }
    }

    if removed > 0 {
        info!("Removed {} platforms with invalid URLs", removed);
    }
    kept
}

/// Gather `(index, healthy)` results; `None` where a task never reported
async fn collect_verdicts(mut checks: JoinSet<(usize, bool)>, len: usize) -> Vec<Option<bool>> {
    let mut verdicts = vec![None; len];
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok((index, ok)) => verdicts[index] = Some(ok),
            Err(e) => warn!("URL check task failed: {}", e),
        }
    }
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{group_by_category, load_platforms};
    use crate::store::{Patch, SqliteStore};
    use httpmock::prelude::*;

    fn checker() -> HealthChecker {
        let config = HealthConfig {
            timeout: 5,
            ..HealthConfig::default()
        };
        HealthChecker::new(&config).unwrap()
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url(" https://etsy.com "), "https://etsy.com");
        assert_eq!(normalize_url("http://a.b/c"), "http://a.b/c");
    }

    #[tokio::test]
    async fn test_head_success_sends_browser_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::HEAD)
                    .path("/ok")
                    .header_exists("user-agent")
                    .header("accept-language", "en-US,en;q=0.5");
                then.status(200);
            })
            .await;

        assert!(checker().check_url(&server.url("/ok")).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_count_as_healthy() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::HEAD).path("/missing");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::HEAD).path("/no-head");
                then.status(405);
            })
            .await;

        let checker = checker();
        assert!(checker.check_url(&server.url("/missing")).await);
        assert!(checker.check_url(&server.url("/no-head")).await);
    }

    #[tokio::test]
    async fn test_server_error_is_unhealthy_without_get() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::HEAD).path("/down");
                then.status(503);
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/down");
                then.status(200);
            })
            .await;

        assert!(!checker().check_url(&server.url("/down")).await);
        get.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_redirect_loop_is_unhealthy() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/loop");
                then.status(302).header("location", "/loop");
            })
            .await;

        assert!(!checker().check_url(&server.url("/loop")).await);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unhealthy() {
        // port 9 (discard) is not listening on test hosts
        assert!(!checker().check_url("http://127.0.0.1:9/").await);
    }

    #[tokio::test]
    async fn test_prune_unreachable_deletes_and_drops() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/up");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/down");
                then.status(500);
            })
            .await;

        let store = SqliteStore::open_in_memory().unwrap();
        for (name, url, category) in [
            ("Up", Some(server.url("/up")), "Freelancing & Services"),
            ("Down", Some(server.url("/down")), "Affiliate Marketing"),
            ("NoUrl", None, "Freelancing & Services"),
        ] {
            let mut patch = Patch::new().set("name", name).set("category", category);
            if let Some(url) = url {
                patch = patch.set("url", url);
            }
            store.create("platforms", None, &patch).await.unwrap();
        }

        let catalog = group_by_category(load_platforms(&store, "platforms").await.unwrap());
        let kept = prune_unreachable(Arc::new(checker()), &store, "platforms", catalog, 2).await;

        assert_eq!(kept.len(), 1);
        assert_eq!(kept["Freelancing & Services"].len(), 1);
        assert_eq!(kept["Freelancing & Services"][0].display_name(), "Up");

        let remaining: Vec<String> = load_platforms(&store, "platforms")
            .await
            .unwrap()
            .into_iter()
            .filter_map(|p| p.name)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&"Down".to_string()));
    }

    #[tokio::test]
    async fn test_failed_check_task_is_not_a_verdict() {
        let mut checks = JoinSet::new();
        checks.spawn(async { (0, true) });
        checks.spawn(async { (1, false) });
        checks.spawn(async {
            if true {
                panic!("check crashed");
            }
            (2, false)
        });

        let verdicts = collect_verdicts(checks, 3).await;
        assert_eq!(verdicts, vec![Some(true), Some(false), None]);
    }
}
