//! Fetches the translator landing page, following redirects to the regional host.

use crate::error::{Result, TranslateError};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Upper bound on redirect hops before discovery gives up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Landing page as served by the terminal host.
#[derive(Debug, Clone)]
pub struct DiscoveredPage {
    /// Scheme, host and port of the terminal response, path stripped.
    pub origin: Url,
    pub host: String,
    pub body: String,
}

#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self, entry_url: &Url) -> Result<DiscoveredPage>;
}

/// HTTP discovery with manual, bounded redirect handling.
///
/// The `reqwest::Client` handed in must have automatic redirects disabled,
/// otherwise the terminal host cannot be observed.
pub struct DiscoveryFetcher {
    client: Client,
    max_redirects: usize,
}

impl DiscoveryFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }
}

#[async_trait]
impl Discovery for DiscoveryFetcher {
    async fn discover(&self, entry_url: &Url) -> Result<DiscoveredPage> {
        let mut url = entry_url.clone();
        let mut redirects = 0;

        loop {
            debug!("Fetching translator page: {}", url);

            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| TranslateError::network("fetching translator page", e))?;

            let status = response.status();

            if status.is_redirection() {
                // A redirect without a usable Location is served as-is.
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|location| url.join(location).ok());

                if let Some(next) = next {
                    if redirects == self.max_redirects {
                        warn!("Giving up after {} redirects at {}", redirects, url);
                        return Err(TranslateError::RedirectLoop {
                            limit: self.max_redirects,
                        });
                    }
                    redirects += 1;
                    debug!("Redirect {} ({}): {} -> {}", redirects, status, url, next);
                    url = next;
                    continue;
                }
            }

            if !status.is_success() {
                warn!("Translator page returned {}", status);
            }

            let host = url
                .host_str()
                .ok_or_else(|| TranslateError::Settings(format!("URL has no host: {}", url)))?
                .to_string();

            let mut origin = url.clone();
            origin.set_path("/");
            origin.set_query(None);
            origin.set_fragment(None);

            let body = response
                .text()
                .await
                .map_err(|e| TranslateError::network("reading translator page", e))?;

            debug!(
                "Resolved translator host {} after {} redirect(s), {} bytes",
                host,
                redirects,
                body.len()
            );

            return Ok(DiscoveredPage { origin, host, body });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_redirect_bound() {
        let fetcher = DiscoveryFetcher::new(Client::new());
        assert_eq!(fetcher.max_redirects(), DEFAULT_MAX_REDIRECTS);

        let fetcher = DiscoveryFetcher::new(Client::new()).with_max_redirects(3);
        assert_eq!(fetcher.max_redirects(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        let fetcher = DiscoveryFetcher::new(client);
        // Port 1 on loopback refuses connections.
        let url = Url::parse("http://127.0.0.1:1/translator").unwrap();

        let result = fetcher.discover(&url).await;
        assert!(matches!(result, Err(TranslateError::Network { .. })));
    }
}
