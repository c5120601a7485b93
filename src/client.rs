//! Public translation entry point.

use crate::config::Settings;
use crate::credentials::{CredentialExtractor, RegexExtractor};
use crate::discovery::{Discovery, DiscoveryFetcher};
use crate::error::{Result, TranslateError};
use crate::request::RequestBuilder;
use crate::response::{interpret_detailed, Translation};
use crate::session::SessionStore;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP client for discovery and translation: explicit timeout, redirects
/// left to [`DiscoveryFetcher`].
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| TranslateError::network("building HTTP client", e))
}

/// Translates text through the Bing web translator, managing session
/// credentials behind the scenes.
pub struct TranslationClient {
    http: Client,
    session: SessionStore,
    builder: RequestBuilder,
}

impl TranslationClient {
    /// Client with default settings.
    pub fn new() -> Result<Self> {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let entry_url = settings.entry_url()?;
        let http = build_http_client(Duration::from_secs(settings.timeout_secs))?;
        let discovery =
            DiscoveryFetcher::new(http.clone()).with_max_redirects(settings.max_redirects);
        let builder = RequestBuilder::new().with_user_agent(settings.user_agent.clone());

        Ok(Self::with_parts(
            http,
            entry_url,
            Arc::new(discovery),
            Arc::new(RegexExtractor::default()),
            builder,
        ))
    }

    /// Assemble a client from explicit collaborators.
    pub fn with_parts(
        http: Client,
        entry_url: Url,
        discovery: Arc<dyn Discovery>,
        extractor: Arc<dyn CredentialExtractor>,
        builder: RequestBuilder,
    ) -> Self {
        Self {
            http,
            session: SessionStore::new(entry_url, discovery, extractor),
            builder,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Translate `text`. Empty language codes select auto-detection and the
    /// default target respectively.
    pub async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        self.translate_detailed(text, source_lang, target_lang)
            .await
            .map(|t| t.text)
    }

    pub async fn translate_detailed(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Translation> {
        // Expiry is not rechecked once credentials are in hand.
        let credentials = self.session.ensure_valid().await?;
        let origin = self.session.current_origin();

        let request = self
            .builder
            .build(&credentials, &origin, text, source_lang, target_lang)?;

        debug!(
            "Translating {} chars via {}",
            text.chars().count(),
            request.url.host_str().unwrap_or_default()
        );

        let response = self
            .http
            .post(request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TranslateError::network("sending translation request", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranslateError::network("reading translation response", e))?;

        debug!("Translate response status: {}", status);

        interpret_detailed(status.as_u16(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = TranslationClient::new().unwrap();
        assert_eq!(client.session().current_host(), "www.bing.com");
        assert_eq!(client.session().refresh_count(), 0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = Settings {
            timeout_secs: 0,
            ..Settings::default()
        };
        assert!(matches!(
            TranslationClient::from_settings(&settings),
            Err(TranslateError::Settings(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_entry_is_network_error() {
        let settings = Settings {
            entry_url: "http://127.0.0.1:1/translator".to_string(),
            ..Settings::default()
        };
        let client = TranslationClient::from_settings(&settings).unwrap();

        let result = client.translate("hello", "en", "es").await;
        assert!(matches!(result, Err(TranslateError::Network { .. })));
    }
}
