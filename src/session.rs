//! Process-wide session: the live credential bundle plus its host.

use crate::credentials::{CredentialExtractor, Credentials};
use crate::discovery::Discovery;
use crate::error::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use url::Url;

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<Credentials>>>>;

struct SessionState {
    origin: Url,
    host: String,
    credentials: Option<Arc<Credentials>>,
    pending: Option<RefreshFuture>,
}

struct Inner {
    entry_url: Url,
    discovery: Arc<dyn Discovery>,
    extractor: Arc<dyn CredentialExtractor>,
    state: Mutex<SessionState>,
    refreshes: AtomicUsize,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        // State is replaced wholesale under the lock, so a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds at most one credential bundle and coordinates refreshes so only
/// one discovery is in flight at a time.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create an empty session. Until the first discovery the host is the
    /// entry URL's own host.
    pub fn new(
        entry_url: Url,
        discovery: Arc<dyn Discovery>,
        extractor: Arc<dyn CredentialExtractor>,
    ) -> Self {
        let mut origin = entry_url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        let host = entry_url.host_str().unwrap_or_default().to_string();

        Self {
            inner: Arc::new(Inner {
                entry_url,
                discovery,
                extractor,
                state: Mutex::new(SessionState {
                    origin,
                    host,
                    credentials: None,
                    pending: None,
                }),
                refreshes: AtomicUsize::new(0),
            }),
        }
    }

    /// Return valid credentials, running discovery if none are held or the
    /// held ones have expired. Concurrent callers share a single refresh.
    pub async fn ensure_valid(&self) -> Result<Arc<Credentials>> {
        let refresh = {
            let mut state = self.inner.state();

            if let Some(credentials) = state.credentials.as_ref().filter(|c| c.is_valid()) {
                return Ok(Arc::clone(credentials));
            }
            if state.credentials.take().is_some() {
                debug!("Cached credentials expired, discarding");
            }

            match state.pending.clone() {
                Some(pending) => {
                    debug!("Joining in-flight credential refresh");
                    pending
                }
                None => {
                    let pending = Self::refresh(Arc::clone(&self.inner)).boxed().shared();
                    state.pending = Some(pending.clone());
                    pending
                }
            }
        };

        refresh.await
    }

    /// Hostname of the translator, as last resolved by discovery.
    pub fn current_host(&self) -> String {
        self.inner.state().host.clone()
    }

    /// Scheme, host and port the translate request is sent to.
    pub fn current_origin(&self) -> Url {
        self.inner.state().origin.clone()
    }

    /// Cached credentials, if any, without checking expiry.
    pub fn cached(&self) -> Option<Arc<Credentials>> {
        self.inner.state().credentials.clone()
    }

    /// Number of discovery cycles started so far.
    pub fn refresh_count(&self) -> usize {
        self.inner.refreshes.load(Ordering::SeqCst)
    }

    async fn refresh(inner: Arc<Inner>) -> Result<Arc<Credentials>> {
        let cycle = inner.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Refreshing translator credentials (cycle {})", cycle);

        let outcome = Self::discover_and_extract(&inner).await;

        let mut state = inner.state();
        state.pending = None;

        match outcome {
            Ok(credentials) => {
                let credentials = Arc::new(credentials);
                state.credentials = Some(Arc::clone(&credentials));
                debug!(
                    "Credentials refreshed for {} (valid for {:?})",
                    state.host,
                    credentials.expiry_window()
                );
                Ok(credentials)
            }
            Err(e) => {
                warn!("Credential refresh failed: {}", e);
                Err(e)
            }
        }
    }

    async fn discover_and_extract(inner: &Inner) -> Result<Credentials> {
        let page = inner.discovery.discover(&inner.entry_url).await?;

        {
            let mut state = inner.state();
            state.origin = page.origin;
            state.host = page.host;
        }

        inner.extractor.extract(&page.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::RegexExtractor;
    use crate::discovery::DiscoveredPage;
    use crate::error::TranslateError;
    use async_trait::async_trait;
    use std::time::Duration;

    fn page(expiry_ms: u64) -> String {
        format!(
            r#"IG:"IG1" data-iid="translator.1" params_AbusePreventionHelper = [42,"tok",{}]"#,
            expiry_ms
        )
    }

    struct FakeDiscovery {
        body: String,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeDiscovery {
        fn new(body: String) -> Self {
            Self {
                body,
                delay: Duration::from_millis(0),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Discovery for FakeDiscovery {
        async fn discover(&self, _entry_url: &Url) -> Result<DiscoveredPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(TranslateError::RedirectLoop { limit: 10 });
            }
            Ok(DiscoveredPage {
                origin: Url::parse("https://cn.bing.com/").unwrap(),
                host: "cn.bing.com".to_string(),
                body: self.body.clone(),
            })
        }
    }

    fn store(discovery: Arc<FakeDiscovery>) -> SessionStore {
        SessionStore::new(
            Url::parse("https://www.bing.com/translator").unwrap(),
            discovery,
            Arc::new(RegexExtractor::default()),
        )
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn refresh_logs(level: tracing::Level) -> String {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = store(Arc::new(FakeDiscovery::new(page(60_000))));
        store.ensure_valid().await.unwrap();

        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_new_session_uses_entry_host() {
        let store = store(Arc::new(FakeDiscovery::new(page(60_000))));
        assert_eq!(store.current_host(), "www.bing.com");
        assert_eq!(store.current_origin().as_str(), "https://www.bing.com/");
        assert!(store.cached().is_none());
        assert_eq!(store.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_reuses_valid_credentials() {
        let discovery = Arc::new(FakeDiscovery::new(page(60_000)));
        let store = store(discovery.clone());

        let first = store.ensure_valid().await.unwrap();
        let second = store.ensure_valid().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(discovery.calls(), 1);
        assert_eq!(store.current_host(), "cn.bing.com");
    }

    #[tokio::test]
    async fn test_refreshes_after_expiry() {
        let discovery = Arc::new(FakeDiscovery::new(page(50)));
        let store = store(discovery.clone());

        let first = store.ensure_valid().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let second = store.ensure_valid().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(discovery.calls(), 2);
        assert_eq!(store.refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let discovery =
            Arc::new(FakeDiscovery::new(page(60_000)).with_delay(Duration::from_millis(50)));
        let store = store(discovery.clone());

        let calls = (0..8).map(|_| {
            let store = store.clone();
            async move { store.ensure_valid().await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(discovery.calls(), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failure() {
        let discovery = Arc::new(
            FakeDiscovery::new(page(60_000))
                .with_delay(Duration::from_millis(50))
                .failing(),
        );
        let store = store(discovery.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.ensure_valid().await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(TranslateError::RedirectLoop { .. })));
        }
        assert_eq!(discovery.calls(), 1);

        // Nothing is cached, so the next call starts over.
        assert!(store.ensure_valid().await.is_err());
        assert_eq!(discovery.calls(), 2);
        assert!(store.cached().is_none());
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_resolved_host() {
        let discovery = Arc::new(FakeDiscovery::new("<html></html>".to_string()));
        let store = store(discovery.clone());

        let result = store.ensure_valid().await;

        assert!(matches!(result, Err(TranslateError::ConfigParse { .. })));
        assert_eq!(store.current_host(), "cn.bing.com");
        assert!(store.cached().is_none());
    }

    #[tokio::test]
    async fn test_successful_refresh_only_logs_at_debug() {
        let info = refresh_logs(tracing::Level::INFO).await;
        assert!(info.is_empty(), "unexpected output at INFO: {}", info);

        let verbose = refresh_logs(tracing::Level::DEBUG).await;
        assert!(verbose.contains("Refreshing translator credentials"));
        assert!(verbose.contains("Credentials refreshed for cn.bing.com"));
    }
}
