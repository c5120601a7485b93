//! Session credentials scraped from the translator landing page.

use crate::error::{Result, TranslateError};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// One of the values embedded in the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    InstrumentationTag,
    InstanceId,
    SigningKey,
    SigningToken,
    ExpiryWindow,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialField::InstrumentationTag => write!(f, "IG"),
            CredentialField::InstanceId => write!(f, "IID"),
            CredentialField::SigningKey => write!(f, "key"),
            CredentialField::SigningToken => write!(f, "token"),
            CredentialField::ExpiryWindow => write!(f, "tokenExpiryInterval"),
        }
    }
}

/// Signing and identification data for the translate endpoint.
///
/// Immutable once built. An expired bundle is replaced, never refreshed in place.
#[derive(Clone)]
pub struct Credentials {
    instrumentation_tag: String,
    instance_id: String,
    signing_key: String,
    signing_token: String,
    expiry_window: Duration,
    issued_at: Instant,
}

impl Credentials {
    /// Build a bundle issued now. Every string must be non-empty and the
    /// expiry window positive.
    pub fn new(
        instrumentation_tag: impl Into<String>,
        instance_id: impl Into<String>,
        signing_key: impl Into<String>,
        signing_token: impl Into<String>,
        expiry_window: Duration,
    ) -> Result<Self> {
        let credentials = Self {
            instrumentation_tag: instrumentation_tag.into(),
            instance_id: instance_id.into(),
            signing_key: signing_key.into(),
            signing_token: signing_token.into(),
            expiry_window,
            issued_at: Instant::now(),
        };

        let mut missing = Vec::new();
        if credentials.instrumentation_tag.is_empty() {
            missing.push(CredentialField::InstrumentationTag);
        }
        if credentials.instance_id.is_empty() {
            missing.push(CredentialField::InstanceId);
        }
        if credentials.signing_key.is_empty() {
            missing.push(CredentialField::SigningKey);
        }
        if credentials.signing_token.is_empty() {
            missing.push(CredentialField::SigningToken);
        }
        if credentials.expiry_window.is_zero() {
            missing.push(CredentialField::ExpiryWindow);
        }

        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(TranslateError::ConfigParse { missing })
        }
    }

    pub fn instrumentation_tag(&self) -> &str {
        &self.instrumentation_tag
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }

    pub fn signing_token(&self) -> &str {
        &self.signing_token
    }

    pub fn expiry_window(&self) -> Duration {
        self.expiry_window
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// True while `now - issued_at < expiry_window`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) < self.expiry_window
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }
}

// Key and token stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("instrumentation_tag", &self.instrumentation_tag)
            .field("instance_id", &self.instance_id)
            .field("signing_key", &"<redacted>")
            .field("signing_token", &"<redacted>")
            .field("expiry_window", &self.expiry_window)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Marker patterns for the landing page. Each regex must expose the value in
/// capture group 1.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub version: u32,
    pub instrumentation_tag: Regex,
    pub instance_id: Regex,
    pub abuse_params: Regex,
}

static CURRENT_PATTERNS: LazyLock<PatternSet> = LazyLock::new(|| {
    PatternSet::new(
        1,
        r#"IG:"([^"]+)""#,
        r#"data-iid="([^"]+)""#,
        r"params_AbusePreventionHelper\s*=\s*(\[[^\]]+\])",
    )
    .expect("built-in patterns are valid")
});

impl PatternSet {
    pub fn new(
        version: u32,
        instrumentation_tag: &str,
        instance_id: &str,
        abuse_params: &str,
    ) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            version,
            instrumentation_tag: Regex::new(instrumentation_tag)?,
            instance_id: Regex::new(instance_id)?,
            abuse_params: Regex::new(abuse_params)?,
        })
    }

    /// The patterns matching the page as currently served.
    pub fn current() -> &'static PatternSet {
        &CURRENT_PATTERNS
    }
}

/// Turns a landing page body into a complete [`Credentials`] bundle.
pub trait CredentialExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<Credentials>;
    fn pattern_version(&self) -> u32;
}

/// Regex-driven extractor over a [`PatternSet`].
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    patterns: PatternSet,
}

impl RegexExtractor {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    fn capture(pattern: &Regex, html: &str) -> Option<String> {
        pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Parse `[key, "token", expiry_ms]`. Fields that fail to parse are
    /// appended to `missing`.
    fn parse_abuse_params(
        literal: &str,
        missing: &mut Vec<CredentialField>,
    ) -> Option<(String, String, Duration)> {
        let all = [
            CredentialField::SigningKey,
            CredentialField::SigningToken,
            CredentialField::ExpiryWindow,
        ];

        let values = match serde_json::from_str::<Vec<Value>>(literal) {
            Ok(values) if values.len() == 3 => values,
            _ => {
                missing.extend(all);
                return None;
            }
        };

        // The key is served as a bare number on the live page. Anything that
        // does not fit an integer would lose digits and is rejected.
        let key = match &values[0] {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => n
                .as_u64()
                .map(|k| k.to_string())
                .or_else(|| n.as_i64().map(|k| k.to_string())),
            _ => None,
        };
        let token = values[1]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let expiry = values[2]
            .as_u64()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        if key.is_none() {
            missing.push(CredentialField::SigningKey);
        }
        if token.is_none() {
            missing.push(CredentialField::SigningToken);
        }
        if expiry.is_none() {
            missing.push(CredentialField::ExpiryWindow);
        }

        Some((key?, token?, expiry?))
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self::new(PatternSet::current().clone())
    }
}

impl CredentialExtractor for RegexExtractor {
    fn extract(&self, html: &str) -> Result<Credentials> {
        let mut missing = Vec::new();

        let tag = Self::capture(&self.patterns.instrumentation_tag, html);
        if tag.is_none() {
            missing.push(CredentialField::InstrumentationTag);
        }

        let iid = Self::capture(&self.patterns.instance_id, html);
        if iid.is_none() {
            missing.push(CredentialField::InstanceId);
        }

        let params = match Self::capture(&self.patterns.abuse_params, html) {
            Some(literal) => Self::parse_abuse_params(&literal, &mut missing),
            None => {
                missing.extend([
                    CredentialField::SigningKey,
                    CredentialField::SigningToken,
                    CredentialField::ExpiryWindow,
                ]);
                None
            }
        };

        match (tag, iid, params) {
            (Some(tag), Some(iid), Some((key, token, expiry))) if missing.is_empty() => {
                Credentials::new(tag, iid, key, token, expiry)
            }
            _ => Err(TranslateError::ConfigParse { missing }),
        }
    }

    fn pattern_version(&self) -> u32 {
        self.patterns.version
    }
}
