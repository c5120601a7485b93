use crate::credentials::CredentialField;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TranslateError {
    #[error("Network error while {context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("Discovery exceeded {limit} redirects")]
    RedirectLoop { limit: usize },

    #[error("Failed to parse translator config, missing: {}", format_fields(.missing))]
    ConfigParse { missing: Vec<CredentialField> },

    #[error("Translation service requires captcha verification")]
    CaptchaRequired,

    #[error("Translation limit exceeded (401)")]
    RateLimited,

    #[error("Translation service error: {0}")]
    Service(i64),

    #[error("Invalid translation response: {0}")]
    MalformedResponse(String),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl TranslateError {
    pub(crate) fn network(context: &'static str, source: reqwest::Error) -> Self {
        TranslateError::Network {
            context,
            source: Arc::new(source),
        }
    }
}

fn format_fields(fields: &[CredentialField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, TranslateError>;
