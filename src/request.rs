//! Construction of the signed translate request.

use crate::credentials::Credentials;
use crate::error::{Result, TranslateError};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT};
use url::form_urlencoded;
use url::Url;

/// Source language sentinel asking upstream to detect the language.
pub const AUTO_DETECT: &str = "auto-detect";

/// Target language used when the caller gives none.
pub const DEFAULT_TARGET: &str = "en";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0";

const TRANSLATE_PATH: &str = "/ttranslatev3";
const TRANSLATOR_PAGE: &str = "/translator";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fully signed POST, ready for the transport.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    user_agent: String,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the request against `origin`. Empty language codes fall back to
    /// [`AUTO_DETECT`] and [`DEFAULT_TARGET`].
    pub fn build(
        &self,
        credentials: &Credentials,
        origin: &Url,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslationRequest> {
        let source_lang = non_empty_or(source_lang, AUTO_DETECT);
        let target_lang = non_empty_or(target_lang, DEFAULT_TARGET);

        let mut url = origin.join(TRANSLATE_PATH).map_err(invalid_url)?;
        url.query_pairs_mut()
            .append_pair("isVertical", "1")
            .append_pair("IG", credentials.instrumentation_tag())
            .append_pair("IID", credentials.instance_id());

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("fromLang", source_lang)
            .append_pair("to", target_lang)
            .append_pair("text", text)
            .append_pair("token", credentials.signing_token())
            .append_pair("key", credentials.signing_key())
            .finish();

        let referer = origin.join(TRANSLATOR_PAGE).map_err(invalid_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(USER_AGENT, header_value(&self.user_agent)?);
        headers.insert(REFERER, header_value(referer.as_str())?);

        Ok(TranslationRequest { url, headers, body })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn invalid_url(e: url::ParseError) -> TranslateError {
    TranslateError::Settings(format!("Invalid translator origin: {}", e))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| TranslateError::Settings(format!("Invalid header value {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn credentials() -> Credentials {
        Credentials::new("IG1", "translator.5023", "1712345", "tok", Duration::from_secs(60))
            .unwrap()
    }

    fn origin() -> Url {
        Url::parse("https://cn.bing.com/").unwrap()
    }

    #[test]
    fn test_build_url_and_body() {
        let request = RequestBuilder::new()
            .build(&credentials(), &origin(), "hello", "en", "es")
            .unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://cn.bing.com/ttranslatev3?isVertical=1&IG=IG1&IID=translator.5023"
        );
        assert_eq!(
            request.body,
            "fromLang=en&to=es&text=hello&token=tok&key=1712345"
        );
    }

    #[test]
    fn test_default_languages() {
        let request = RequestBuilder::new()
            .build(&credentials(), &origin(), "hi", "", "")
            .unwrap();
        assert!(request.body.starts_with("fromLang=auto-detect&to=en&"));
    }

    #[test]
    fn test_text_is_form_encoded() {
        let request = RequestBuilder::new()
            .build(&credentials(), &origin(), "a&b=c d", "en", "zh-Hans")
            .unwrap();
        assert!(request.body.contains("to=zh-Hans"));
        assert!(request.body.contains("text=a%26b%3Dc+d"));
    }

    #[test]
    fn test_headers() {
        let request = RequestBuilder::new()
            .build(&credentials(), &origin(), "héllo", "en", "fr")
            .unwrap();

        assert_eq!(
            request.headers[CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            request.headers[CONTENT_LENGTH],
            request.body.len().to_string().as_str()
        );
        assert_eq!(request.headers[REFERER], "https://cn.bing.com/translator");
        assert!(request.headers[USER_AGENT]
            .to_str()
            .unwrap()
            .starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_origin_with_port() {
        let origin = Url::parse("http://127.0.0.1:8080/").unwrap();
        let request = RequestBuilder::new()
            .with_user_agent("test-agent")
            .build(&credentials(), &origin, "x", "", "")
            .unwrap();

        assert!(request
            .url
            .as_str()
            .starts_with("http://127.0.0.1:8080/ttranslatev3?"));
        assert_eq!(request.headers[USER_AGENT], "test-agent");
    }
}
