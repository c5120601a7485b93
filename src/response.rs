//! Classification of translate responses.

use crate::error::{Result, TranslateError};
use serde::Deserialize;
use serde_json::Value;

/// Status upstream uses for exhausted quota or a rejected token.
const RATE_LIMIT_STATUS: i64 = 401;

/// A successful translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub text: String,
    /// Source language upstream detected, when it reports one.
    pub detected_language: Option<String>,
    /// Target language upstream reports having produced.
    pub target: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TranslationEntry {
    #[serde(rename = "detectedLanguage")]
    detected_language: Option<DetectedLanguage>,
    translations: Option<Vec<TranslatedText>>,
}

#[derive(Deserialize, Debug)]
struct DetectedLanguage {
    language: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TranslatedText {
    text: Option<String>,
    to: Option<String>,
}

/// Classify a response and return just the translated text.
pub fn interpret(http_status: u16, body: &str) -> Result<String> {
    interpret_detailed(http_status, body).map(|t| t.text)
}

/// Classify a response. First match wins: captcha flag, 401 (embedded or
/// transport), any other embedded status, unparseable body, missing text.
pub fn interpret_detailed(http_status: u16, body: &str) -> Result<Translation> {
    let parsed = serde_json::from_str::<Value>(body);

    if let Ok(value) = &parsed {
        if value.get("ShowCaptcha").and_then(Value::as_bool) == Some(true) {
            return Err(TranslateError::CaptchaRequired);
        }
    }

    let embedded_status = parsed.as_ref().ok().and_then(embedded_status);

    if embedded_status == Some(RATE_LIMIT_STATUS) || http_status == RATE_LIMIT_STATUS as u16 {
        return Err(TranslateError::RateLimited);
    }

    if let Some(code) = embedded_status {
        return Err(TranslateError::Service(code));
    }

    let value = parsed.map_err(|e| {
        TranslateError::MalformedResponse(format!("body is not JSON ({}): {}", e, preview(body)))
    })?;

    let entries: Vec<TranslationEntry> = serde_json::from_value(value).map_err(|e| {
        TranslateError::MalformedResponse(format!("unexpected shape ({}): {}", e, preview(body)))
    })?;

    let first = entries
        .into_iter()
        .next()
        .ok_or_else(|| TranslateError::MalformedResponse("empty result array".to_string()))?;

    let detected_language = first.detected_language.and_then(|d| d.language);

    let translated = first
        .translations
        .and_then(|t| t.into_iter().next())
        .ok_or_else(|| TranslateError::MalformedResponse("no translations".to_string()))?;

    let text = translated
        .text
        .ok_or_else(|| TranslateError::MalformedResponse("translation has no text".to_string()))?;

    Ok(Translation {
        text,
        detected_language,
        target: translated.to,
    })
}

/// Upstream has been seen sending both `StatusCode` and `statusCode`.
fn embedded_status(value: &Value) -> Option<i64> {
    ["StatusCode", "statusCode"]
        .iter()
        .filter_map(|key| value.get(key))
        .find(|v| !v.is_null())
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
