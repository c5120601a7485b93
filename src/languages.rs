//! Language codes accepted by the translator.

use crate::request::AUTO_DETECT;

/// `(code, English name)`, auto-detect first.
pub const LANGUAGES: &[(&str, &str)] = &[
    (AUTO_DETECT, "Auto Detect"),
    ("en", "English"),
    ("zh-Hans", "Chinese Simplified"),
    ("zh-Hant", "Chinese Traditional"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("ru", "Russian"),
    ("pt", "Portuguese"),
    ("it", "Italian"),
    ("ar", "Arabic"),
    ("th", "Thai"),
    ("vi", "Vietnamese"),
    ("id", "Indonesian"),
    ("ms", "Malay"),
    ("hi", "Hindi"),
    ("tr", "Turkish"),
    ("pl", "Polish"),
    ("nl", "Dutch"),
    ("sv", "Swedish"),
    ("da", "Danish"),
    ("fi", "Finnish"),
    ("no", "Norwegian"),
    ("cs", "Czech"),
    ("el", "Greek"),
    ("he", "Hebrew"),
    ("hu", "Hungarian"),
    ("ro", "Romanian"),
    ("uk", "Ukrainian"),
];

/// Display name for `code`, or the code itself when unknown.
pub fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

pub fn is_known(code: &str) -> bool {
    LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// Every language that can be translated into.
pub fn target_languages() -> impl Iterator<Item = &'static (&'static str, &'static str)> {
    LANGUAGES.iter().filter(|(c, _)| *c != AUTO_DETECT)
}
