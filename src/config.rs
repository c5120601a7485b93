use crate::discovery::DEFAULT_MAX_REDIRECTS;
use crate::error::{Result, TranslateError};
use crate::request::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_ENTRY_URL: &str = "https://www.bing.com/translator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub entry_url: String,
    pub max_redirects: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Unset means auto-detect.
    pub source_language: Option<String>,
    /// Unset means the request builder's default target.
    pub target_language: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            source_language: None,
            target_language: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Read settings from a TOML file; missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TranslateError::Settings(format!("Cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            TranslateError::Settings(format!("Cannot parse {}: {}", path.display(), e))
        })
    }

    /// Override fields from `BING_TRANSLATOR_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BING_TRANSLATOR_ENTRY_URL") {
            self.entry_url = url;
        }
        if let Ok(redirects) = std::env::var("BING_TRANSLATOR_MAX_REDIRECTS") {
            if let Ok(r) = redirects.parse() {
                self.max_redirects = r;
            }
        }
        if let Ok(timeout) = std::env::var("BING_TRANSLATOR_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.timeout_secs = t;
            }
        }
        if let Ok(source) = std::env::var("BING_TRANSLATOR_SOURCE") {
            self.source_language = Some(source);
        }
        if let Ok(target) = std::env::var("BING_TRANSLATOR_TARGET") {
            self.target_language = Some(target);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.entry_url()?;

        if self.timeout_secs == 0 {
            return Err(TranslateError::Settings(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_redirects == 0 {
            return Err(TranslateError::Settings(
                "max_redirects must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn entry_url(&self) -> Result<Url> {
        let url = Url::parse(&self.entry_url).map_err(|e| {
            TranslateError::Settings(format!("Invalid entry URL {}: {}", self.entry_url, e))
        })?;

        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(TranslateError::Settings(format!(
                "Entry URL must be http(s) with a host: {}",
                self.entry_url
            ))),
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path().ok_or_else(|| {
            TranslateError::Settings("No config directory on this platform".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                TranslateError::Settings(format!("Cannot create {}: {}", dir.display(), e))
            })?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| TranslateError::Settings(format!("Cannot serialize settings: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| {
            TranslateError::Settings(format!("Cannot write {}: {}", path.display(), e))
        })
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bing-translator").join("config.toml"))
    }
}
