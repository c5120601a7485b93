pub mod client;
pub mod config;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod languages;
pub mod request;
pub mod response;
pub mod session;

pub use client::TranslationClient;
pub use config::Settings;
pub use credentials::{CredentialExtractor, CredentialField, Credentials, PatternSet, RegexExtractor};
pub use error::{Result, TranslateError};
pub use response::Translation;
