use anyhow::{Context, Result};
use bing_translator::languages::{is_known, language_name, LANGUAGES};
use bing_translator::{Settings, TranslateError, TranslationClient};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod interactive;

#[derive(Parser)]
#[command(name = "bing-translator")]
#[command(version, about = "Translate text with the Bing web translator")]
struct Cli {
    /// Text to translate (read from stdin when omitted)
    text: Option<String>,

    /// Source language code (defaults to auto-detect)
    #[arg(short, long)]
    from: Option<String>,

    /// Target language code (defaults to en)
    #[arg(short, long)]
    to: Option<String>,

    /// Pick languages and enter text interactively
    #[arg(short, long)]
    interactive: bool,

    /// Print supported language codes and exit
    #[arg(long)]
    list_languages: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// User-facing message for each failure kind.
pub(crate) fn describe_error(err: &TranslateError) -> &'static str {
    match err {
        TranslateError::CaptchaRequired => {
            "Translation service requires verification. Please try again later."
        }
        TranslateError::RateLimited => "Translation limit exceeded. Please try again later.",
        TranslateError::Network { .. } => {
            "Failed to connect to translation service. Check your internet connection."
        }
        TranslateError::ConfigParse { .. } | TranslateError::RedirectLoop { .. } => {
            "Failed to initialize translation service. Please try again."
        }
        TranslateError::Settings(_) => "Invalid translator settings.",
        TranslateError::Service(_) | TranslateError::MalformedResponse(_) => {
            "Failed to translate text"
        }
    }
}

pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Codes not in the language table. Empty codes fall back to defaults and are skipped.
fn unknown_languages<'a>(codes: &[&'a str]) -> Vec<&'a str> {
    codes
        .iter()
        .copied()
        .filter(|code| !code.is_empty() && !is_known(code))
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    Ok(text)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if cli.list_languages {
        for (code, name) in LANGUAGES {
            println!("{:<12} {}", code, name);
        }
        return Ok(());
    }

    let settings = Settings::load().context("Failed to load settings")?;
    let client =
        TranslationClient::from_settings(&settings).context("Failed to create translator")?;

    if cli.interactive {
        return interactive::run(&client, settings).await;
    }

    let text = match cli.text {
        Some(text) => text,
        None => read_stdin()?,
    };
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Please enter text to translate");
    }

    let source = cli.from.or(settings.source_language).unwrap_or_default();
    let target = cli.to.or(settings.target_language).unwrap_or_default();

    for code in unknown_languages(&[source.as_str(), target.as_str()]) {
        warn!(
            "Unrecognized language code {:?}, sending it as-is (see --list-languages)",
            code
        );
    }

    let pb = spinner("Translating...");
    let result = client.translate_detailed(text, &source, &target).await;
    pb.finish_and_clear();

    match result {
        Ok(translation) => {
            if let Some(ref detected) = translation.detected_language {
                debug!("Detected language: {}", language_name(detected));
            }
            println!("{}", translation.text);
            Ok(())
        }
        Err(e) => {
            let message = describe_error(&e);
            Err(anyhow::Error::new(e).context(message))
        }
    }
}
