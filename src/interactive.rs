use crate::{describe_error, spinner};
use bing_translator::languages::{language_name, target_languages, LANGUAGES};
use bing_translator::request::{AUTO_DETECT, DEFAULT_TARGET};
use bing_translator::{Settings, Translation, TranslationClient};
use console::style;
use dialoguer::{Confirm, FuzzySelect, Input};
use tracing::debug;

pub async fn run(client: &TranslationClient, mut settings: Settings) -> anyhow::Result<()> {
    print_header();

    let source_default = settings.source_language.as_deref().unwrap_or(AUTO_DETECT);
    let source = select_language("Select source language", LANGUAGES, source_default)?;

    let targets: Vec<(&str, &str)> = target_languages().copied().collect();
    let target_default = settings.target_language.as_deref().unwrap_or(DEFAULT_TARGET);
    let target = select_language("Select target language", &targets, target_default)?;

    loop {
        let text: String = Input::new()
            .with_prompt(format!(
                "Enter text to translate ({} → {})",
                language_name(&source),
                language_name(&target)
            ))
            .validate_with(|input: &String| -> Result<(), &'static str> {
                if input.trim().is_empty() {
                    Err("Please enter text to translate")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;

        let pb = spinner("Translating...");
        let result = client.translate_detailed(text.trim(), &source, &target).await;
        pb.finish_and_clear();

        match result {
            Ok(translation) => print_translation(&translation),
            Err(e) => {
                debug!("Translation failed: {}", e);
                println!("{} {}", style("✗").red(), describe_error(&e));
            }
        }

        if !Confirm::new()
            .with_prompt("Translate another text?")
            .default(true)
            .interact()?
        {
            break;
        }
    }

    offer_save_defaults(&mut settings, &source, &target)
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║        bing-translator - Web Translator           ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
}

fn select_language(prompt: &str, languages: &[(&str, &str)], current: &str) -> anyhow::Result<String> {
    let items: Vec<String> = languages
        .iter()
        .map(|(code, name)| format!("{} ({})", name, code))
        .collect();

    let selection = FuzzySelect::new()
        .with_prompt(prompt)
        .items(&items)
        .default(default_index(languages, current))
        .interact()?;

    Ok(languages[selection].0.to_string())
}

fn default_index(languages: &[(&str, &str)], code: &str) -> usize {
    languages
        .iter()
        .position(|(c, _)| *c == code)
        .unwrap_or(0)
}

fn print_translation(translation: &Translation) {
    println!();
    if let Some(ref detected) = translation.detected_language {
        println!(
            "  {} {}",
            style("Detected:").dim(),
            language_name(detected)
        );
    }
    println!("  {}", style(&translation.text).green().bold());
    println!();
}

fn offer_save_defaults(settings: &mut Settings, source: &str, target: &str) -> anyhow::Result<()> {
    let unchanged = settings.source_language.as_deref() == Some(source)
        && settings.target_language.as_deref() == Some(target);
    if unchanged {
        return Ok(());
    }

    if Confirm::new()
        .with_prompt("Save these languages as defaults?")
        .default(false)
        .interact()?
    {
        settings.source_language = Some(source.to_string());
        settings.target_language = Some(target.to_string());
        let path = settings.save()?;
        println!(
            "{} Defaults saved to {}",
            style("✓").green(),
            path.display()
        );
    }

    Ok(())
}
