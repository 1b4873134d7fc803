use crate::config::{Config, expand_home, parse_hhmm};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to timelog onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Mail directory");
    println!("  Daily report messages (.eml or Maildir) are read from this folder.");
    let mail_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Mail directory")
        .default(defaults.mail_dir.display().to_string())
        .interact_text()
        .context("Failed to read mail directory")?;
    let mail_dir = expand_home(&mail_dir_input);
    println!("  ✓ {}", mail_dir.display());

    println!("\n[2/4] Sender filter");
    let sender_input: String = Input::with_theme(&theme)
        .with_prompt("  Only accept reports from (blank for any sender)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read sender filter")?;
    let sender_filter = (!sender_input.trim().is_empty()).then(|| sender_input.trim().to_string());

    println!("\n[3/4] Set daily ingest time");
    let ingest_time: String = Input::with_theme(&theme)
        .with_prompt("  Enter daily ingest time")
        .default(defaults.ingest_time.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            parse_hhmm(input)
                .map(|_| ())
                .map_err(|_| "Use HH:MM format (example: 09:00)")
        })
        .interact_text()
        .context("Failed to read ingest time")?;
    println!("  ✓ Reports will be ingested daily at {ingest_time}");

    println!("\n[4/4] Embeddings");
    let embedding_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Store embeddings for semantic search?")
        .default(true)
        .interact()
        .context("Failed to read embedding choice")?;

    let embedding_api_key = if embedding_enabled {
        let key = Password::with_theme(&theme)
            .with_prompt("  Embedding API key (blank to use TIMELOG_EMBEDDING_API_KEY)")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read embedding API key")?;
        (!key.trim().is_empty()).then(|| key.trim().to_string())
    } else {
        None
    };

    let config = Config {
        mail_dir,
        sender_filter,
        ingest_time,
        embedding_enabled,
        embedding_api_key,
        ..defaults
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.db_path)?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run `timelog ingest` to import the latest report.");
    println!("  Run `timelog status` to check current state.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
