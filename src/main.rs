mod api;
mod cli;
mod config;
mod db;
mod embedding;
mod mail;
mod pipeline;
mod report;
mod scheduler;
mod search;
mod sink;

use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands, EmbeddingCommands};
use crate::config::Config;
use crate::db::Database;
use crate::mail::MaildirSource;
use crate::pipeline::IngestSummary;
use crate::report::{Normalizer, ReportGrammar};
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Ingest { limit } => {
            let config = load_config()?;
            let grammar = build_grammar()?;
            run_ingest_once(&config, &grammar, limit).map(|_| ())
        }
        Commands::Parse { path } => handle_parse(&path),
        Commands::Search { query, limit } => handle_search(&query, limit),
        Commands::Embedding { command } => handle_embedding_command(command),
        Commands::Service => {
            let config = load_config()?;
            run_service(config).await
        }
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("timelog status");
    println!("- config: {}", Config::config_path()?.display());
    println!("- database: {}", config.db_path.display());
    println!("- mail_dir: {}", config.mail_dir.display());
    println!("- ingest_time: {}", config.ingest_time);
    println!("- records: {}", database.record_count()?);
    println!(
        "- latest_record_date: {}",
        database
            .latest_record()?
            .map(|record| record.date)
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.mail_dir.is_dir() {
        println!("[OK] mail dir exists: {}", config.mail_dir.display());
    } else {
        println!("[WARN] mail dir missing: {}", config.mail_dir.display());
        issues.push("mail dir missing".to_string());
    }

    if let Err(error) = config.parse_ingest_time() {
        println!("[WARN] invalid ingest_time setting: {error}");
        issues.push("invalid ingest_time".to_string());
    } else {
        println!("[OK] ingest_time format valid: {}", config.ingest_time);
    }

    if config.embedding_enabled {
        if embedding::has_api_key(&config) {
            println!("[OK] embedding API key is configured");
        } else {
            println!("[WARN] embedding is enabled but API key is missing");
            issues.push("embedding api key missing".to_string());
        }
    } else {
        println!("[OK] embedding disabled");
    }

    if let Err(error) = build_grammar() {
        println!("[WARN] report grammar failed to compile: {error:#}");
        issues.push("report grammar invalid".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_parse(path: &Path) -> Result<()> {
    let grammar = build_grammar()?;
    let report = mail::read_report_file(path)?;
    let record = Normalizer::new(&grammar).extract(&report, Local::now().date_naive())?;

    let rendered = serde_json::to_string_pretty(&record).context("Failed to serialize record")?;
    println!("{rendered}");
    Ok(())
}

fn handle_search(query: &str, limit: usize) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let embedder = embedding::from_config(&config);

    let hits = search::search(&database, embedder.as_ref(), query, limit)?;
    if hits.is_empty() {
        println!("No matching records");
        return Ok(());
    }

    for hit in hits {
        println!("{:.3}  {} ({})", hit.score, hit.date, hit.day);
        println!("       {}", hit.summary);
    }

    Ok(())
}

fn handle_embedding_command(command: EmbeddingCommands) -> Result<()> {
    match command {
        EmbeddingCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = load_or_default_config()?;

            if let Some(value) = key {
                config.embedding_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.embedding_api_base_url = value;
            }
            if let Some(value) = model {
                config.embedding_model = value;
            }

            let dimensions = embedding::test_connection(&config)?;
            println!("Embedding API connection successful");
            println!("- model: {}", config.embedding_model);
            println!("- dimensions: {dimensions}");

            Ok(())
        }
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let grammar = Arc::new(build_grammar()?);
    let shared_config = Arc::new(config);
    let scheduler_config = Arc::clone(&shared_config);
    let scheduler_schedule_fallback = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);

    info!("timelog service started");

    tokio::select! {
        scheduler_result = scheduler::run_daily_scheduler(move || {
            Config::load()
                .unwrap_or_else(|_| (*scheduler_schedule_fallback).clone())
                .parse_ingest_time()
        }, move || {
            let config = Arc::clone(&scheduler_config);
            let grammar = Arc::clone(&grammar);
            async move {
                let runtime_config = Config::load().unwrap_or_else(|_| (*config).clone());
                tokio::task::spawn_blocking(move || {
                    run_ingest_once(&runtime_config, &grammar, None).map(|_| ())
                })
                .await
                .context("Ingest task failed")?
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn run_ingest_once(
    config: &Config,
    grammar: &ReportGrammar,
    limit: Option<usize>,
) -> Result<IngestSummary> {
    let source = MaildirSource::from_config(config);
    let embedder = embedding::from_config(config);
    let mut database = Database::open(&config.db_path)?;
    let limit = limit.unwrap_or(config.max_results).max(1);

    let summary = pipeline::run_ingest(grammar, &source, embedder.as_ref(), &mut database, limit)?;
    println!(
        "Ingest finished: {} stored, {} skipped, {} failed",
        summary.inserted, summary.skipped, summary.failed
    );

    Ok(summary)
}

fn build_grammar() -> Result<ReportGrammar> {
    ReportGrammar::new().context("Failed to compile report grammar")
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| "Config file not found. Run `timelog onboard` first.".to_string())
}
