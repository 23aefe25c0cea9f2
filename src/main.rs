use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

mod ai;
mod app;
mod cli;
mod config;
mod crawl;
mod db;
mod error;
mod logging;
mod models;
mod services;

use app::{App, RunOptions, Stage};
use cli::Cli;
use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_file.as_deref()) {
        eprintln!("Cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("\nExample {}:\n\n{}", cli.config.display(), Config::sample());
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &Config) -> anyhow::Result<ExitCode> {
    let app = App::new(config).context("Failed to set up API clients")?;

    if cli.check {
        app.check_connection()
            .await
            .context("Review API connection check failed")?;
        println!("Review API connection OK");
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }
    }

    if let Some(store_id) = cli.show {
        if let Some(lang) = cli.lang.as_deref() {
            let text = app
                .stored_translation(store_id, lang)
                .await
                .with_context(|| format!("Failed to load the {lang} summary of store {store_id}"))?;
            return Ok(match text {
                Some(text) => {
                    println!("{text}");
                    ExitCode::SUCCESS
                }
                None => {
                    eprintln!("No {lang} summary stored for store {store_id}");
                    ExitCode::FAILURE
                }
            });
        }

        let inspection = app
            .inspect_store(store_id)
            .await
            .with_context(|| format!("Failed to load store {store_id}"))?;
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(ExitCode::SUCCESS);
    }

    let options = RunOptions {
        force: cli.force,
        only_store: cli.store,
    };
    let report = app.run(&options).await.context("Review run failed")?;

    for store in &report.stores {
        match (&store.stage, &store.error) {
            (Stage::Error, Some((stage, message))) => println!(
                "{} ({}): failed after {}: {}",
                store.store_name, store.store_id, stage, message
            ),
            _ => println!(
                "{} ({}): {} fetched, {} new, {} saved, summary {}, {} languages",
                store.store_name,
                store.store_id,
                store.fetched,
                store.kept,
                store.saved,
                if store.summarized { "updated" } else { "unchanged" },
                store.translations
            ),
        }
    }

    Ok(if report.failed() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
