//! ShopTalk - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use shoptalk::{
    cli::{render_answer, render_health, Args, Commands},
    telemetry::init_tracing,
    Config, Pipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();
    init_tracing(verbosity.directive());

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Commands::Ask { query, k, json } => {
            let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;
            let k = k.unwrap_or_else(|| pipeline.default_k());

            let response = pipeline.answer(&query, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render_answer(&response, verbosity.show_diagnostics()));
            }
        }

        Commands::Health => {
            let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;
            let report = pipeline.health().await;
            print!("{}", render_health(&report));
            if !report.is_healthy() {
                std::process::exit(1);
            }
        }

        Commands::Config { init } => {
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    println!("{} {}", "Config already exists:".yellow(), path.display());
                } else {
                    Config::default().save(&path)?;
                    println!("{} {}", "Wrote default config to".green(), path.display());
                }
            } else {
                println!("{}", toml::to_string_pretty(&config.redacted())?);
            }
        }
    }

    Ok(())
}
