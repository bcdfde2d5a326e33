use super::commands::{ReportArgs, RunArgs};
use super::output::OutputFormatter;
use crate::adapters::HttpReleaseScraper;
use crate::app::{self, Services};
use crate::config::{AutobuildConfig, ConfigError};
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

/// Resolve configuration and apply command-line overrides on top.
pub fn load_config(args: &RunArgs) -> Result<AutobuildConfig, ConfigError> {
    let mut config = AutobuildConfig::from_env()?;
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

pub fn apply_overrides(config: &mut AutobuildConfig, args: &RunArgs) {
    if let Some(limit) = args.limit {
        config.limit = limit;
    }
    if args.no_health_checks {
        config.health_checks = false;
    }
    if args.no_push {
        config.do_push = false;
    }
}

pub async fn handle_run(args: &RunArgs) -> i32 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 1;
        }
    };
    info!("{}", config);

    let services = match Services::production(&config) {
        Ok(services) => services,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    match app::run(&config, services, Utc::now().date_naive()).await {
        Ok(summary) => summary.exit_code(),
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

pub async fn handle_plan(args: &ReportArgs) -> i32 {
    let config = match AutobuildConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return 1;
        }
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return 1;
        }
    };
    let scraper = HttpReleaseScraper::new(client, &config.releases_url, &config.alpine_mirror);

    let output = app::plan(&config, &scraper, Utc::now().date_naive())
        .await
        .map_err(anyhow::Error::from)
        .and_then(|plan| OutputFormatter::new(args.format.into()).format_plan(&plan));

    print_or_fail(output)
}

pub fn handle_stats(args: &ReportArgs) -> i32 {
    let output = AutobuildConfig::from_env()
        .map_err(anyhow::Error::from)
        .and_then(|config| app::manifest_stats(&config).map_err(anyhow::Error::from))
        .and_then(|stats| OutputFormatter::new(args.format.into()).format_stats(&stats));

    print_or_fail(output)
}

fn print_or_fail(output: anyhow::Result<String>) -> i32 {
    match output {
        Ok(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            0
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}
