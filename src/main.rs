mod config;
mod models;
mod orchestrator;
mod scrapers;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use config::Config;
use models::{ScrapeOutput, Site};
use orchestrator::{search_grid, JobOrchestrator};
use scrapers::DirectoryScraper;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Crawl business directories for (city, sector) searches
#[derive(Debug, Parser)]
#[command(name = "directory-scout", version)]
struct Cli {
    /// Directory to crawl
    #[arg(value_enum)]
    site: Site,

    /// City to search in (repeatable)
    #[arg(long = "city", required = true)]
    cities: Vec<String>,

    /// Business sector to search for (repeatable)
    #[arg(long = "sector", required = true)]
    sectors: Vec<String>,

    /// YAML configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Where the JSON results go (overrides jobs.output_path)
    #[arg(long)]
    output: Option<PathBuf>,
}

async fn write_output(path: &Path, output: &ScrapeOutput) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(output)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_warning) = match config::load_config(&cli.config).await {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("directory_scout={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = config_warning {
        warn!("Using default configuration ({:#})", e);
    }

    info!("📇 Directory Scout - {}", cli.site);
    info!("==========================================");

    let searches = search_grid(&cli.cities, &cli.sectors);
    let jobs = searches.len();
    let scraper = Arc::new(DirectoryScraper::new(cli.site, Arc::new(config.clone())));
    let orchestrator = JobOrchestrator::new(scraper, config.jobs.max_concurrent_sessions);

    let report = orchestrator.run(searches).await;

    info!("\n✅ Scraped {} listings\n", report.results.len());

    for (i, tagged) in report.results.iter().enumerate() {
        let record = &tagged.record;
        println!("{}. {}", i + 1, record.name);
        if let (Some(city), Some(sector)) = (&tagged.city, &tagged.sector) {
            println!("   Search: {} in {}", sector, city);
        }
        if let Some(address) = &record.address {
            println!("   Address: {}", address);
        }
        if let Some(phone) = &record.phone {
            println!("   Phone: {}", phone);
        }
        if let Some(website) = &record.website {
            println!("   Website: {}", website);
        }
        if let Some(email) = &record.email {
            println!("   Email: {}", email);
        }
        if !record.services.is_empty() {
            println!("   Services: {}", record.services.join(", "));
        }
        println!();
    }

    let all_failed = report.all_failed(jobs);
    let output = ScrapeOutput {
        success: !all_failed,
        site: cli.site,
        generated_at: Utc::now(),
        results: report.results,
        failures: report.failures.iter().map(ToString::to_string).collect(),
    };

    let path = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.jobs.output_path));
    write_output(&path, &output).await?;
    info!("💾 Saved {} listings to {}", output.results.len(), path.display());

    if all_failed {
        bail!("All {} search(es) failed", jobs);
    }
    Ok(())
}
