use crate::models::TaggedRecord;
use crate::scrapers::{ScraperTrait, SearchParams};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// A (city, sector) pair whose crawl produced nothing
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{sector} in {city}: {message}")]
    Crawl {
        city: String,
        sector: String,
        message: String,
    },

    #[error("{sector} in {city}: crawl task aborted: {message}")]
    Aborted {
        city: String,
        sector: String,
        message: String,
    },
}

/// Everything a job run produced, in (city, sector) order
#[derive(Debug, Default)]
pub struct JobReport {
    pub results: Vec<TaggedRecord>,
    pub failures: Vec<JobError>,
}

impl JobReport {
    /// Failed only when no pair produced a usable outcome.
    pub fn all_failed(&self, jobs: usize) -> bool {
        jobs > 0 && self.failures.len() == jobs
    }
}

/// Every pair of the city and sector lists, cities outermost
pub fn search_grid(cities: &[String], sectors: &[String]) -> Vec<SearchParams> {
    cities
        .iter()
        .flat_map(|city| {
            sectors
                .iter()
                .map(move |sector| SearchParams::new(city.as_str(), sector.as_str()))
        })
        .collect()
}

/// Fans a job out into one crawl session per (city, sector) pair
pub struct JobOrchestrator {
    scraper: Arc<dyn ScraperTrait>,
    max_concurrent: usize,
}

impl JobOrchestrator {
    pub fn new(scraper: Arc<dyn ScraperTrait>, max_concurrent: usize) -> Self {
        Self {
            scraper,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn run(&self, searches: Vec<SearchParams>) -> JobReport {
        info!(
            "🚀 {} search(es) on {}, {} session(s) at a time",
            searches.len(),
            self.scraper.source_name(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(searches.len());

        for search in searches {
            let scraper = Arc::clone(&self.scraper);
            let sem = Arc::clone(&semaphore);
            let params = search.clone();
            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await?;
                scraper.scrape(&params).await
            });
            handles.push((search, handle));
        }

        let tag = self.scraper.tags_records();
        let mut report = JobReport::default();

        // Awaited in spawn order so output follows the grid order.
        for (search, handle) in handles {
            match handle.await {
                Ok(Ok(records)) => {
                    info!(
                        "✅ {} in {}: {} record(s)",
                        search.sector,
                        search.city,
                        records.len()
                    );
                    report.results.extend(records.into_iter().map(|record| {
                        if tag {
                            TaggedRecord::tagged(record, &search.city, &search.sector)
                        } else {
                            TaggedRecord::untagged(record)
                        }
                    }));
                }
                Ok(Err(e)) => {
                    error!("❌ {} in {} failed: {:#}", search.sector, search.city, e);
                    report.failures.push(JobError::Crawl {
                        city: search.city,
                        sector: search.sector,
                        message: format!("{:#}", e),
                    });
                }
                Err(e) => {
                    error!("❌ {} in {} aborted: {}", search.sector, search.city, e);
                    report.failures.push(JobError::Aborted {
                        city: search.city,
                        sector: search.sector,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
