use crate::config::Config;
use crate::models::{Record, Site};
use crate::scrapers::browser::ChromeBrowser;
use crate::scrapers::consent::ConsentPolicy;
use crate::scrapers::drivers::{PageDriver, ScrollDriver};
use crate::scrapers::extract::RecordRules;
use crate::scrapers::item::RevealControl;
use crate::scrapers::session::CrawlSession;
use crate::scrapers::traits::{ListDriver, ScraperTrait};
use crate::scrapers::types::{CrawlError, SearchParams};
use crate::scrapers::{annuaire, maps};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where an item's detail view is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    /// A new asset-blocking tab per item, closed afterwards
    FreshTab,
    /// The listing tab itself, navigated back after every item
    SharedTab,
}

/// How the listing view is traversed
#[derive(Debug, Clone)]
pub enum ListingStyle {
    Scroll {
        card_selector: String,
        link_selector: String,
    },
    Paged {
        link_selector: String,
        href_pattern: String,
        next_selector: String,
        next_label: String,
        page_hook: String,
    },
}

impl ListingStyle {
    /// Fresh driver with its cursor at the start of the listing
    pub fn driver(&self, domain: &str, config: &Config) -> Box<dyn ListDriver> {
        match self {
            ListingStyle::Scroll {
                card_selector,
                link_selector,
            } => Box::new(ScrollDriver {
                card_selector: card_selector.clone(),
                link_selector: link_selector.clone(),
                settle: Duration::from_millis(config.pacing.scroll_settle_ms),
                stable_threshold: config.limits.stable_threshold,
                max_rounds: config.limits.max_scroll_rounds,
            }),
            ListingStyle::Paged {
                link_selector,
                href_pattern,
                next_selector,
                next_label,
                page_hook,
            } => Box::new(PageDriver {
                link_selector: link_selector.clone(),
                href_pattern: href_pattern.clone(),
                domain: domain.to_string(),
                next_selector: next_selector.clone(),
                next_label: next_label.clone(),
                page_hook: page_hook.clone(),
                links_per_page: config.limits.links_per_page,
                max_pages: config.limits.max_pages,
                link_wait: config.timeouts.link_wait(),
                navigation_timeout: config.timeouts.next_page(),
                hook_settle: Duration::from_millis(config.pacing.page_hook_settle_ms),
                current_page: 1,
            }),
        }
    }
}

/// Everything site-specific the engine needs
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub site: Site,
    /// The directory's own domain, never accepted as a business website
    pub domain: String,
    pub listing: ListingStyle,
    pub consent: ConsentPolicy,
    pub reveal: Option<RevealControl>,
    pub rules: RecordRules,
    pub detail: DetailMode,
    /// Records from this site carry their (city, sector) pair
    pub tags_records: bool,
    pub detail_timeout: Duration,
    pub initial_settle: Duration,
    pub detail_settle: Duration,
}

impl SiteProfile {
    pub fn for_site(site: Site, config: &Config) -> Self {
        match site {
            Site::Maps => maps::profile(config),
            Site::Annuaire => annuaire::profile(config),
        }
    }
}

/// Runs one headless Chrome session per search
pub struct DirectoryScraper {
    profile: Arc<SiteProfile>,
    config: Arc<Config>,
}

impl DirectoryScraper {
    pub fn new(site: Site, config: Arc<Config>) -> Self {
        let profile = Arc::new(SiteProfile::for_site(site, &config));
        Self { profile, config }
    }
}

#[async_trait]
impl ScraperTrait for DirectoryScraper {
    async fn scrape(&self, params: &SearchParams) -> Result<Vec<Record>> {
        let profile = Arc::clone(&self.profile);
        let config = Arc::clone(&self.config);
        let search = params.clone();

        // headless_chrome blocks, so the whole session lives on a blocking thread.
        let report = tokio::task::spawn_blocking(move || -> Result<_, CrawlError> {
            let browser = ChromeBrowser::launch(&config.browser)
                .map_err(|e| CrawlError::init("browser launch", e))?;
            CrawlSession::new(browser, &profile, &config).run(&search)
        })
        .await
        .context("Crawl worker panicked")??;

        info!(
            "🎉 {} / {} in {}: {} records from {} links ({} failed) over {} page(s)",
            self.profile.site,
            params.sector,
            params.city,
            report.records.len(),
            report.links_discovered,
            report.items_failed,
            report.pages_visited
        );
        Ok(report.records)
    }

    fn source_name(&self) -> &'static str {
        match self.profile.site {
            Site::Maps => "Google Maps",
            Site::Annuaire => "118712",
        }
    }

    fn tags_records(&self) -> bool {
        self.profile.tags_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagging_follows_the_site_profile() {
        let config = Arc::new(Config::default());
        for site in [Site::Maps, Site::Annuaire] {
            let scraper = DirectoryScraper::new(site, Arc::clone(&config));
            assert_eq!(
                scraper.tags_records(),
                SiteProfile::for_site(site, &config).tags_records
            );
        }
        assert!(DirectoryScraper::new(Site::Maps, Arc::clone(&config)).tags_records());
        assert!(!DirectoryScraper::new(Site::Annuaire, config).tags_records());
    }

    #[test]
    fn each_listing_style_gets_its_own_driver() {
        let config = Config::default();
        let scroll = SiteProfile::for_site(Site::Maps, &config).listing.driver("google.com", &config);
        let paged = SiteProfile::for_site(Site::Annuaire, &config)
            .listing
            .driver("118712.fr", &config);
        let base = "https://www.118712.fr/recherche/auto/Lyon/plombier";

        assert_eq!(scroll.pages_visited(), 1);
        assert_eq!(paged.pages_visited(), 1);
        assert_eq!(paged.listing_url(base), base);
    }
}
