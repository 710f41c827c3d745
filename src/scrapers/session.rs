use crate::config::{Config, DelayRange, TimeoutConfig};
use crate::models::Record;
use crate::scrapers::browser::{Browser, Page, PageOptions};
use crate::scrapers::consent::handle_consent;
use crate::scrapers::item::ItemProcessor;
use crate::scrapers::site::{DetailMode, SiteProfile};
use crate::scrapers::traits::ListDriver;
use crate::scrapers::types::{
    CrawlError, ItemFailure, ListingEntry, SearchParams, SessionReport, SessionState,
};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Randomized pauses between navigations.
///
/// The jitter keeps the crawl from settling into a fixed, detectable cadence.
pub struct Pacer {
    fast: DelayRange,
    slow: DelayRange,
    rng: fastrand::Rng,
}

impl Pacer {
    pub fn new(fast: DelayRange, slow: DelayRange) -> Self {
        Self {
            fast,
            slow,
            rng: fastrand::Rng::new(),
        }
    }

    fn pick(&mut self, range: DelayRange) -> Duration {
        Duration::from_millis(self.rng.u64(range.min_ms..=range.max_ms))
    }

    /// Between consecutive item visits
    pub fn fast_pause(&mut self) {
        let delay = self.pick(self.fast);
        thread::sleep(delay);
    }

    /// Between page transitions
    pub fn slow_pause(&mut self) {
        let delay = self.pick(self.slow);
        debug!("Pausing {:?} before the next page", delay);
        thread::sleep(delay);
    }
}

/// One browser, one (city, sector) search, driven strictly in sequence.
pub struct CrawlSession<'a, B: Browser> {
    browser: B,
    profile: &'a SiteProfile,
    config: &'a Config,
    pacer: Pacer,
    state: SessionState,
    seen: HashSet<ListingEntry>,
    closed: bool,
}

impl<'a, B: Browser> CrawlSession<'a, B> {
    pub fn new(browser: B, profile: &'a SiteProfile, config: &'a Config) -> Self {
        Self {
            browser,
            profile,
            config,
            pacer: Pacer::new(config.pacing.fast, config.pacing.slow),
            state: SessionState::Init,
            seen: HashSet::new(),
            closed: false,
        }
    }

    /// Crawl the search to completion. Only a failed start is an error;
    /// the browser is closed on every path.
    pub fn run(mut self, params: &SearchParams) -> Result<SessionReport, CrawlError> {
        let outcome = self.crawl(params);
        if let Err(e) = &outcome {
            error!("❌ {}", e);
            self.enter(SessionState::Failed);
        }
        self.shutdown();
        outcome
    }

    fn enter(&mut self, state: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.browser.close() {
            warn!("Closing the browser failed: {}", e);
        }
    }

    fn crawl(&mut self, params: &SearchParams) -> Result<SessionReport, CrawlError> {
        self.enter(SessionState::Init);
        let base_url = params
            .search_url(self.profile.site)
            .map_err(|e| CrawlError::init("search URL", e))?;
        let listing = self
            .browser
            .open_page(PageOptions::default())
            .map_err(|e| CrawlError::init("listing tab", e))?;

        info!("🔍 Navigating to {}", base_url);
        listing
            .navigate(&base_url, self.config.timeouts.listing())
            .map_err(|e| CrawlError::init("listing navigation", e))?;
        thread::sleep(self.profile.initial_settle);

        self.enter(SessionState::ConsentHandling);
        let consent = handle_consent(&listing, &self.profile.consent);
        debug!("Consent outcome: {:?}", consent);

        let mut driver = self.profile.listing.driver(&self.profile.domain, self.config);
        let mut report = SessionReport {
            consent: Some(consent),
            ..SessionReport::default()
        };

        loop {
            self.enter(SessionState::Listing);
            let batch = match driver.discover(&listing) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Listing discovery failed: {}", e);
                    break;
                }
            };
            if batch.entries.is_empty() {
                warn!("⚠️ No item links on page {}", driver.pages_visited());
                break;
            }

            let fresh: Vec<ListingEntry> = batch
                .entries
                .into_iter()
                .filter(|entry| self.seen.insert(entry.clone()))
                .collect();
            report.links_discovered += fresh.len();

            self.enter(SessionState::ItemLoop);
            self.item_loop(&listing, driver.as_ref(), &base_url, &fresh, &mut report);

            if batch.done || !driver.advance(&listing) {
                break;
            }
            self.pacer.slow_pause();
        }

        report.pages_visited = driver.pages_visited();
        if let Err(e) = listing.close() {
            debug!("Listing tab close failed: {}", e);
        }
        self.enter(SessionState::Done);
        Ok(report)
    }

    fn item_loop(
        &mut self,
        listing: &B::Page,
        driver: &dyn ListDriver,
        base_url: &str,
        entries: &[ListingEntry],
        report: &mut SessionReport,
    ) {
        let profile = self.profile;
        let timeouts = &self.config.timeouts;
        let processor = ItemProcessor::new(profile);

        for (index, entry) in entries.iter().enumerate() {
            debug!("🔄 {}/{}: {}", index + 1, entries.len(), entry);

            let outcome = match profile.detail {
                DetailMode::FreshTab => self.visit_in_fresh_tab(&processor, entry),
                DetailMode::SharedTab => processor.process(listing, entry),
            };

            let listing_intact = match &outcome {
                Ok(_) => true,
                Err(failure) => failure.page_loaded(),
            };
            match outcome {
                Ok(record) => accept(record, report),
                Err(failure) => {
                    warn!("❌ Item {} skipped: {}", index + 1, failure);
                    report.items_failed += 1;
                }
            }

            if profile.detail == DetailMode::SharedTab
                && !return_to_listing(listing, driver, base_url, listing_intact, timeouts)
            {
                error!("❌ Listing could not be restored, leaving page {}", driver.pages_visited());
                break;
            }

            self.pacer.fast_pause();
        }
    }

    fn visit_in_fresh_tab(
        &self,
        processor: &ItemProcessor<'_>,
        entry: &ListingEntry,
    ) -> Result<Record, ItemFailure> {
        let tab = self
            .browser
            .open_page(PageOptions { block_assets: true })
            .map_err(|e| ItemFailure::DetailTab(e.into()))?;
        let outcome = processor.process(&tab, entry);
        if let Err(e) = tab.close() {
            debug!("Detail tab close failed: {}", e);
        }
        outcome
    }
}

impl<B: Browser> Drop for CrawlSession<'_, B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept(record: Record, report: &mut SessionReport) {
    if !record.is_valid() {
        return;
    }
    info!(
        "✅ {} | {} | {}",
        record.name,
        record.phone.as_deref().unwrap_or("no phone"),
        record.address.as_deref().unwrap_or("no address")
    );
    report.records.push(record);
}

/// Put the shared tab back on the listing: history first, then a recovery
/// reload of the known-good listing URL. False when both fail.
fn return_to_listing(
    listing: &dyn Page,
    driver: &dyn ListDriver,
    base_url: &str,
    page_loaded: bool,
    timeouts: &TimeoutConfig,
) -> bool {
    if page_loaded {
        match listing.go_back(timeouts.back()) {
            Ok(()) => return true,
            Err(e) => warn!("Back navigation failed: {}", e),
        }
    }

    let url = driver.listing_url(base_url);
    info!("♻️ Reloading {}", url);
    match listing.navigate(&url, timeouts.recovery()) {
        Ok(()) => true,
        Err(e) => {
            error!("Recovery reload of {} failed: {}", url, e);
            false
        }
    }
}
