use crate::scrapers::browser::Page;
use crate::scrapers::extract::parse_selector;
use crate::scrapers::traits::ListDriver;
use crate::scrapers::types::{Batch, ListingEntry};
use anyhow::Result;
use scraper::Html;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Resolve `href` against the page URL, dropping anything unparsable.
fn absolute(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Infinite-scroll listing: scroll until the card count stops growing.
pub struct ScrollDriver {
    pub card_selector: String,
    pub link_selector: String,
    pub settle: Duration,
    pub stable_threshold: u32,
    pub max_rounds: u32,
}

impl ScrollDriver {
    /// Returns the card count once it held still long enough.
    fn scroll_until_stable(&self, page: &dyn Page) -> Result<usize> {
        let mut previous = 0;
        let mut stable = 0;
        let mut rounds = 0;

        while stable < self.stable_threshold {
            if rounds >= self.max_rounds {
                warn!("Scroll cap of {} rounds hit before the list settled", self.max_rounds);
                break;
            }
            rounds += 1;

            page.scroll_last_into_view(&self.card_selector)?;
            thread::sleep(self.settle);
            let count = page.count(&self.card_selector)?;

            if count == previous {
                stable += 1;
            } else {
                stable = 0;
            }
            debug!("Scroll round {}: {} cards (stable {})", rounds, count, stable);
            previous = count;
        }

        Ok(previous)
    }

    fn collect_links(&self, page: &dyn Page) -> Result<Vec<ListingEntry>> {
        let base = Url::parse(&page.current_url()?)?;
        let document = Html::parse_document(&page.content()?);
        let cards = parse_selector(&self.card_selector)?;
        let link = parse_selector(&self.link_selector)?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for card in document.select(&cards) {
            let href = card
                .select(&link)
                .next()
                .and_then(|anchor| anchor.value().attr("href"))
                .and_then(|href| absolute(&base, href));
            if let Some(url) = href {
                if seen.insert(url.clone()) {
                    entries.push(ListingEntry::new(url));
                }
            }
        }
        Ok(entries)
    }
}

impl ListDriver for ScrollDriver {
    fn discover(&mut self, page: &dyn Page) -> Result<Batch> {
        let cards = self.scroll_until_stable(page)?;
        let entries = self.collect_links(page)?;
        info!("📋 {} cards rendered, {} unique links", cards, entries.len());

        // The whole result set is reachable by scrolling, so there is never a next page.
        Ok(Batch { entries, done: true })
    }

    fn advance(&mut self, _page: &dyn Page) -> bool {
        false
    }

    fn listing_url(&self, base_url: &str) -> String {
        base_url.to_string()
    }

    fn pages_visited(&self) -> u32 {
        1
    }
}

/// Click-paginated listing with a hard page ceiling
pub struct PageDriver {
    pub link_selector: String,
    pub href_pattern: String,
    pub domain: String,
    pub next_selector: String,
    pub next_label: String,
    pub page_hook: String,
    pub links_per_page: usize,
    pub max_pages: u32,
    pub link_wait: Duration,
    pub navigation_timeout: Duration,
    pub hook_settle: Duration,
    pub current_page: u32,
}

impl PageDriver {
    fn scan(
        &self,
        page: &dyn Page,
        selector: &str,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Vec<ListingEntry>> {
        let base = Url::parse(&page.current_url()?)?;
        let document = Html::parse_document(&page.content()?);
        let selector = parse_selector(selector)?;

        let mut seen = HashSet::new();
        let entries = document
            .select(&selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(|href| absolute(&base, href))
            .filter(|url| url.contains(&self.href_pattern) && keep(url))
            .filter(|url| seen.insert(url.clone()))
            .take(self.links_per_page)
            .map(ListingEntry::new)
            .collect();
        Ok(entries)
    }

    fn primary_links(&self, page: &dyn Page) -> Vec<ListingEntry> {
        if let Err(e) = page.wait_for(&self.link_selector, self.link_wait) {
            warn!("Item links did not show up on page {}: {}", self.current_page, e);
            return Vec::new();
        }
        self.scan(page, &self.link_selector, |_| true).unwrap_or_else(|e| {
            warn!("Primary link scan failed: {}", e);
            Vec::new()
        })
    }

    fn try_next(&self, page: &dyn Page, target: u32) -> Result<bool> {
        let from = page.current_url()?;
        if page.click(&self.next_selector, Some(&self.next_label))? {
            info!("🔄 Clicking '{}'", self.next_label);
            page.wait_for_navigation(&from, self.navigation_timeout)?;
            return Ok(true);
        }

        if page.call_hook(&self.page_hook, target)? {
            info!("🔄 Called {}({})", self.page_hook, target);
            thread::sleep(self.hook_settle);
            return Ok(true);
        }

        Ok(false)
    }
}

impl ListDriver for PageDriver {
    fn discover(&mut self, page: &dyn Page) -> Result<Batch> {
        let mut entries = self.primary_links(page);
        if entries.is_empty() {
            warn!("Falling back to a document-wide link scan");
            entries = self.scan(page, "a[href]", |url| url.contains(&self.domain))?;
        }
        info!("📄 Page {}: {} item links", self.current_page, entries.len());

        Ok(Batch { entries, done: false })
    }

    fn advance(&mut self, page: &dyn Page) -> bool {
        if self.current_page >= self.max_pages {
            info!("Reached the {}-page ceiling", self.max_pages);
            return false;
        }

        let target = self.current_page + 1;
        match self.try_next(page, target) {
            Ok(true) => {
                self.current_page = target;
                true
            }
            Ok(false) => {
                info!("No next-page control, pagination exhausted");
                false
            }
            Err(e) => {
                warn!("Moving to page {} failed: {}", target, e);
                false
            }
        }
    }

    fn listing_url(&self, base_url: &str) -> String {
        if self.current_page <= 1 {
            return base_url.to_string();
        }
        let separator = if base_url.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", base_url, separator, self.current_page)
    }

    fn pages_visited(&self) -> u32 {
        self.current_page
    }
}
