use crate::models::Record;
use crate::scrapers::browser::Page;
use crate::scrapers::types::{Batch, SearchParams};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all directory scrapers
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Scrape every listing for one (city, sector) search
    async fn scrape(&self, params: &SearchParams) -> Result<Vec<Record>>;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;

    /// Whether records get tagged with the search that produced them
    fn tags_records(&self) -> bool {
        false
    }
}

/// Traverses a listing view. Chosen once per job from the site profile.
pub trait ListDriver {
    /// Entries on the current listing view
    fn discover(&mut self, page: &dyn Page) -> Result<Batch>;

    /// Move to the next listing view; false once there is none.
    fn advance(&mut self, page: &dyn Page) -> bool;

    /// Known-good URL of the current listing view
    fn listing_url(&self, base_url: &str) -> String;

    fn pages_visited(&self) -> u32;
}
