use crate::models::{Record, Site};
use crate::scrapers::consent::ConsentOutcome;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One (city, sector) search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// City the directory is searched in
    pub city: String,
    /// Business sector, e.g. "plombier"
    pub sector: String,
}

impl SearchParams {
    pub fn new(city: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            sector: sector.into(),
        }
    }

    /// Listing URL the crawl starts from for the given site
    pub fn search_url(&self, site: Site) -> Result<String> {
        let (base, segments) = match site {
            Site::Maps => (
                "https://www.google.com/maps/search",
                vec![format!("{} {}", self.sector, self.city)],
            ),
            Site::Annuaire => (
                "https://www.118712.fr/recherche/auto",
                vec![self.city.clone(), self.sector.clone()],
            ),
        };

        let mut url = Url::parse(base)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot carry path segments", base))?
            .extend(segments.iter().map(|segment| segment.trim()));
        Ok(url.to_string())
    }
}

/// Absolute URL of one item discovered on a listing view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingEntry(String);

impl ListingEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entries found on the current listing view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub entries: Vec<ListingEntry>,
    /// No further listing views exist once this batch is processed
    pub done: bool,
}

/// Lookup fault while evaluating an extraction rule
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

/// Why a single item produced no record
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("could not open a detail tab: {0}")]
    DetailTab(#[source] BoxError),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("could not read the page at {url}: {source}")]
    Content {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("extraction failed on {url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractError,
    },

    #[error("no usable name on {url}")]
    MissingName { url: String },
}

impl ItemFailure {
    /// The item's page loaded, so the tab still sits on a detail view.
    pub fn page_loaded(&self) -> bool {
        matches!(
            self,
            ItemFailure::MissingName { .. }
                | ItemFailure::Extraction { .. }
                | ItemFailure::Content { .. }
        )
    }
}

/// Fatal session failure: the crawl could not even start
#[derive(Debug, Error)]
#[error("crawl session failed during {stage}: {source}")]
pub struct CrawlError {
    pub stage: &'static str,
    #[source]
    pub source: BoxError,
}

impl CrawlError {
    pub fn init(stage: &'static str, source: anyhow::Error) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Session lifecycle, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    ConsentHandling,
    Listing,
    ItemLoop,
    Done,
    Failed,
}

/// What one crawl session produced
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub records: Vec<Record>,
    pub links_discovered: usize,
    pub items_failed: usize,
    pub pages_visited: u32,
    /// How the consent banner was dealt with, once the listing loaded
    pub consent: Option<ConsentOutcome>,
}
