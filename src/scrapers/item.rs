use crate::models::Record;
use crate::scrapers::browser::Page;
use crate::scrapers::site::SiteProfile;
use crate::scrapers::types::{ItemFailure, ListingEntry};
use scraper::Html;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Control hiding a phone number until clicked
#[derive(Debug, Clone)]
pub struct RevealControl {
    pub selector: String,
    pub label: String,
    pub settle: Duration,
}

/// Visits one entry's detail view and turns it into a record.
pub struct ItemProcessor<'a> {
    profile: &'a SiteProfile,
}

impl<'a> ItemProcessor<'a> {
    pub fn new(profile: &'a SiteProfile) -> Self {
        Self { profile }
    }

    pub fn process(&self, page: &dyn Page, entry: &ListingEntry) -> Result<Record, ItemFailure> {
        let url = entry.url().to_string();

        page.navigate(&url, self.profile.detail_timeout)
            .map_err(|e| ItemFailure::Navigation {
                url: url.clone(),
                source: e.into(),
            })?;
        thread::sleep(self.profile.detail_settle);

        if let Some(reveal) = &self.profile.reveal {
            reveal_phone(page, reveal);
        }

        let html = page.content().map_err(|e| ItemFailure::Content {
            url: url.clone(),
            source: e.into(),
        })?;
        let document = Html::parse_document(&html);
        let record = self
            .profile
            .rules
            .extract(&document)
            .map_err(|source| ItemFailure::Extraction {
                url: url.clone(),
                source,
            })?;

        if !record.is_valid() {
            return Err(ItemFailure::MissingName { url });
        }
        Ok(record)
    }
}

fn reveal_phone(page: &dyn Page, reveal: &RevealControl) {
    match page.click(&reveal.selector, Some(&reveal.label)) {
        Ok(true) => {
            debug!("Phone number revealed");
            thread::sleep(reveal.settle);
        }
        Ok(false) => {}
        Err(e) => debug!("Phone reveal skipped: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Site;
    use crate::scrapers::testing::FakeWeb;

    const DETAIL: &str = "https://www.118712.fr/professionnels/garage-du-centre";

    fn entry() -> ListingEntry {
        ListingEntry::new(DETAIL)
    }

    #[test]
    fn detail_page_becomes_a_record() {
        let web = FakeWeb::new().document(
            DETAIL,
            r#"<html><body>
                <h1 class="h2">Garage du Centre</h1>
                <div class="adress_label">3 rue Victor Hugo 69002 Lyon</div>
                <a href="javascript:void(0)">Afficher le n°</a>
                <a href="tel:0478000000">Appeler le 04 78 00 00 00</a>
                <span class="website_label">garageducentre.fr</span>
            </body></html>"#,
        );
        let page = web.page_at("https://www.118712.fr/recherche/auto/Lyon/garage");
        let profile = SiteProfile::for_site(Site::Annuaire, &Config::instant());

        let record = ItemProcessor::new(&profile).process(&page, &entry()).unwrap();

        assert_eq!(record.name, "Garage du Centre");
        assert_eq!(record.address.as_deref(), Some("3 rue Victor Hugo 69002 Lyon"));
        assert_eq!(record.phone.as_deref(), Some("0478000000"));
        assert_eq!(record.website.as_deref(), Some("http://garageducentre.fr"));
        assert_eq!(web.clicks(), vec!["a[href=\"javascript:void(0)\"]".to_string()]);
    }

    #[test]
    fn nameless_page_is_an_item_failure() {
        let web = FakeWeb::new().document(DETAIL, "<html><body><p>Oops</p></body></html>");
        let page = web.page_at("about:blank");
        let profile = SiteProfile::for_site(Site::Annuaire, &Config::instant());

        let failure = ItemProcessor::new(&profile).process(&page, &entry()).unwrap_err();
        assert!(matches!(failure, ItemFailure::MissingName { .. }));
        assert!(failure.page_loaded());
    }

    #[test]
    fn dead_link_is_a_navigation_failure() {
        let web = FakeWeb::new().failing(DETAIL);
        let page = web.page_at("about:blank");
        let profile = SiteProfile::for_site(Site::Annuaire, &Config::instant());

        let failure = ItemProcessor::new(&profile).process(&page, &entry()).unwrap_err();
        assert!(matches!(failure, ItemFailure::Navigation { ref url, .. } if url == DETAIL));
        assert!(!failure.page_loaded());
    }
}
