use crate::config::Config;
use crate::models::Site;
use crate::scrapers::consent::ConsentPolicy;
use crate::scrapers::extract::{Cleaner, ExtractionRule, Field, RecordRules, RuleChain};
use crate::scrapers::site::{DetailMode, ListingStyle, SiteProfile};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

const DOMAIN: &str = "google.com";

static PHONE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0[1-9](?:[\s.-]?\d{2}){4}|\+?\d[\d\s.-]{9,}").unwrap());

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

/// Google Maps search results: a scrolling feed of cards, one tab per place
pub fn profile(config: &Config) -> SiteProfile {
    let site = &config.sites.maps;

    SiteProfile {
        site: Site::Maps,
        domain: DOMAIN.to_string(),
        listing: ListingStyle::Scroll {
            card_selector: "div.Nv2PK".to_string(),
            link_selector: "a[href*=\"/maps/place/\"]".to_string(),
        },
        consent: ConsentPolicy {
            accept_selector: "button[aria-label=\"Tout accepter\"]".to_string(),
            wait: config.timeouts.consent(),
            overlay_selector: None,
            settle: Duration::from_millis(config.pacing.consent_settle_ms),
        },
        reveal: None,
        rules: rules(config),
        detail: DetailMode::FreshTab,
        tags_records: true,
        detail_timeout: Duration::from_millis(site.detail_timeout_ms),
        initial_settle: Duration::from_millis(site.initial_settle_ms),
        detail_settle: Duration::from_millis(site.detail_settle_ms),
    }
}

fn rules(config: &Config) -> RecordRules {
    RecordRules {
        name: RuleChain::new(
            Field::Name,
            Cleaner::Text,
            vec![
                ExtractionRule::text("h1"),
                ExtractionRule::text("[data-attrid=\"title\"]"),
                ExtractionRule::text(".DUwDvf"),
                ExtractionRule::text(".fontHeadlineLarge"),
            ],
        ),
        address: RuleChain::new(
            Field::Address,
            Cleaner::Address {
                bullets: config.cleaning.address_bullets.clone(),
            },
            vec![
                ExtractionRule::text("[data-item-id=\"address\"]"),
                ExtractionRule::text("button[data-item-id=\"address\"]"),
                ExtractionRule::text("[data-attrid*=\"address\"]"),
                ExtractionRule::text(".rogA2c"),
            ],
        ),
        phone: RuleChain::new(
            Field::Phone,
            Cleaner::Phone,
            vec![
                ExtractionRule::attribute_pattern("button[data-item-id*=\"phone\"]", "aria-label", &PHONE_TEXT),
                ExtractionRule::pattern("button[data-item-id*=\"phone\"]", &PHONE_TEXT),
                ExtractionRule::attribute("a[href^=\"tel:\"]", "href"),
                ExtractionRule::attribute_pattern("button[aria-label*=\"téléphone\"]", "aria-label", &PHONE_TEXT),
                ExtractionRule::attribute_pattern("button[aria-label*=\"phone\"]", "aria-label", &PHONE_TEXT),
            ],
        ),
        website: RuleChain::new(
            Field::Website,
            Cleaner::Website {
                own_domain: DOMAIN.to_string(),
            },
            vec![
                ExtractionRule::attribute("a[data-item-id=\"authority\"]", "href"),
                ExtractionRule::attribute("a[aria-label*=\"site\"]", "href"),
                ExtractionRule::attribute("button[data-item-id=\"authority\"]", "href"),
            ],
        ),
        email: RuleChain::new(Field::Email, Cleaner::Email, vec![ExtractionRule::document_pattern(&EMAIL)]),
        services: config.sites.maps.services.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PLACE: &str = r#"<html><body>
        <div role="main">
          <h1 class="DUwDvf fontHeadlineLarge">Plomberie  Dupont</h1>
          <button data-item-id="address" aria-label="Adresse: 8 Rue Mercière">
            <div class="rogA2c">&#xe0c8;</div><div class="Io6YTe"> · 8 Rue Mercière, 69002 Lyon</div>
          </button>
          <a data-item-id="authority" href="https://plomberie-dupont.fr/">plomberie-dupont.fr</a>
          <button data-item-id="phone:tel:0472000000" aria-label="Numéro de téléphone: 04 72 00 00 00">04 72 00 00 00</button>
          <div>Services sur place · Devis en ligne</div>
          <p>contact@plomberie-dupont.fr</p>
        </div>
    </body></html>"#;

    #[test]
    fn place_page_extracts_every_field() {
        let rules = rules(&Config::default());
        let record = rules.extract(&Html::parse_document(PLACE)).unwrap();

        assert_eq!(record.name, "Plomberie Dupont");
        assert_eq!(record.address.as_deref(), Some("8 Rue Mercière, 69002 Lyon"));
        assert_eq!(record.phone.as_deref(), Some("0472000000"));
        assert_eq!(record.website.as_deref(), Some("https://plomberie-dupont.fr/"));
        assert_eq!(record.email.as_deref(), Some("contact@plomberie-dupont.fr"));
        assert_eq!(
            record.services,
            vec!["Services sur place".to_string(), "Devis en ligne".to_string()]
        );
    }

    #[test]
    fn google_links_are_not_websites() {
        let html = r#"<html><body><h1>Chez Léon</h1>
            <a data-item-id="authority" href="https://www.google.com/url?q=x">Site</a>
        </body></html>"#;
        let record = rules(&Config::default()).extract(&Html::parse_document(html)).unwrap();
        assert_eq!(record.website, None);
    }

    #[test]
    fn profile_opens_each_place_in_its_own_tab() {
        let profile = profile(&Config::default());
        assert_eq!(profile.detail, DetailMode::FreshTab);
        assert!(profile.tags_records);
        assert_eq!(profile.detail_timeout, Duration::from_secs(8));
    }
}
