use crate::config::Config;
use crate::models::Site;
use crate::scrapers::consent::ConsentPolicy;
use crate::scrapers::extract::{Cleaner, ExtractionRule, Field, RecordRules, RuleChain};
use crate::scrapers::item::RevealControl;
use crate::scrapers::site::{DetailMode, ListingStyle, SiteProfile};
use std::time::Duration;

const DOMAIN: &str = "118712.fr";

/// 118712.fr: paginated result pages, items visited in the listing tab
pub fn profile(config: &Config) -> SiteProfile {
    let site = &config.sites.annuaire;

    SiteProfile {
        site: Site::Annuaire,
        domain: DOMAIN.to_string(),
        listing: ListingStyle::Paged {
            link_selector: "a[href*=\"/professionnels/\"]".to_string(),
            href_pattern: "/professionnels/".to_string(),
            next_selector: "button[onclick*=\"changePageUseCurrentBounds\"]".to_string(),
            next_label: "Page suivante".to_string(),
            page_hook: "changePageUseCurrentBounds".to_string(),
        },
        consent: ConsentPolicy {
            accept_selector: "#privacy-cookie-banner__privacy-accept".to_string(),
            wait: config.timeouts.consent(),
            overlay_selector: Some(
                ".modal, [class*=\"modal\"], [id*=\"cookie\"], [class*=\"cookie\"]".to_string(),
            ),
            settle: Duration::from_millis(config.pacing.consent_settle_ms),
        },
        reveal: Some(RevealControl {
            selector: "a[href=\"javascript:void(0)\"]".to_string(),
            label: "Afficher le n°".to_string(),
            settle: Duration::from_millis(config.pacing.reveal_settle_ms),
        }),
        rules: rules(config),
        detail: DetailMode::SharedTab,
        tags_records: false,
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
            vec![ExtractionRule::text("h1.h2"), ExtractionRule::text("h1")],
        ),
        address: RuleChain::new(
            Field::Address,
            Cleaner::Address {
                bullets: config.cleaning.address_bullets.clone(),
            },
            vec![ExtractionRule::text(".adress_label")],
        ),
        phone: RuleChain::new(
            Field::Phone,
            Cleaner::Phone,
            vec![
                ExtractionRule::text("a[href^=\"tel:\"]"),
                ExtractionRule::attribute("a[href^=\"tel:\"]", "href"),
            ],
        ),
        website: RuleChain::new(
            Field::Website,
            Cleaner::Website {
                own_domain: DOMAIN.to_string(),
            },
            vec![
                ExtractionRule::text(".website_label"),
                ExtractionRule::attribute("a.website_label", "href"),
            ],
        ),
        email: RuleChain::new(
            Field::Email,
            Cleaner::Email,
            vec![ExtractionRule::attribute("a[href^=\"mailto:\"]", "href")],
        ),
        services: config.sites.annuaire.services.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn hidden_phone_falls_back_to_the_tel_link() {
        let html = r#"<html><body>
            <h1>Serrurerie Rapide</h1>
            <div class="adress_label">– 14 bd de la Croix-Rousse
                69004 Lyon</div>
            <a href="tel:04 78 99 88 77">Afficher le n°</a>
            <a href="mailto:contact@serrurerie-rapide.fr">Écrire</a>
        </body></html>"#;
        let record = rules(&Config::default()).extract(&Html::parse_document(html)).unwrap();

        assert_eq!(record.name, "Serrurerie Rapide");
        assert_eq!(record.address.as_deref(), Some("14 bd de la Croix-Rousse 69004 Lyon"));
        assert_eq!(record.phone.as_deref(), Some("0478998877"));
        assert_eq!(record.email.as_deref(), Some("contact@serrurerie-rapide.fr"));
        assert_eq!(record.website, None);
        assert!(record.services.is_empty());
    }

    #[test]
    fn visible_phone_text_wins_over_the_tel_link() {
        let html = r#"<html><body>
            <h1 class="h2">Plomberie Favre</h1>
            <a href="tel:+33478000000">
                Appeler le 04 78 00 00 00
            </a>
        </body></html>"#;
        let record = rules(&Config::default()).extract(&Html::parse_document(html)).unwrap();

        assert_eq!(record.phone.as_deref(), Some("0478000000"));
    }

    #[test]
    fn profile_shares_the_listing_tab() {
        let profile = profile(&Config::default());
        assert_eq!(profile.detail, DetailMode::SharedTab);
        assert!(!profile.tags_records);
        assert!(profile.reveal.is_some());
        assert_eq!(profile.detail_timeout, Duration::from_secs(10));
    }
}
