use crate::scrapers::browser::Page;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How a site's cookie/consent overlay is dismissed
#[derive(Debug, Clone)]
pub struct ConsentPolicy {
    pub accept_selector: String,
    pub wait: Duration,
    /// Overlays ripped out of the DOM when no accept button shows up
    pub overlay_selector: Option<String>,
    pub settle: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Accepted,
    OverlaysRemoved(usize),
    NotFound,
}

/// Best-effort: never fails, the crawl proceeds whatever happens here.
pub fn handle_consent(page: &dyn Page, policy: &ConsentPolicy) -> ConsentOutcome {
    info!("🍪 Looking for a consent banner...");

    let accepted = page
        .wait_for(&policy.accept_selector, policy.wait)
        .and_then(|()| page.click(&policy.accept_selector, None));

    let outcome = match accepted {
        Ok(true) => {
            info!("✅ Consent accepted");
            ConsentOutcome::Accepted
        }
        Ok(false) | Err(_) => match &policy.overlay_selector {
            Some(selector) => match page.remove_all(selector) {
                Ok(removed) => {
                    warn!("Consent not accepted, removed {} overlay(s)", removed);
                    ConsentOutcome::OverlaysRemoved(removed)
                }
                Err(e) => {
                    warn!("Consent overlay removal failed: {}", e);
                    ConsentOutcome::NotFound
                }
            },
            None => {
                info!("No consent banner to handle");
                ConsentOutcome::NotFound
            }
        },
    };

    thread::sleep(policy.settle);
    outcome
}
