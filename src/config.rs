use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Leading glyphs stripped from addresses before any other cleanup
pub const DEFAULT_ADDRESS_BULLETS: &str =
    "•·-\u{2022}\u{2023}\u{25E6}\u{2043}\u{2219}\u{00B7}\u{2024}\u{2025}\u{2026}";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub timeouts: TimeoutConfig,
    pub pacing: PacingConfig,
    pub limits: LimitsConfig,
    pub cleaning: CleaningConfig,
    pub sites: SitesConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub accept_language: String,
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            accept_language: "fr-FR,fr;q=0.9,en;q=0.8".to_string(),
            args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-accelerated-2d-canvas",
                "--no-first-run",
                "--no-zygote",
                "--disable-gpu",
                "--disable-background-timer-throttling",
                "--disable-backgrounding-occluded-windows",
                "--disable-renderer-backgrounding",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .collect(),
        }
    }
}

/// Bounded waits, all in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub listing_ms: u64,
    pub back_ms: u64,
    pub recovery_ms: u64,
    pub link_wait_ms: u64,
    pub consent_ms: u64,
    pub next_page_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            listing_ms: 20_000,
            back_ms: 8_000,
            recovery_ms: 8_000,
            link_wait_ms: 8_000,
            consent_ms: 5_000,
            next_page_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn listing(&self) -> Duration {
        Duration::from_millis(self.listing_ms)
    }

    pub fn back(&self) -> Duration {
        Duration::from_millis(self.back_ms)
    }

    pub fn recovery(&self) -> Duration {
        Duration::from_millis(self.recovery_ms)
    }

    pub fn link_wait(&self) -> Duration {
        Duration::from_millis(self.link_wait_ms)
    }

    pub fn consent(&self) -> Duration {
        Duration::from_millis(self.consent_ms)
    }

    pub fn next_page(&self) -> Duration {
        Duration::from_millis(self.next_page_ms)
    }
}

/// Inclusive millisecond range a randomized delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Between consecutive item visits
    pub fast: DelayRange,
    /// Between page transitions
    pub slow: DelayRange,
    pub scroll_settle_ms: u64,
    pub reveal_settle_ms: u64,
    pub page_hook_settle_ms: u64,
    pub consent_settle_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            fast: DelayRange::new(500, 1_200),
            slow: DelayRange::new(1_500, 2_500),
            scroll_settle_ms: 1_500,
            reveal_settle_ms: 800,
            page_hook_settle_ms: 2_000,
            consent_settle_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Consecutive unchanged card counts that end scrolling
    pub stable_threshold: u32,
    pub max_scroll_rounds: u32,
    pub links_per_page: usize,
    pub max_pages: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            stable_threshold: 5,
            max_scroll_rounds: 200,
            links_per_page: 20,
            max_pages: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub address_bullets: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            address_bullets: DEFAULT_ADDRESS_BULLETS.to_string(),
        }
    }
}

/// Per-site knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub detail_timeout_ms: u64,
    pub initial_settle_ms: u64,
    pub detail_settle_ms: u64,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SitesConfig {
    pub maps: SiteConfig,
    pub annuaire: SiteConfig,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            maps: SiteConfig {
                detail_timeout_ms: 8_000,
                initial_settle_ms: 3_000,
                detail_settle_ms: 1_000,
                services: vec![
                    "Services sur place".to_string(),
                    "Devis en ligne".to_string(),
                    "Livraison".to_string(),
                ],
            },
            annuaire: SiteConfig {
                detail_timeout_ms: 10_000,
                initial_settle_ms: 2_000,
                detail_settle_ms: 800,
                services: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_concurrent_sessions: usize,
    pub output_path: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 1,
            output_path: "out/listings.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("Invalid configuration YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, range) in [("pacing.fast", self.pacing.fast), ("pacing.slow", self.pacing.slow)] {
            if range.min_ms > range.max_ms {
                bail!("{} has min_ms {} above max_ms {}", name, range.min_ms, range.max_ms);
            }
        }
        if self.limits.stable_threshold == 0 {
            bail!("limits.stable_threshold must be at least 1");
        }
        if self.limits.max_pages == 0 || self.limits.links_per_page == 0 {
            bail!("limits.max_pages and limits.links_per_page must be at least 1");
        }
        if self.jobs.max_concurrent_sessions == 0 {
            bail!("jobs.max_concurrent_sessions must be at least 1");
        }
        Ok(())
    }

    /// Same limits and selectors, no waiting.
    #[cfg(test)]
    pub fn instant() -> Self {
        let mut config = Config::default();
        config.pacing = PacingConfig {
            fast: DelayRange::new(0, 0),
            slow: DelayRange::new(0, 0),
            scroll_settle_ms: 0,
            reveal_settle_ms: 0,
            page_hook_settle_ms: 0,
            consent_settle_ms: 0,
        };
        for site in [&mut config.sites.maps, &mut config.sites.annuaire] {
            site.initial_settle_ms = 0;
            site.detail_settle_ms = 0;
        }
        config
    }
}

pub async fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Config::from_yaml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_sections() {
        let config = Config::from_yaml(
            "pacing:\n  fast: { min_ms: 100, max_ms: 200 }\nlimits:\n  max_pages: 3\n",
        )
        .unwrap();

        assert_eq!(config.pacing.fast, DelayRange::new(100, 200));
        assert_eq!(config.pacing.slow, DelayRange::new(1_500, 2_500));
        assert_eq!(config.limits.max_pages, 3);
        assert_eq!(config.limits.stable_threshold, 5);
        assert_eq!(config.timeouts.listing(), Duration::from_secs(20));
        assert_eq!(config.sites.maps.services.len(), 3);
    }

    #[test]
    fn inverted_delay_range_is_rejected() {
        let err = Config::from_yaml("pacing:\n  slow: { min_ms: 3000, max_ms: 1000 }\n").unwrap_err();
        assert!(err.to_string().contains("pacing.slow"));
    }

    #[test]
    fn service_vocabulary_can_be_overridden() {
        let config = Config::from_yaml(
            "sites:\n  annuaire:\n    detail_timeout_ms: 9000\n    initial_settle_ms: 0\n    detail_settle_ms: 0\n    services: [\"Devis gratuit\"]\n",
        )
        .unwrap();
        assert_eq!(config.sites.annuaire.services, vec!["Devis gratuit".to_string()]);
        assert_eq!(config.sites.maps.detail_timeout_ms, 8_000);
    }
}
