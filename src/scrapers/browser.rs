use crate::config::BrowserConfig;
use anyhow::{bail, Context, Result};
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One navigable browser tab.
///
/// Every method blocks until the browser answers. Selectors are CSS selectors
/// evaluated inside the page.
pub trait Page {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Return to the previous history entry.
    fn go_back(&self, timeout: Duration) -> Result<()>;

    /// Wait until the document has left `from_url` and finished loading.
    fn wait_for_navigation(&self, from_url: &str, timeout: Duration) -> Result<()>;

    /// Fails when nothing matches `selector` before `timeout`.
    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    fn current_url(&self) -> Result<String>;

    /// Rendered HTML of the whole document
    fn content(&self) -> Result<String>;

    fn count(&self, selector: &str) -> Result<usize>;

    /// Returns false when nothing matches.
    fn scroll_last_into_view(&self, selector: &str) -> Result<bool>;

    /// Click the first element matching `selector` whose text contains `label`.
    fn click(&self, selector: &str, label: Option<&str>) -> Result<bool>;

    /// Remove every matching element from the DOM, returning how many went.
    fn remove_all(&self, selector: &str) -> Result<usize>;

    /// Call `window[function](argument)` if the page defines it.
    fn call_hook(&self, function: &str, argument: u32) -> Result<bool>;

    fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageOptions {
    /// Abort image, stylesheet, font and media requests
    pub block_assets: bool,
}

/// A browser instance owning its tabs
pub trait Browser {
    type Page: Page;

    fn open_page(&self, options: PageOptions) -> Result<Self::Page>;

    /// Shut the browser down. Called once per session.
    fn close(&mut self) -> Result<()>;
}

/// Headless Chrome driven over the DevTools protocol
pub struct ChromeBrowser {
    browser: Option<headless_chrome::Browser>,
    user_agent: String,
    accept_language: String,
}

impl ChromeBrowser {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let window_arg = format!("--window-size={},{}", config.window_width, config.window_height);
        let mut args: Vec<&OsStr> = config.args.iter().map(OsStr::new).collect();
        args.push(OsStr::new(&window_arg));

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(Duration::from_secs(300))
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        let browser =
            headless_chrome::Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser: Some(browser),
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        })
    }
}

impl Browser for ChromeBrowser {
    type Page = ChromePage;

    fn open_page(&self, options: PageOptions) -> Result<ChromePage> {
        let Some(browser) = &self.browser else {
            bail!("Browser already closed");
        };

        let tab = browser.new_tab().context("Failed to open a tab")?;
        tab.set_user_agent(&self.user_agent, Some(&self.accept_language), None)
            .context("Failed to set user agent")?;
        if options.block_assets {
            block_assets(&tab)?;
        }

        Ok(ChromePage { tab })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            info!("Closing Chrome");
            // Dropping the handle kills the Chrome process.
            drop(browser);
        }
        Ok(())
    }
}

/// Fetch interception patterns for images, stylesheets, fonts and media
fn asset_patterns() -> Vec<RequestPattern> {
    [
        ResourceType::Image,
        ResourceType::Stylesheet,
        ResourceType::Font,
        ResourceType::Media,
    ]
    .into_iter()
    .map(|resource_type| RequestPattern {
        url_pattern: None,
        resource_Type: Some(resource_type),
        request_stage: Some(RequestStage::Request),
    })
    .collect()
}

fn block_assets(tab: &Arc<Tab>) -> Result<()> {
    let patterns = asset_patterns();
    tab.enable_fetch(Some(&patterns), None)
        .context("Failed to enable request interception")?;
    tab.enable_request_interception(Arc::new(
        |_transport: Arc<Transport>, _session_id: SessionId, intercepted: RequestPausedEvent| {
            RequestPausedDecision::Fail(FailRequest {
                request_id: intercepted.params.request_id,
                error_reason: ErrorReason::BlockedByClient,
            })
        },
    ))
    .context("Failed to install request interceptor")?;
    Ok(())
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn eval(&self, script: &str) -> Result<Value> {
        let object = self.tab.evaluate(script, false)?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    fn ready_state(&self) -> Result<String> {
        Ok(self
            .eval("document.readyState")?
            .as_str()
            .unwrap_or("loading")
            .to_string())
    }
}

/// Quote a string as a JavaScript literal
fn js_str(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

impl Page for ChromePage {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Timed out loading {}", url))?;
        Ok(())
    }

    fn go_back(&self, timeout: Duration) -> Result<()> {
        let from = self.current_url()?;
        self.eval("history.back()")?;
        self.wait_for_navigation(&from, timeout)
    }

    fn wait_for_navigation(&self, from_url: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.current_url()? != from_url && self.ready_state()? != "loading" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("Navigation away from {} timed out after {:?}", from_url, timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .with_context(|| format!("No element matched {} within {:?}", selector, timeout))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self
            .eval("window.location.href")?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    fn content(&self) -> Result<String> {
        self.tab.get_content()
    }

    fn count(&self, selector: &str) -> Result<usize> {
        let script = format!("document.querySelectorAll({}).length", js_str(selector)?);
        Ok(self.eval(&script)?.as_u64().unwrap_or(0) as usize)
    }

    fn scroll_last_into_view(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const items = document.querySelectorAll({});
                const last = items[items.length - 1];
                if (!last) return false;
                last.scrollIntoView({{ behavior: "smooth", block: "center" }});
                return true;
            }})()"#,
            js_str(selector)?
        );
        Ok(self.eval(&script)?.as_bool().unwrap_or(false))
    }

    fn click(&self, selector: &str, label: Option<&str>) -> Result<bool> {
        let label = match label {
            Some(label) => js_str(label)?,
            None => "null".to_string(),
        };
        let script = format!(
            r#"(() => {{
                const label = {};
                for (const el of document.querySelectorAll({})) {{
                    if (label === null || (el.textContent || "").includes(label)) {{
                        el.scrollIntoView({{ block: "center" }});
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            label,
            js_str(selector)?
        );
        Ok(self.eval(&script)?.as_bool().unwrap_or(false))
    }

    fn remove_all(&self, selector: &str) -> Result<usize> {
        let script = format!(
            r#"(() => {{
                const found = document.querySelectorAll({});
                found.forEach((el) => el.remove());
                return found.length;
            }})()"#,
            js_str(selector)?
        );
        Ok(self.eval(&script)?.as_u64().unwrap_or(0) as usize)
    }

    fn call_hook(&self, function: &str, argument: u32) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const hook = window[{}];
                if (typeof hook !== "function") return false;
                hook({});
                return true;
            }})()"#,
            js_str(function)?,
            argument
        );
        Ok(self.eval(&script)?.as_bool().unwrap_or(false))
    }

    fn close(&self) -> Result<()> {
        self.tab.close(true)?;
        Ok(())
    }
}
