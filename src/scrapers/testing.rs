//! Scripted in-memory browser for engine tests.

use crate::scrapers::browser::{Browser, Page, PageOptions};
use crate::scrapers::extract::parse_selector;
use anyhow::{bail, Result};
use scraper::Html;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

const BLANK: &str = "about:blank";

struct ScrollScript {
    url: String,
    counts: VecDeque<usize>,
    current: usize,
    card: fn(usize) -> String,
}

#[derive(Default)]
struct State {
    documents: HashMap<String, String>,
    failing: HashSet<String>,
    /// Successful navigations left before the URL starts failing
    fails_after: HashMap<String, usize>,
    unreadable: HashSet<String>,
    next_pages: HashMap<String, String>,
    hooks: HashSet<String>,
    scroll: Option<ScrollScript>,
    back_fails: bool,
    tabs_fail: bool,

    navigations: Vec<String>,
    clicks: Vec<String>,
    hook_calls: Vec<(String, u32)>,
    observations: usize,
    tabs_opened: usize,
    blocked_tabs: usize,
    tabs_closed: usize,
    browser_closes: usize,
}

/// Shared handle to a fake web: documents per URL plus scripted behaviour.
#[derive(Clone, Default)]
pub struct FakeWeb {
    state: Rc<RefCell<State>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(self, url: &str, html: &str) -> Self {
        self.state
            .borrow_mut()
            .documents
            .insert(url.to_string(), html.to_string());
        self
    }

    /// Navigating to `url` fails.
    pub fn failing(self, url: &str) -> Self {
        self.state.borrow_mut().failing.insert(url.to_string());
        self
    }

    /// The first `successes` navigations to `url` work, later ones fail.
    pub fn fails_after(self, url: &str, successes: usize) -> Self {
        self.state
            .borrow_mut()
            .fails_after
            .insert(url.to_string(), successes);
        self
    }

    /// `url` loads, but reading its content fails.
    pub fn unreadable(self, url: &str) -> Self {
        self.state.borrow_mut().unreadable.insert(url.to_string());
        self
    }

    /// A successful next-page click on `from` lands on `to`.
    pub fn next_page(self, from: &str, to: &str) -> Self {
        self.state
            .borrow_mut()
            .next_pages
            .insert(from.to_string(), to.to_string());
        self
    }

    pub fn hook(self, name: &str) -> Self {
        self.state.borrow_mut().hooks.insert(name.to_string());
        self
    }

    /// `url` renders `counts[i]` cards on the i-th count; the last value holds.
    pub fn scrolling(self, url: &str, counts: &[usize], card: fn(usize) -> String) -> Self {
        self.state.borrow_mut().scroll = Some(ScrollScript {
            url: url.to_string(),
            counts: counts.iter().copied().collect(),
            current: 0,
            card,
        });
        self
    }

    pub fn back_fails(self) -> Self {
        self.state.borrow_mut().back_fails = true;
        self
    }

    pub fn tabs_fail(self) -> Self {
        self.state.borrow_mut().tabs_fail = true;
        self
    }

    pub fn browser(&self) -> FakeBrowser {
        FakeBrowser { web: self.clone() }
    }

    pub fn page_at(&self, url: &str) -> FakePage {
        FakePage {
            web: self.clone(),
            history: RefCell::new(vec![url.to_string()]),
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn hook_calls(&self) -> Vec<(String, u32)> {
        self.state.borrow().hook_calls.clone()
    }

    pub fn observations(&self) -> usize {
        self.state.borrow().observations
    }

    pub fn tabs_opened(&self) -> usize {
        self.state.borrow().tabs_opened
    }

    pub fn blocked_tabs(&self) -> usize {
        self.state.borrow().blocked_tabs
    }

    pub fn tabs_closed(&self) -> usize {
        self.state.borrow().tabs_closed
    }

    pub fn browser_closes(&self) -> usize {
        self.state.borrow().browser_closes
    }

    fn html_at(&self, url: &str) -> String {
        let state = self.state.borrow();
        if let Some(script) = state.scroll.as_ref().filter(|script| script.url == url) {
            let cards: String = (0..script.current).map(script.card).collect();
            return format!("<html><body><div role=\"feed\">{}</div></body></html>", cards);
        }
        state
            .documents
            .get(url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string())
    }
}

pub struct FakeBrowser {
    web: FakeWeb,
}

impl Browser for FakeBrowser {
    type Page = FakePage;

    fn open_page(&self, options: PageOptions) -> Result<FakePage> {
        let mut state = self.web.state.borrow_mut();
        if state.tabs_fail {
            bail!("cannot open tab");
        }
        state.tabs_opened += 1;
        if options.block_assets {
            state.blocked_tabs += 1;
        }
        drop(state);
        Ok(self.web.page_at(BLANK))
    }

    fn close(&mut self) -> Result<()> {
        self.web.state.borrow_mut().browser_closes += 1;
        Ok(())
    }
}

pub struct FakePage {
    web: FakeWeb,
    history: RefCell<Vec<String>>,
}

impl FakePage {
    fn url(&self) -> String {
        self.history
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| BLANK.to_string())
    }

    fn document(&self) -> Html {
        Html::parse_document(&self.web.html_at(&self.url()))
    }

    fn matches(&self, selector: &str) -> Result<usize> {
        let selector = parse_selector(selector)?;
        Ok(self.document().select(&selector).count())
    }

    fn on_scroll_listing(&self) -> bool {
        let url = self.url();
        self.web
            .state
            .borrow()
            .scroll
            .as_ref()
            .is_some_and(|script| script.url == url)
    }
}

impl Page for FakePage {
    fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.web.state.borrow_mut();
        state.navigations.push(url.to_string());
        if state.failing.contains(url) {
            bail!("net::ERR_TIMED_OUT at {}", url);
        }
        if let Some(left) = state.fails_after.get_mut(url) {
            if *left == 0 {
                bail!("net::ERR_CONNECTION_RESET at {}", url);
            }
            *left -= 1;
        }
        self.history.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn go_back(&self, _timeout: Duration) -> Result<()> {
        if self.web.state.borrow().back_fails {
            bail!("history.back timed out");
        }
        let mut history = self.history.borrow_mut();
        if history.len() < 2 {
            bail!("no history entry to go back to");
        }
        history.pop();
        Ok(())
    }

    fn wait_for_navigation(&self, _from_url: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if self.matches(selector)? == 0 {
            bail!("no element matched {}", selector);
        }
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.url())
    }

    fn content(&self) -> Result<String> {
        let url = self.url();
        if self.web.state.borrow().unreadable.contains(&url) {
            bail!("Target closed while reading {}", url);
        }
        Ok(self.web.html_at(&url))
    }

    fn count(&self, selector: &str) -> Result<usize> {
        if self.on_scroll_listing() {
            let mut state = self.web.state.borrow_mut();
            state.observations += 1;
            if let Some(script) = state.scroll.as_mut() {
                if let Some(next) = script.counts.pop_front() {
                    script.current = next;
                }
                return Ok(script.current);
            }
        }
        self.matches(selector)
    }

    fn scroll_last_into_view(&self, selector: &str) -> Result<bool> {
        Ok(self.matches(selector)? > 0)
    }

    fn click(&self, selector: &str, label: Option<&str>) -> Result<bool> {
        let parsed = parse_selector(selector)?;
        let document = self.document();
        let found = document.select(&parsed).any(|element| {
            label.map_or(true, |label| element.text().collect::<String>().contains(label))
        });
        if !found {
            return Ok(false);
        }

        let mut state = self.web.state.borrow_mut();
        state.clicks.push(selector.to_string());
        if let Some(next) = state.next_pages.get(&self.url()).cloned() {
            self.history.borrow_mut().push(next);
        }
        Ok(true)
    }

    fn remove_all(&self, selector: &str) -> Result<usize> {
        self.matches(selector)
    }

    fn call_hook(&self, function: &str, argument: u32) -> Result<bool> {
        let mut state = self.web.state.borrow_mut();
        state.hook_calls.push((function.to_string(), argument));
        Ok(state.hooks.contains(function))
    }

    fn close(&self) -> Result<()> {
        self.web.state.borrow_mut().tabs_closed += 1;
        Ok(())
    }
}
