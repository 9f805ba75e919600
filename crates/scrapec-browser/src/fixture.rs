//! In-memory browser driver over canned HTML.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dom::PageState;
use crate::{Browser, BrowserError, ElementHandle};

/// The URL the initial fixture page is served under.
pub const FIXTURE_START_URL: &str = "about:blank";

/// A [`Browser`] whose web is a map from URL to HTML string.
///
/// Navigation looks the URL up in the map; clicking an anchor navigates
/// to its `href` used verbatim as a map key. Query, text, attribute,
/// and history semantics are identical to the HTTP driver's, which
/// makes this the test double for interpreter scenarios and a dry-run
/// backend for library consumers.
///
/// # Example
///
/// ```
/// use scrapec_browser::{Browser, FixtureBrowser};
///
/// # async fn demo() -> Result<(), scrapec_browser::BrowserError> {
/// let mut browser = FixtureBrowser::with_page("<h1>Hi</h1>");
/// browser.launch(true).await?;
/// let h1 = browser.query(None, "h1").await?.unwrap();
/// assert_eq!(browser.text(h1).await?, "Hi");
/// # Ok(())
/// # }
/// ```
pub struct FixtureBrowser {
    pages: HashMap<String, String>,
    /// Page loaded at launch, keyed into `pages`.
    start_url: Option<String>,
    state: PageState,
}

impl FixtureBrowser {
    /// An empty fixture: no pages, nothing loaded at launch.
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            start_url: None,
            state: PageState::new(),
        }
    }

    /// A fixture whose start page is already loaded when the session
    /// launches, served under [`FIXTURE_START_URL`].
    pub fn with_page(html: &str) -> Self {
        Self::new().page(FIXTURE_START_URL, html).start_at(FIXTURE_START_URL)
    }

    /// Adds a navigable page.
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Marks a URL as pre-loaded at launch.
    pub fn start_at(mut self, url: &str) -> Self {
        self.start_url = Some(url.to_string());
        self
    }

    fn load_url(&mut self, url: &str) {
        match self.pages.get(url) {
            Some(html) => {
                let html = html.clone();
                self.state.load(url, &html);
            },
            None => {
                warn!(url, "fixture has no page for URL, serving empty document");
                self.state.load(url, "<html><head></head><body></body></html>");
            },
        }
    }
}

impl Default for FixtureBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Browser for FixtureBrowser {
    async fn launch(&mut self, _headless: bool) -> Result<(), BrowserError> {
        if let Some(url) = self.start_url.clone() {
            self.load_url(&url);
        }
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        debug!(url, "fixture navigation");
        self.load_url(url);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.state
            .current_url()
            .map(str::to_string)
            .ok_or(BrowserError::NoPage)
    }

    async fn query(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        Ok(self.state.select(scope, css)?.into_iter().next())
    }

    async fn query_all(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        self.state.select(scope, css)
    }

    async fn text(&mut self, element: ElementHandle) -> Result<String, BrowserError> {
        self.state.text(element)
    }

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.state.attribute(element, name)
    }

    async fn click(&mut self, element: ElementHandle) -> Result<bool, BrowserError> {
        match self.state.click_target(element)? {
            Some(href) => {
                debug!(href, "fixture click follows anchor");
                self.load_url(&href);
                Ok(true)
            },
            // No enclosing anchor: the click lands but nothing reacts.
            None => Ok(true),
        }
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        if !self.state.go_back() {
            warn!("history_back at oldest entry, ignoring");
        }
        Ok(())
    }

    async fn go_forward(&mut self) -> Result<(), BrowserError> {
        if !self.state.go_forward() {
            warn!("history_forward at newest entry, ignoring");
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), BrowserError> {
        self.state.reset();
        Ok(())
    }
}
