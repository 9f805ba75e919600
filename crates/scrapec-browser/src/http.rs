//! Static HTTP driver.
//!
//! Fetches pages with `reqwest`, parses them with `scraper`, and
//! emulates the pieces of browser behaviour the interpreter relies on:
//! anchor clicks navigate, history walks re-serve cached documents.
//! No scripts run and nothing renders, which is exactly what most
//! scraping targets need and keeps the driver dependency-light.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::dom::PageState;
use crate::{Browser, BrowserError, ElementHandle};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The one concrete production driver: a static fetch-and-parse engine.
///
/// # Example
///
/// ```no_run
/// use scrapec_browser::{Browser, HttpDriver};
///
/// # async fn demo() -> Result<(), scrapec_browser::BrowserError> {
/// let mut browser = HttpDriver::new();
/// browser.launch(true).await?;
/// browser.goto("https://example.com").await?;
/// if let Some(h1) = browser.query(None, "h1").await? {
///     println!("{}", browser.text(h1).await?);
/// }
/// browser.cleanup().await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpDriver {
    client: Option<Client>,
    state: PageState,
    timeout: Duration,
}

impl HttpDriver {
    /// A driver with the default 30-second navigation timeout.
    pub fn new() -> Self {
        Self {
            client: None,
            state: PageState::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-request navigation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self) -> Result<&Client, BrowserError> {
        self.client
            .as_ref()
            .ok_or_else(|| BrowserError::Launch("driver not launched".to_string()))
    }

    async fn fetch(&mut self, url: &str) -> Result<(), BrowserError> {
        let navigation_error = |reason: String| BrowserError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client()?
            .get(url)
            .send()
            .await
            .map_err(|e| navigation_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| navigation_error(e.to_string()))?;

        // Record the post-redirect URL so relative hrefs resolve
        // against where we actually landed.
        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        self.state.load(&final_url, &html);
        Ok(())
    }
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Browser for HttpDriver {
    async fn launch(&mut self, headless: bool) -> Result<(), BrowserError> {
        if !headless {
            debug!("static engine has no window, running headless regardless");
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("scrapec/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        self.client = Some(client);
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        debug!(url, "fetching");
        self.fetch(url).await
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
        let Some(href) = self.state.click_target(element)? else {
            // The click lands; a static page has nothing to react with.
            return Ok(true);
        };

        let current = self
            .state
            .current_url()
            .ok_or(BrowserError::NoPage)?
            .to_string();
        let target = match Url::parse(&current).and_then(|base| base.join(&href)) {
            Ok(target) => target.to_string(),
            Err(e) => {
                warn!(href, error = %e, "click target does not resolve to a URL");
                return Ok(false);
            },
        };

        // A navigation failure on click (timeout included) is a click
        // failure, not a fatal error.
        match self.fetch(&target).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(url = target, error = %e, "click navigation failed");
                Ok(false)
            },
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
        self.client = None;
        self.state.reset();
        Ok(())
    }
}
