//! scrapec-browser - Browser automation capability for ScrapeScript.
//!
//! The interpreter consumes a deliberately narrow capability: navigate,
//! query by CSS selector (page- or element-scoped), read text and
//! attributes, click, and walk history. This crate defines that seam as
//! the [`Browser`] trait and ships two drivers that satisfy it:
//!
//! - [`HttpDriver`] - the static engine: fetches pages over HTTP(S),
//!   parses them into a DOM, and emulates navigation (anchor clicks,
//!   history) without a browser process.
//! - [`FixtureBrowser`] - an in-memory driver over canned HTML, for
//!   tests and dry runs.
//!
//! Element handles are opaque ids scoped to the current page; any
//! navigation invalidates them, and a stale handle surfaces as
//! [`BrowserError::StaleElement`] rather than silently reading from the
//! wrong document.
//!
//! Everything here is single-threaded cooperative: trait methods are
//! async so drivers can suspend on I/O, but no two calls ever run
//! concurrently against one session, so the trait is `?Send` and runs
//! fine on a current-thread runtime.

mod dom;
mod fixture;
mod http;

pub use fixture::{FixtureBrowser, FIXTURE_START_URL};
pub use http::HttpDriver;

use async_trait::async_trait;
use thiserror::Error;

/// An opaque handle to an element on the current page.
///
/// Handles stay valid until the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub(crate) u64);

/// A failure inside a browser driver.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The driver could not be initialised.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// A navigation did not produce a usable page.
    #[error("navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A selector string the DOM engine cannot parse.
    #[error("invalid CSS selector '{css}'")]
    InvalidSelector { css: String },

    /// An element handle from before the last navigation.
    #[error("element handle is stale (page has navigated)")]
    StaleElement,

    /// A query or read before any page was loaded.
    #[error("no page loaded")]
    NoPage,
}

/// The browser capability the interpreter drives.
///
/// Exactly one interpreter owns a session for its lifetime; calls are
/// strictly sequential. `launch` must be called before anything else,
/// and `cleanup` is idempotent and called exactly once on every exit
/// path.
#[async_trait(?Send)]
pub trait Browser {
    /// Initialises the driver. Subsequent calls operate on the active
    /// page.
    async fn launch(&mut self, headless: bool) -> Result<(), BrowserError>;

    /// Navigates to a URL, suspending until the page is load-stable.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Returns the current top-level URL.
    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Returns the first element matching `css`, searched within
    /// `scope`'s subtree when given, otherwise the whole page.
    async fn query(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Option<ElementHandle>, BrowserError>;

    /// Returns all elements matching `css`, scoped like [`Self::query`].
    async fn query_all(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    /// Returns the element's text content. Never null: an element with
    /// no text yields the empty string.
    async fn text(&mut self, element: ElementHandle) -> Result<String, BrowserError>;

    /// Returns the value of an attribute, or `None` when absent.
    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Clicks an element. Returns true on success and false on any
    /// failure, including a navigation that did not complete.
    async fn click(&mut self, element: ElementHandle) -> Result<bool, BrowserError>;

    /// Navigates back in session history. A no-op at the oldest entry.
    async fn go_back(&mut self) -> Result<(), BrowserError>;

    /// Navigates forward in session history. A no-op at the newest entry.
    async fn go_forward(&mut self) -> Result<(), BrowserError>;

    /// Tears down all driver resources. Idempotent.
    async fn cleanup(&mut self) -> Result<(), BrowserError>;
}
