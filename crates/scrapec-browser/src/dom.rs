//! Shared DOM page model for the static drivers.
//!
//! Both [`crate::HttpDriver`] and [`crate::FixtureBrowser`] work the
//! same way once HTML is in hand: parse it with `scraper`, answer CSS
//! queries against the tree, and hand out opaque element handles that
//! die on the next navigation. This module holds that common machinery.

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

use crate::{BrowserError, ElementHandle};

/// One entry in the session's navigation history.
struct HistoryEntry {
    url: String,
    html: String,
}

/// A parsed page plus the element-handle registry and history stack.
///
/// Handles map to node ids inside the current document only; the
/// registry is cleared on every navigation, so a stale handle simply
/// fails to resolve.
pub(crate) struct PageState {
    document: Option<Html>,
    handles: HashMap<u64, NodeId>,
    next_handle: u64,
    history: Vec<HistoryEntry>,
    /// Index of the current page within `history`.
    cursor: usize,
}

impl PageState {
    pub(crate) fn new() -> Self {
        Self {
            document: None,
            handles: HashMap::new(),
            next_handle: 0,
            history: Vec::new(),
            cursor: 0,
        }
    }

    /// Loads a freshly navigated page, truncating any forward history.
    pub(crate) fn load(&mut self, url: &str, html: &str) {
        if !self.history.is_empty() {
            self.history.truncate(self.cursor + 1);
        }
        self.history.push(HistoryEntry {
            url: url.to_string(),
            html: html.to_string(),
        });
        self.cursor = self.history.len() - 1;
        self.set_document(html);
    }

    /// Steps back one history entry. Returns false at the oldest entry.
    pub(crate) fn go_back(&mut self) -> bool {
        if self.cursor == 0 || self.history.is_empty() {
            return false;
        }
        self.cursor -= 1;
        let html = self.history[self.cursor].html.clone();
        self.set_document(&html);
        true
    }

    /// Steps forward one history entry. Returns false at the newest.
    pub(crate) fn go_forward(&mut self) -> bool {
        if self.history.is_empty() || self.cursor + 1 >= self.history.len() {
            return false;
        }
        self.cursor += 1;
        let html = self.history[self.cursor].html.clone();
        self.set_document(&html);
        true
    }

    /// The URL of the current page, if any page has been loaded.
    pub(crate) fn current_url(&self) -> Option<&str> {
        self.history.get(self.cursor).map(|entry| entry.url.as_str())
    }

    /// Drops the page, handles, and history.
    pub(crate) fn reset(&mut self) {
        self.document = None;
        self.handles.clear();
        self.history.clear();
        self.cursor = 0;
    }

    fn set_document(&mut self, html: &str) {
        self.document = Some(Html::parse_document(html));
        // Any outstanding handles now point into a dead tree.
        self.handles.clear();
    }

    /// Runs a CSS query, scoped to an element's subtree when `scope` is
    /// given, and registers a handle for every hit.
    pub(crate) fn select(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let selector = parse_selector(css)?;

        let document = self.document.as_ref().ok_or(BrowserError::NoPage)?;

        let node_ids: Vec<NodeId> = match scope {
            None => document.select(&selector).map(|el| el.id()).collect(),
            Some(handle) => {
                let node_id = self
                    .handles
                    .get(&handle.0)
                    .copied()
                    .ok_or(BrowserError::StaleElement)?;
                let node = document
                    .tree
                    .get(node_id)
                    .ok_or(BrowserError::StaleElement)?;
                let element = ElementRef::wrap(node).ok_or(BrowserError::StaleElement)?;
                element.select(&selector).map(|el| el.id()).collect()
            },
        };

        Ok(node_ids.into_iter().map(|id| self.register(id)).collect())
    }

    fn register(&mut self, node_id: NodeId) -> ElementHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(handle, node_id);
        ElementHandle(handle)
    }

    /// Resolves a handle to an element in the current document.
    fn element(&self, handle: ElementHandle) -> Result<ElementRef<'_>, BrowserError> {
        let document = self.document.as_ref().ok_or(BrowserError::NoPage)?;
        let node_id = self
            .handles
            .get(&handle.0)
            .copied()
            .ok_or(BrowserError::StaleElement)?;
        let node = document
            .tree
            .get(node_id)
            .ok_or(BrowserError::StaleElement)?;
        ElementRef::wrap(node).ok_or(BrowserError::StaleElement)
    }

    /// The element's full text content; empty string when it has none.
    pub(crate) fn text(&self, handle: ElementHandle) -> Result<String, BrowserError> {
        let element = self.element(handle)?;
        Ok(element.text().collect::<String>())
    }

    /// An attribute value, or `None` when the attribute is absent.
    pub(crate) fn attribute(
        &self,
        handle: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let element = self.element(handle)?;
        Ok(element.value().attr(name).map(str::to_string))
    }

    /// Finds the `href` a click on this element would follow: the
    /// element's own, or the nearest enclosing anchor's.
    pub(crate) fn click_target(
        &self,
        handle: ElementHandle,
    ) -> Result<Option<String>, BrowserError> {
        let element = self.element(handle)?;

        let mut current = Some(element);
        while let Some(el) = current {
            if el.value().name() == "a" {
                if let Some(href) = el.value().attr("href") {
                    return Ok(Some(href.to_string()));
                }
            }
            current = el.parent().and_then(ElementRef::wrap);
        }

        Ok(None)
    }
}

fn parse_selector(css: &str) -> Result<Selector, BrowserError> {
    Selector::parse(css).map_err(|_| BrowserError::InvalidSelector {
        css: css.to_string(),
    })
}
