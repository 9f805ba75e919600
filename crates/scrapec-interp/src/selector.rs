//! Selector query plans.
//!
//! Raw selector strings from the script are turned into [`Selector`]
//! trees before any element is touched. A plain CSS string becomes a
//! one-node plan; `@name` dereferences the reference table (recursively,
//! since a stored selector may itself start with `@other`); and
//! `@name rest` nests the reference as the parent of a descendant
//! query. A reference that is also a live `foreach` variable picks up
//! that loop's current index as a positional constraint.

use rustc_hash::FxHashMap;
use scrapec_util::Span;

use crate::error::RuntimeError;

/// How many `@name` → stored-selector hops resolution will follow
/// before giving up. Chains this deep only come from self-referential
/// `select` bindings.
const MAX_REFERENCE_DEPTH: usize = 64;

/// A resolved query plan for one raw selector string.
///
/// The tree is finite and acyclic; each node owns its parent. A node
/// with `css: None` and a parent denotes the parent element itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// CSS fragment to query, scoped to `parent` when present.
    pub css: Option<String>,

    /// Enclosing query this one runs inside of.
    pub parent: Option<Box<Selector>>,

    /// Positional pick among the query's matches (0-based).
    pub index: Option<usize>,
}

impl Selector {
    /// A plan that queries the page directly with one CSS fragment.
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: Some(css.into()),
            parent: None,
            index: None,
        }
    }

    /// Builds the plan for a raw selector string.
    ///
    /// `references` maps `@name` to the raw selector it captured;
    /// `indexes` carries the current iteration index of every live
    /// `foreach` variable. An unknown `@name` is a fatal error at the
    /// statement's position.
    pub fn build(
        raw: &str,
        references: &FxHashMap<String, String>,
        indexes: &FxHashMap<String, usize>,
        span: Span,
    ) -> Result<Selector, RuntimeError> {
        Self::build_at_depth(raw, references, indexes, span, 0)
    }

    fn build_at_depth(
        raw: &str,
        references: &FxHashMap<String, String>,
        indexes: &FxHashMap<String, usize>,
        span: Span,
        depth: usize,
    ) -> Result<Selector, RuntimeError> {
        let raw = raw.trim();

        if !raw.starts_with('@') {
            return Ok(Selector::css(raw));
        }

        if depth >= MAX_REFERENCE_DEPTH {
            return Err(RuntimeError::ReferenceChainTooDeep {
                name: raw.to_string(),
                span,
            });
        }

        // `@name rest` splits into the reference and a descendant query.
        let (name, descendant) = match raw.split_once(' ') {
            Some((name, rest)) => (name, Some(rest.trim())),
            None => (raw, None),
        };

        let stored = references
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownReference {
                name: name.to_string(),
                span,
            })?;

        let mut resolved =
            Self::build_at_depth(stored, references, indexes, span, depth + 1)?;

        // A reference bound by a live foreach pins the loop's current
        // element rather than the first match.
        if let Some(index) = indexes.get(name) {
            resolved.index = Some(*index);
        }

        match descendant {
            Some(rest) => Ok(Selector {
                css: Some(rest.to_string()),
                parent: Some(Box::new(resolved)),
                index: None,
            }),
            None => Ok(resolved),
        }
    }
}
