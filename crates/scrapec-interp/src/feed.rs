//! Data-feed variable substitution.
//!
//! A script may declare a `data_schema` block binding feed columns to
//! `$variables`. The driver turns one record of the feed into a
//! [`FeedRow`]; string arguments to `goto_url`, the extract family,
//! `set_field`, `click`, and condition selectors pass through
//! [`FeedRow::substitute`] before use. Without a feed, substitution is
//! a no-op.

/// One record of the external data feed, keyed by `$variable`.
#[derive(Debug, Clone, Default)]
pub struct FeedRow {
    /// `($variable, value)` pairs, longest variable first so that a
    /// name that prefixes another (`$id` / `$id_full`) never clobbers
    /// the longer one.
    bindings: Vec<(String, String)>,
}

impl FeedRow {
    /// Builds a feed row from `($variable, value)` pairs. Variable
    /// names include the `$`.
    pub fn new(bindings: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut bindings: Vec<_> = bindings.into_iter().collect();
        bindings.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { bindings }
    }

    /// Replaces every `$variable` occurrence in `input` with its value.
    pub fn substitute(&self, input: &str) -> String {
        if !input.contains('$') {
            return input.to_string();
        }

        let mut output = input.to_string();
        for (variable, value) in &self.bindings {
            if output.contains(variable.as_str()) {
                output = output.replace(variable.as_str(), value);
            }
        }
        output
    }
}

/// Substitution against an optional feed: the common call site shape
/// inside the interpreter.
pub(crate) fn substitute(input: &str, feed: Option<&FeedRow>) -> String {
    match feed {
        Some(row) => row.substitute(input),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(pairs: &[(&str, &str)]) -> FeedRow {
        FeedRow::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_basic_substitution() {
        let row = feed(&[("$id", "42")]);
        assert_eq!(
            row.substitute("https://example.com/item/$id"),
            "https://example.com/item/42"
        );
    }

    #[test]
    fn test_multiple_occurrences() {
        let row = feed(&[("$q", "rust")]);
        assert_eq!(row.substitute("$q and $q again"), "rust and rust again");
    }

    #[test]
    fn test_longest_name_wins() {
        let row = feed(&[("$id", "1"), ("$id_full", "0001")]);
        assert_eq!(row.substitute("$id_full/$id"), "0001/1");
    }

    #[test]
    fn test_unknown_variable_left_alone() {
        let row = feed(&[("$id", "42")]);
        assert_eq!(row.substitute("$other"), "$other");
    }

    #[test]
    fn test_no_feed_is_noop() {
        assert_eq!(substitute("price is $price", None), "price is $price");
    }

    #[test]
    fn test_input_without_dollar_is_untouched() {
        let row = feed(&[("$id", "42")]);
        assert_eq!(row.substitute(".product > a"), ".product > a");
    }
}
