//! # Query Module
//!
//! Lazy access to the raw query string captured by the parser.
//!
//! The parser stores everything between `?` and the next space verbatim. Nothing
//! is split into key/value pairs until a handler asks for a parameter by name.
//!
//! ## Decoding
//!
//! Values are decoded with a fixed [`ESCAPES`] table, not general
//! percent-decoding. Each listed three-character code is replaced literally,
//! in table order, across the whole extracted value:
//!
//! - only uppercase hex codes are recognised (`%2F`, not `%2f`)
//! - codes outside the table pass through untouched (`%C3%A9` stays as is)
//! - `+` is never turned into a space
//!
//! Because replacement is sequential, a decoded `%25` can combine with the
//! characters that follow it and be decoded again by a later entry
//! (`%2540` becomes `@`).
//!
//! ```rust
//! use brrtlite::query::QueryString;
//!
//! let q = QueryString::new("name=John%20Doe&age=5");
//! assert_eq!(q.value("name"), "John Doe");
//! assert_eq!(q.value("age"), "5");
//! assert_eq!(q.value("z"), "");
//! ```

use serde::Serialize;
use std::fmt;

/// Percent-codes decoded by [`unescape`], in application order.
pub const ESCAPES: [(&str, &str); 35] = [
    ("%0A", "\n"),
    ("%0D", "\r"),
    ("%20", " "),
    ("%21", "!"),
    ("%22", "\""),
    ("%23", "#"),
    ("%24", "$"),
    ("%25", "%"),
    ("%26", "&"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
    ("%2B", "+"),
    ("%2C", ","),
    ("%2D", "-"),
    ("%2E", "."),
    ("%2F", "/"),
    ("%3A", ":"),
    ("%3B", ";"),
    ("%3C", "<"),
    ("%3D", "="),
    ("%3E", ">"),
    ("%3F", "?"),
    ("%40", "@"),
    ("%5B", "["),
    ("%5C", "\\"),
    ("%5D", "]"),
    ("%5E", "^"),
    ("%5F", "_"),
    ("%60", "`"),
    ("%7B", "{"),
    ("%7C", "|"),
    ("%7D", "}"),
    ("%7E", "~"),
];

/// Apply the [`ESCAPES`] table to `value`.
pub fn unescape(value: &str) -> String {
    let mut out = value.to_string();
    for (code, ch) in ESCAPES {
        if out.contains(code) {
            out = out.replace(code, ch);
        }
    }
    out
}

/// Raw query string of a request, decoded on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryString(String);

impl QueryString {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The query string exactly as received, without the leading `?`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of parameter `name`, decoded with [`unescape`].
    ///
    /// Returns an empty string when the parameter is absent; absence and an
    /// explicitly empty value look the same.
    pub fn value(&self, name: &str) -> String {
        unescape(self.raw_value(name))
    }

    /// Value of parameter `name` exactly as it appears on the wire.
    ///
    /// Only `name=` at the very start or `&name=` later on counts as a match;
    /// the value runs to the next `&` or the end of the string.
    pub fn raw_value(&self, name: &str) -> &str {
        let raw = self.0.as_str();
        let key = format!("{name}=");
        let start = if raw.starts_with(&key) {
            key.len()
        } else {
            match raw.find(&format!("&{key}")) {
                Some(pos) => pos + 1 + key.len(),
                None => return "",
            }
        };
        let rest = &raw[start..];
        match rest.find('&') {
            Some(end) => &rest[..end],
            None => rest,
        }
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueryString {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for QueryString {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_at_start_and_after_ampersand() {
        let q = QueryString::new("x=1&y=2");
        assert_eq!(q.value("x"), "1");
        assert_eq!(q.value("y"), "2");
    }

    #[test]
    fn test_absent_parameter_is_empty() {
        let q = QueryString::new("x=1");
        assert_eq!(q.value("z"), "");
        assert_eq!(QueryString::default().value("x"), "");
    }

    #[test]
    fn test_name_must_be_whole_key() {
        // "ax=" must not satisfy a lookup for "x"
        let q = QueryString::new("ax=1&bx=2");
        assert_eq!(q.value("x"), "");
        let q = QueryString::new("ax=1&x=3");
        assert_eq!(q.value("x"), "3");
    }

    #[test]
    fn test_explicit_empty_value() {
        let q = QueryString::new("a=&b=2");
        assert_eq!(q.value("a"), "");
        assert_eq!(q.value("b"), "2");
    }

    #[test]
    fn test_unescape_known_codes() {
        assert_eq!(unescape("a%20b%26c%3Dd%28e%29"), "a b&c=d(e)");
        assert_eq!(unescape("%0D%0A"), "\r\n");
        assert_eq!(unescape("%7E%7C%5C"), "~|\\");
    }

    #[test]
    fn test_unescape_leaves_unknown_codes_and_plus() {
        assert_eq!(unescape("a+b"), "a+b");
        assert_eq!(unescape("caf%C3%A9"), "caf%C3%A9");
        assert_eq!(unescape("%2f"), "%2f");
        assert_eq!(unescape("%41"), "%41");
    }

    #[test]
    fn test_unescape_is_sequential() {
        // %25 -> % happens before %40 -> @ in table order
        assert_eq!(unescape("%2540"), "@");
        // %20 is applied before %25 produces a new %20
        assert_eq!(unescape("%2520"), "%20");
    }

    #[test]
    fn test_raw_value_is_not_decoded() {
        let q = QueryString::new("path=%2Ftmp%2Fx");
        assert_eq!(q.raw_value("path"), "%2Ftmp%2Fx");
        assert_eq!(q.value("path"), "/tmp/x");
    }

    #[test]
    fn test_escape_table_codes_are_unique_and_three_chars() {
        let mut seen = std::collections::HashSet::new();
        for (code, ch) in ESCAPES {
            assert_eq!(code.len(), 3);
            assert_eq!(ch.chars().count(), 1);
            assert!(seen.insert(code));
        }
    }
}
